use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Encoding failed: {reason}")]
    EncodingFailure { index: Option<usize>, reason: String },

    #[error("Insufficient data: {k} clusters requested but only {distinct} distinct vectors")]
    InsufficientData { k: usize, distinct: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate identity: {0}")]
    DuplicateId(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Query cancelled")]
    Cancelled,
}

impl Error {
    /// Failure raised while encoding the text at `index` of a build batch.
    pub fn encoding_at(index: usize, reason: impl ToString) -> Self {
        Error::EncodingFailure {
            index: Some(index),
            reason: format!("item #{}: {}", index, reason.to_string()),
        }
    }

    /// Failure raised while encoding a query.
    pub fn encoding(reason: impl ToString) -> Self {
        Error::EncodingFailure { index: None, reason: reason.to_string() }
    }
}
