//! Async serving facade
//!
//! [`Lookbook`] owns the index lifecycle. It starts in
//! [`IndexState::Building`] and moves to [`IndexState::Serving`] once a build
//! (or a restored snapshot) succeeds. Later builds swap in a fresh engine;
//! a failed build leaves whatever was serving untouched.

use crate::config::LookbookConfig;
use lookbook_core::{AestheticRecord, CatalogRecord, Encoder, Error, TimedEncoder};
use lookbook_similarity::{BuildArtifact, IndexBuilder, SearchHit, SimilarityEngine};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Index is not serving yet")]
    NotServing,

    #[error(transparent)]
    Core(#[from] Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Lifecycle of the served index
#[derive(Debug, Clone)]
pub enum IndexState {
    Building,
    Serving(Arc<SimilarityEngine>),
}

pub struct Lookbook {
    state: RwLock<IndexState>,
    builder: Arc<IndexBuilder>,
    encoder: Arc<dyn Encoder>,
    encode_timeout: Duration,
    text_top_k: usize,
    aesthetic_top_k: usize,
}

impl Lookbook {
    pub fn new(config: &LookbookConfig, encoder: Arc<dyn Encoder>) -> ServiceResult<Self> {
        let builder = IndexBuilder::new(config.build_config())?;
        Ok(Self {
            state: RwLock::new(IndexState::Building),
            builder: Arc::new(builder),
            encoder,
            encode_timeout: config.encode_timeout(),
            text_top_k: config.text_top_k,
            aesthetic_top_k: config.aesthetic_top_k,
        })
    }

    pub fn state(&self) -> IndexState {
        self.state.read().clone()
    }

    pub fn is_serving(&self) -> bool {
        matches!(*self.state.read(), IndexState::Serving(_))
    }

    /// Current engine; queries hold this `Arc` and never touch the lock again
    pub fn engine(&self) -> ServiceResult<Arc<SimilarityEngine>> {
        match &*self.state.read() {
            IndexState::Serving(engine) => Ok(Arc::clone(engine)),
            IndexState::Building => Err(ServiceError::NotServing),
        }
    }

    /// Build a new artifact off the async runtime and start serving it.
    ///
    /// Every encoder call during the build is bounded by the configured timeout.
    pub async fn build(
        &self,
        records: Vec<CatalogRecord>,
        aesthetics: Vec<AestheticRecord>,
    ) -> ServiceResult<Arc<BuildArtifact>> {
        let builder = Arc::clone(&self.builder);
        let timed = TimedEncoder::new(Arc::clone(&self.encoder), self.encode_timeout);
        let started = Instant::now();

        let result = tokio::task::spawn_blocking(move || builder.build(records, aesthetics, &timed)).await?;
        let artifact = match result {
            Ok(artifact) => Arc::new(artifact),
            Err(e) => {
                warn!("Index build failed, keeping previous state: {}", e);
                return Err(e.into());
            }
        };

        info!(
            "Built index with {} items in {:?}",
            artifact.len(),
            started.elapsed()
        );
        self.swap(Arc::clone(&artifact));
        Ok(artifact)
    }

    /// Serve a previously built (e.g. restored) artifact.
    ///
    /// Rejected if its vectors cannot have come from this service's encoder.
    pub fn install(&self, artifact: BuildArtifact) -> ServiceResult<()> {
        if let Some(dim) = self.encoder.dimension() {
            if !artifact.is_empty() && artifact.dim() != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    actual: artifact.dim(),
                }
                .into());
            }
        }
        if artifact.info().encoder != self.encoder.name() {
            warn!(
                "Artifact was built with encoder '{}', serving with '{}'",
                artifact.info().encoder,
                self.encoder.name()
            );
        }
        self.swap(Arc::new(artifact));
        Ok(())
    }

    fn swap(&self, artifact: Arc<BuildArtifact>) {
        let engine = SimilarityEngine::new(artifact, Arc::clone(&self.encoder));
        *self.state.write() = IndexState::Serving(Arc::new(engine));
    }

    /// Text query with a bounded, cancellable encoder call.
    ///
    /// `k` defaults to the configured text top-K. Cancellation after encoding
    /// skips ranking.
    pub async fn search_by_text(
        &self,
        query: &str,
        k: Option<usize>,
        cancel: &CancellationToken,
    ) -> ServiceResult<Vec<SearchHit>> {
        let engine = self.engine()?;
        let k = k.unwrap_or(self.text_top_k);
        if cancel.is_cancelled() {
            return Err(Error::Cancelled.into());
        }
        if engine.artifact().is_empty() {
            debug!("Text query against an empty catalog");
            return Ok(Vec::new());
        }

        let encode = {
            let engine = Arc::clone(&engine);
            let query = query.to_string();
            tokio::task::spawn_blocking(move || engine.encode_query(&query))
        };

        // A finished encode is taken first; the check below still drops it if cancelled.
        let vector = tokio::select! {
            biased;
            encoded = tokio::time::timeout(self.encode_timeout, encode) => match encoded {
                Ok(joined) => joined??,
                Err(_) => {
                    return Err(Error::encoding(format!(
                        "query encoding timed out after {:?}",
                        self.encode_timeout
                    ))
                    .into())
                }
            },
            _ = cancel.cancelled() => return Err(Error::Cancelled.into()),
        };

        if cancel.is_cancelled() {
            return Err(Error::Cancelled.into());
        }
        let scored = engine.rank_by_cosine(&vector, k)?;
        Ok(engine.artifact().catalog().hydrate_scored(&scored))
    }

    /// Aesthetic query; `k` defaults to the configured aesthetic top-K
    pub fn search_by_aesthetic(&self, name: &str, k: Option<usize>) -> ServiceResult<Vec<SearchHit>> {
        let engine = self.engine()?;
        Ok(engine.search_by_aesthetic(name, k.unwrap_or(self.aesthetic_top_k)))
    }
}
