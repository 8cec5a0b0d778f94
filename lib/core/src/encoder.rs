//! Text encoders
//!
//! The [`Encoder`] trait is the capability contract for turning text into a
//! fixed-dimension vector. Implementations:
//!
//! - [`HashEncoder`] - deterministic word + trigram feature hashing, no model needed
//! - [`TimedEncoder`] - wraps any encoder and bounds each call with a timeout
//! - `FastEmbedEncoder` - all-MiniLM-L6-v2 through fastembed (feature `fastembed`)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default dimension for hashed embeddings (matches all-MiniLM-L6-v2)
pub const DEFAULT_HASH_DIM: usize = 384;

/// Errors reported by encoder implementations
#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("Encoding failed: {0}")]
    Failed(String),

    #[error("Encoder timed out after {0:?}")]
    Timeout(Duration),

    #[error("Encoder unavailable: {0}")]
    Unavailable(String),
}

/// Converts text into a dense vector.
///
/// All calls within one build must return vectors of the same length.
pub trait Encoder: Send + Sync {
    /// Encode a single text
    fn encode(&self, text: &str) -> Result<Vec<f32>, EncoderError>;

    /// Declared output dimension, if known up front
    fn dimension(&self) -> Option<usize> {
        None
    }

    /// Model or scheme identifier, recorded in build artifacts
    fn name(&self) -> &str;
}

impl<E: Encoder + ?Sized> Encoder for Arc<E> {
    fn encode(&self, text: &str) -> Result<Vec<f32>, EncoderError> {
        (**self).encode(text)
    }

    fn dimension(&self) -> Option<usize> {
        (**self).dimension()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Feature-hashing encoder.
///
/// Lowercases the text, hashes every word (weight 2) and every padded
/// character trigram (weight 1) into a fixed number of buckets and
/// L2-normalizes the result. Uses FNV-1a so vectors are stable across
/// builds and platforms.
#[derive(Debug, Clone)]
pub struct HashEncoder {
    dim: usize,
    name: String,
}

impl Default for HashEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIM)
    }
}

impl HashEncoder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim: dim.max(1),
            name: format!("hash-{}", dim.max(1)),
        }
    }

    fn bucket(&self, feature: &str) -> usize {
        (fnv1a(feature.as_bytes()) % self.dim as u64) as usize
    }
}

impl Encoder for HashEncoder {
    fn encode(&self, text: &str) -> Result<Vec<f32>, EncoderError> {
        let mut vector = vec![0.0f32; self.dim];
        let normalized = text.to_lowercase();

        let padded: Vec<char> = format!("  {}  ", normalized).chars().collect();
        for window in padded.windows(3) {
            let trigram: String = window.iter().collect();
            vector[self.bucket(&trigram)] += 1.0;
        }

        for word in normalized.split_whitespace() {
            vector[self.bucket(word)] += 2.0;
        }

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for v in &mut vector {
                *v /= magnitude;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dim)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

/// Encoder threads that may run at once per [`TimedEncoder`], timed-out ones included
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

/// Bounds every call of the wrapped encoder with a timeout.
///
/// Each call spawns its own OS thread, so a parallel build pays one thread
/// per item. A thread that times out keeps running until the inner encoder
/// returns; its late result is discarded. Running threads, stragglers
/// included, are capped at `max_in_flight`: past the cap new calls fail
/// with [`EncoderError::Unavailable`] instead of spawning more.
#[derive(Clone)]
pub struct TimedEncoder {
    inner: Arc<dyn Encoder>,
    timeout: Duration,
    max_in_flight: usize,
    in_flight: Arc<AtomicUsize>,
}

/// Releases one in-flight slot on drop
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl TimedEncoder {
    pub fn new(inner: Arc<dyn Encoder>, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    fn acquire(&self) -> Result<InFlight, EncoderError> {
        let running = self.in_flight.fetch_add(1, Ordering::AcqRel);
        let slot = InFlight(Arc::clone(&self.in_flight));
        if running >= self.max_in_flight {
            return Err(EncoderError::Unavailable(format!(
                "{} encoder calls still running",
                running
            )));
        }
        Ok(slot)
    }
}

impl Encoder for TimedEncoder {
    fn encode(&self, text: &str) -> Result<Vec<f32>, EncoderError> {
        let slot = self.acquire()?;
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let text = text.to_string();

        std::thread::Builder::new()
            .name("lookbook-encode".to_string())
            .spawn(move || {
                let _slot = slot;
                let _ = tx.send(inner.encode(&text));
            })
            .map_err(|e| EncoderError::Failed(format!("failed to spawn encoder thread: {}", e)))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(EncoderError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(EncoderError::Failed(
                "encoder thread exited without a result".to_string(),
            )),
        }
    }

    fn dimension(&self) -> Option<usize> {
        self.inner.dimension()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(feature = "fastembed")]
pub use self::fast::FastEmbedEncoder;

#[cfg(feature = "fastembed")]
mod fast {
    use super::{Encoder, EncoderError};
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// all-MiniLM-L6-v2 sentence embeddings via fastembed.
    /// fastembed's `embed()` needs `&mut self`, hence the Mutex.
    pub struct FastEmbedEncoder {
        model: Mutex<TextEmbedding>,
        dimension: usize,
    }

    impl FastEmbedEncoder {
        /// Load (downloading on first use) the model into `cache_dir`
        pub fn new(cache_dir: Option<PathBuf>) -> Result<Self, EncoderError> {
            let mut options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
                .with_show_download_progress(true);
            if let Some(dir) = cache_dir {
                options = options.with_cache_dir(dir);
            }

            let mut model = TextEmbedding::try_new(options)
                .map_err(|e| EncoderError::Unavailable(e.to_string()))?;

            let dimension = model
                .embed(vec!["probe"], None)
                .map_err(|e| EncoderError::Unavailable(format!("failed to probe dimensions: {}", e)))?
                .first()
                .map(|v| v.len())
                .ok_or_else(|| EncoderError::Unavailable("model returned no embedding".to_string()))?;

            Ok(Self {
                model: Mutex::new(model),
                dimension,
            })
        }
    }

    impl Encoder for FastEmbedEncoder {
        fn encode(&self, text: &str) -> Result<Vec<f32>, EncoderError> {
            let mut model = self
                .model
                .lock()
                .map_err(|e| EncoderError::Failed(format!("model lock poisoned: {}", e)))?;

            model
                .embed(vec![text], None)
                .map_err(|e| EncoderError::Failed(e.to_string()))?
                .into_iter()
                .next()
                .ok_or_else(|| EncoderError::Failed("no embedding returned".to_string()))
        }

        fn dimension(&self) -> Option<usize> {
            Some(self.dimension)
        }

        fn name(&self) -> &str {
            "all-MiniLM-L6-v2"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowEncoder(Duration);

    impl Encoder for SlowEncoder {
        fn encode(&self, _text: &str) -> Result<Vec<f32>, EncoderError> {
            std::thread::sleep(self.0);
            Ok(vec![1.0, 0.0])
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_hash_encoder_deterministic_and_normalized() {
        let encoder = HashEncoder::new(64);
        let v1 = encoder.encode("Red Floral").unwrap();
        let v2 = encoder.encode("red floral").unwrap();
        assert_eq!(v1.len(), 64);
        assert_eq!(v1, v2);

        let magnitude: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_hash_encoder_similarity_tracks_overlap() {
        let encoder = HashEncoder::default();
        let query = encoder.encode("red floral").unwrap();
        let close = encoder.encode("red floral frock").unwrap();
        let far = encoder.encode("blue striped").unwrap();
        assert!(cosine(&query, &close) > cosine(&query, &far));
    }

    #[test]
    fn test_hash_encoder_empty_text() {
        let encoder = HashEncoder::new(16);
        let v = encoder.encode("").unwrap();
        assert_eq!(v.len(), 16);
    }

    #[test]
    fn test_timed_encoder_passes_through() {
        let timed = TimedEncoder::new(Arc::new(HashEncoder::new(8)), Duration::from_secs(5));
        assert_eq!(timed.encode("linen").unwrap().len(), 8);
        assert_eq!(timed.dimension(), Some(8));
        assert_eq!(timed.name(), "hash-8");
    }

    #[test]
    fn test_timed_encoder_times_out() {
        let timed = TimedEncoder::new(
            Arc::new(SlowEncoder(Duration::from_millis(500))),
            Duration::from_millis(20),
        );
        assert!(matches!(timed.encode("x"), Err(EncoderError::Timeout(_))));
    }

    #[test]
    fn test_timed_encoder_caps_stragglers() {
        let timed = TimedEncoder::new(
            Arc::new(SlowEncoder(Duration::from_millis(300))),
            Duration::from_millis(10),
        )
        .with_max_in_flight(1);

        assert!(matches!(timed.encode("x"), Err(EncoderError::Timeout(_))));
        // first thread still sleeping, holding the only slot
        assert!(matches!(timed.encode("y"), Err(EncoderError::Unavailable(_))));

        std::thread::sleep(Duration::from_millis(600));
        assert!(matches!(timed.encode("z"), Err(EncoderError::Timeout(_))));
    }
}
