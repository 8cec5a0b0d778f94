use anyhow::{bail, Context, Result};
use lookbook_core::{Encoder, HashEncoder, DEFAULT_HASH_DIM, DEFAULT_NOISE_TOKENS};
use lookbook_similarity::BuildConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_CATALOG_CLUSTERS: usize = 8;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_TEXT_TOP_K: usize = 5;
pub const DEFAULT_AESTHETIC_TOP_K: usize = 10;
pub const DEFAULT_ENCODE_TIMEOUT_MS: u64 = 30_000;

fn default_noise_tokens() -> Vec<String> {
    DEFAULT_NOISE_TOKENS.iter().map(|t| t.to_string()).collect()
}

fn default_catalog_clusters() -> usize {
    DEFAULT_CATALOG_CLUSTERS
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_text_top_k() -> usize {
    DEFAULT_TEXT_TOP_K
}

fn default_aesthetic_top_k() -> usize {
    DEFAULT_AESTHETIC_TOP_K
}

fn default_hash_dim() -> usize {
    DEFAULT_HASH_DIM
}

fn default_encode_timeout_ms() -> u64 {
    DEFAULT_ENCODE_TIMEOUT_MS
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

/// Which text encoder produces embeddings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EncoderKind {
    /// Deterministic feature hashing, no model required
    #[default]
    Hash,
    /// all-MiniLM-L6-v2 through fastembed (requires the `fastembed` feature)
    Fastembed,
}

/// Runtime configuration, loaded from a JSON file. Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookbookConfig {
    /// Substrings stripped from catalog text before embedding
    #[serde(default = "default_noise_tokens")]
    pub noise_tokens: Vec<String>,

    #[serde(default = "default_catalog_clusters")]
    pub catalog_clusters: usize,

    /// Cluster the aesthetic profiles too when set
    #[serde(default)]
    pub aesthetic_clusters: Option<usize>,

    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Results returned by text queries when no k is given
    #[serde(default = "default_text_top_k")]
    pub text_top_k: usize,

    /// Results returned by aesthetic queries when no k is given
    #[serde(default = "default_aesthetic_top_k")]
    pub aesthetic_top_k: usize,

    #[serde(default)]
    pub encoder: EncoderKind,

    /// Output dimension of the hash encoder
    #[serde(default = "default_hash_dim")]
    pub hash_dim: usize,

    /// Upper bound on a single encoder call, in milliseconds
    #[serde(default = "default_encode_timeout_ms")]
    pub encode_timeout_ms: u64,

    /// Encoder threads during build; all cores when unset
    #[serde(default)]
    pub parallelism: Option<usize>,

    /// Snapshots and model caches live under this directory
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for LookbookConfig {
    fn default() -> Self {
        Self {
            noise_tokens: default_noise_tokens(),
            catalog_clusters: DEFAULT_CATALOG_CLUSTERS,
            aesthetic_clusters: None,
            seed: DEFAULT_SEED,
            text_top_k: DEFAULT_TEXT_TOP_K,
            aesthetic_top_k: DEFAULT_AESTHETIC_TOP_K,
            encoder: EncoderKind::Hash,
            hash_dim: DEFAULT_HASH_DIM,
            encode_timeout_ms: DEFAULT_ENCODE_TIMEOUT_MS,
            parallelism: None,
            data_dir: default_data_dir(),
        }
    }
}

impl LookbookConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.catalog_clusters == 0 {
            bail!("catalog_clusters must be at least 1");
        }
        if self.aesthetic_clusters == Some(0) {
            bail!("aesthetic_clusters must be at least 1 when set");
        }
        if self.hash_dim == 0 {
            bail!("hash_dim must be at least 1");
        }
        if self.encode_timeout_ms == 0 {
            bail!("encode_timeout_ms must be positive");
        }
        if self.parallelism == Some(0) {
            bail!("parallelism must be at least 1 when set");
        }
        if self.noise_tokens.iter().any(|t| t.is_empty()) {
            bail!("noise_tokens may not contain empty strings");
        }
        Ok(())
    }

    pub fn build_config(&self) -> BuildConfig {
        BuildConfig {
            noise_tokens: self.noise_tokens.clone(),
            catalog_clusters: self.catalog_clusters,
            aesthetic_clusters: self.aesthetic_clusters,
            seed: self.seed,
            parallelism: self.parallelism,
        }
    }

    pub fn encode_timeout(&self) -> Duration {
        Duration::from_millis(self.encode_timeout_ms)
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.data_dir.join("snapshots")
    }

    /// Instantiate the configured encoder
    pub fn encoder(&self) -> Result<Arc<dyn Encoder>> {
        match self.encoder {
            EncoderKind::Hash => Ok(Arc::new(HashEncoder::new(self.hash_dim))),
            #[cfg(feature = "fastembed")]
            EncoderKind::Fastembed => {
                let encoder = lookbook_core::FastEmbedEncoder::new(Some(self.data_dir.join("models")))?;
                Ok(Arc::new(encoder))
            }
            #[cfg(not(feature = "fastembed"))]
            EncoderKind::Fastembed => bail!("this build does not include the fastembed encoder"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = LookbookConfig::default();
        assert_eq!(config.catalog_clusters, 8);
        assert_eq!(config.seed, 42);
        assert_eq!(config.text_top_k, 5);
        assert_eq!(config.aesthetic_top_k, 10);
        assert_eq!(config.encoder, EncoderKind::Hash);
        assert_eq!(config.noise_tokens.len(), 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"catalog_clusters": 4, "encoder": "hash", "aesthetic_clusters": 3}}"#).unwrap();

        let config = LookbookConfig::load(file.path()).unwrap();
        assert_eq!(config.catalog_clusters, 4);
        assert_eq!(config.aesthetic_clusters, Some(3));
        assert_eq!(config.seed, 42);
        assert_eq!(config.hash_dim, DEFAULT_HASH_DIM);

        let build = config.build_config();
        assert_eq!(build.catalog_clusters, 4);
        assert_eq!(build.aesthetic_clusters, Some(3));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"catalog_clusters": 0}}"#).unwrap();
        assert!(LookbookConfig::load(file.path()).is_err());

        let config = LookbookConfig {
            noise_tokens: vec!["".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_hash_encoder_from_config() {
        let config = LookbookConfig {
            hash_dim: 64,
            ..Default::default()
        };
        let encoder = config.encoder().unwrap();
        assert_eq!(encoder.dimension(), Some(64));
    }
}
