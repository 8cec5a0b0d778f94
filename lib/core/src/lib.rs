//! # Lookbook Core
//!
//! Core library for the lookbook fashion retrieval engine.
//!
//! This crate provides the building blocks of an index build:
//!
//! - [`ItemId`], [`CatalogRecord`], [`AestheticRecord`] - input rows
//! - [`TextNormalizer`] - noise-token removal applied before embedding
//! - [`Encoder`] - text to vector contract, with [`HashEncoder`] and [`TimedEncoder`]
//! - [`EmbeddingStore`] - immutable, insertion-ordered id → vector arena
//! - [`ClusterIndex`] - k-means partitioning for diagnostics
//!
//! ## Example
//!
//! ```rust
//! use lookbook_core::{ClusterIndex, EmbeddingStore, HashEncoder, ItemId, KMeans, TextNormalizer};
//!
//! let normalizer = TextNormalizer::default();
//! let texts: Vec<String> = ["red floral dress", "blue striped shirt", "red floral frock"]
//!     .iter()
//!     .map(|t| normalizer.normalize(t))
//!     .collect();
//! let ids = (1..=3u64).map(ItemId::Integer).collect();
//!
//! let store = EmbeddingStore::build(ids, &texts, &HashEncoder::default()).unwrap();
//! let clusters = ClusterIndex::fit(&store, 2, 42, &KMeans::default()).unwrap();
//! assert_eq!(clusters.assignments().len(), 3);
//! ```

pub mod cluster;
pub mod encoder;
pub mod error;
pub mod item;
pub mod normalize;
pub mod store;
pub mod vector;

pub use cluster::{ClusterFit, ClusterIndex, Clusterer, KMeans};
pub use encoder::{Encoder, EncoderError, HashEncoder, TimedEncoder, DEFAULT_HASH_DIM};
#[cfg(feature = "fastembed")]
pub use encoder::FastEmbedEncoder;
pub use error::{Error, Result};
pub use item::{AestheticRecord, CatalogRecord, ItemId};
pub use normalize::{TextNormalizer, DEFAULT_NOISE_TOKENS};
pub use store::EmbeddingStore;
pub use vector::Vector;
