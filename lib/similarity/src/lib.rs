//! # Lookbook Similarity
//!
//! Build pipeline and ranked queries for the lookbook retrieval engine.
//!
//! [`IndexBuilder`] turns catalog and aesthetic rows into an immutable
//! [`BuildArtifact`]; [`SimilarityEngine`] answers two query modes over it:
//!
//! - **text**: cosine similarity between an encoded query and every catalog
//!   item, highest first
//! - **aesthetic**: Euclidean distance between a named aesthetic profile and
//!   every catalog item, closest first
//!
//! Both modes rank exhaustively, break ties by catalog order and return the
//! first `min(k, n)` items. [`CatalogRepository`] hydrates ranked ids into
//! display rows.
//!
//! ## Example
//!
//! ```rust
//! use lookbook_core::{AestheticRecord, CatalogRecord, HashEncoder};
//! use lookbook_similarity::{BuildConfig, IndexBuilder, SimilarityEngine};
//! use std::sync::Arc;
//!
//! let records = vec![
//!     CatalogRecord::new(1u64, "red floral dress", "img/1.jpg"),
//!     CatalogRecord::new(2u64, "blue striped shirt", "img/2.jpg"),
//!     CatalogRecord::new(3u64, "red floral frock", "img/3.jpg"),
//! ];
//! let aesthetics = vec![AestheticRecord::new("Cottagecore", "florals", "pastel green")];
//!
//! let config = BuildConfig { catalog_clusters: 2, ..Default::default() };
//! let encoder = Arc::new(HashEncoder::default());
//! let artifact = IndexBuilder::new(config)
//!     .unwrap()
//!     .build(records, aesthetics, encoder.as_ref())
//!     .unwrap();
//!
//! let engine = SimilarityEngine::new(Arc::new(artifact), encoder);
//! let hits = engine.search_by_text("red floral", 2).unwrap();
//! assert_eq!(hits.len(), 2);
//!
//! assert!(engine.search_by_aesthetic("Y2K", 10).is_empty());
//! ```

pub mod artifact;
pub mod catalog;
pub mod engine;
pub mod response;

pub use artifact::{
    AestheticProfile, ArtifactParts, BuildArtifact, BuildConfig, BuildInfo, ClothingItem,
    ClusterParts, IndexBuilder,
};
pub use catalog::{CatalogEntry, CatalogRepository};
pub use engine::SimilarityEngine;
pub use response::{QueryMode, QueryStats, ScoredItem, SearchHit, SearchResponse};
