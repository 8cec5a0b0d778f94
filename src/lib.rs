//! # lookbook
//!
//! Embedding-based fashion retrieval: match free-text queries and curated
//! aesthetic profiles against a clothing catalog.
//!
//! A build normalizes catalog text, embeds catalog items and aesthetic
//! profiles with one encoder, and partitions the catalog with seeded k-means.
//! Queries then rank the whole catalog exhaustively:
//!
//! - **text**: cosine similarity, highest first
//! - **aesthetic**: Euclidean distance to the profile, closest first
//!
//! ## Quick Start
//!
//! ### As a CLI
//!
//! ```bash
//! lookbook build --catalog data/catalog.csv --aesthetics data/aesthetics.csv
//! lookbook search "red floral midi" -k 5
//! lookbook aesthetic Cottagecore -k 10
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use lookbook::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = LookbookConfig::default();
//! let service = Lookbook::new(&config, config.encoder()?)?;
//!
//! let records = load_catalog("data/catalog.csv")?;
//! let aesthetics = load_aesthetics("data/aesthetics.csv")?;
//! service.build(records, aesthetics).await?;
//!
//! let hits = service
//!     .search_by_text("red floral", None, &CancellationToken::new())
//!     .await?;
//! let styled = service.search_by_aesthetic("Cottagecore", Some(10))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Structure
//!
//! - `lookbook-core` - ids, vectors, normalizer, encoders, embedding store, clustering
//! - `lookbook-similarity` - build pipeline, artifact, similarity engine
//! - `lookbook-storage` - CSV loader and snapshots

pub mod config;
pub mod service;

pub use config::{EncoderKind, LookbookConfig};
pub use service::{IndexState, Lookbook, ServiceError, ServiceResult};

// Re-export core types
pub use lookbook_core::{
    AestheticRecord, CatalogRecord, ClusterIndex, Encoder, EncoderError, Error, HashEncoder,
    ItemId, KMeans, Result, TextNormalizer, Vector,
};

// Re-export the engine
pub use lookbook_similarity::{
    BuildArtifact, BuildConfig, IndexBuilder, QueryMode, ScoredItem, SearchHit, SearchResponse,
    SimilarityEngine,
};

// Re-export storage
pub use lookbook_storage::{load_aesthetics, load_catalog, ArtifactSnapshot, SnapshotManager};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        load_aesthetics, load_catalog, AestheticRecord, BuildArtifact, CatalogRecord, Encoder,
        Error, HashEncoder, ItemId, Lookbook, LookbookConfig, SearchHit, ServiceError,
        SimilarityEngine, SnapshotManager,
    };
}
