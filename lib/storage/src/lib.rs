//! # Lookbook Storage
//!
//! Dataset loading and artifact persistence for lookbook.
//!
//! - [`loader`] reads catalog and aesthetic CSV files, rejecting malformed
//!   rows before any build starts
//! - [`SnapshotManager`] writes gzip JSON snapshots of a
//!   [`BuildArtifact`](lookbook_similarity::BuildArtifact) with a SHA-256
//!   checksum sidecar, so a service can start serving without re-encoding

pub mod loader;
pub mod snapshot;

pub use loader::{load_aesthetics, load_catalog, read_aesthetics, read_catalog};
pub use snapshot::{
    AestheticData, ArtifactSnapshot, ClusterMeta, ItemData, SnapshotDescription, SnapshotManager,
    SNAPSHOT_FORMAT_VERSION,
};
