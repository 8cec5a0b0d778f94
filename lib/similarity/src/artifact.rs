//! Build pipeline and its immutable product
//!
//! [`IndexBuilder::build`] runs the stages strictly in order: normalize the
//! catalog text, embed the catalog, embed the aesthetic profiles, partition the
//! catalog (and optionally the aesthetics). The result is a [`BuildArtifact`]
//! that the query engine only ever reads; a rebuild produces a new artifact.

use crate::catalog::CatalogRepository;
use lookbook_core::{
    AestheticRecord, CatalogRecord, ClusterIndex, Clusterer, EmbeddingStore, Encoder, Error,
    ItemId, KMeans, Result, TextNormalizer, Vector, DEFAULT_NOISE_TOKENS,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Parameters of one index build
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Substrings removed from catalog text before embedding
    pub noise_tokens: Vec<String>,
    /// Number of clusters for the catalog partition
    pub catalog_clusters: usize,
    /// Number of clusters for the aesthetic profiles, if they are clustered at all
    pub aesthetic_clusters: Option<usize>,
    pub seed: u64,
    /// Fixed encoder thread count; the global rayon pool when unset
    pub parallelism: Option<usize>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            noise_tokens: DEFAULT_NOISE_TOKENS.iter().map(|t| t.to_string()).collect(),
            catalog_clusters: 8,
            aesthetic_clusters: None,
            seed: 42,
            parallelism: None,
        }
    }
}

/// Descriptive facts about a finished build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildInfo {
    /// Name reported by the encoder that produced the vectors
    pub encoder: String,
    /// Shared vector dimension; 0 when nothing was embedded
    pub dim: usize,
    pub seed: u64,
}

/// A curated style profile with its combined embedding text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AestheticProfile {
    pub name: String,
    pub motif: String,
    pub colour: String,
    pub combined: String,
}

impl From<AestheticRecord> for AestheticProfile {
    fn from(record: AestheticRecord) -> Self {
        let combined = record.combined();
        Self {
            name: record.name,
            motif: record.motif,
            colour: record.colour,
            combined,
        }
    }
}

/// Borrowed view of one catalog item inside an artifact
#[derive(Debug, Clone, Copy)]
pub struct ClothingItem<'a> {
    pub id: &'a ItemId,
    pub description: &'a str,
    pub image_ref: &'a str,
    pub features: Option<&'a str>,
    pub normalized: &'a str,
    pub vector: &'a Vector,
    pub cluster: usize,
}

/// Cluster data as persisted, before validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterParts {
    pub k: usize,
    pub seed: u64,
    pub assignments: Vec<usize>,
    pub centroids: Vec<Vector>,
}

impl From<&ClusterIndex> for ClusterParts {
    fn from(index: &ClusterIndex) -> Self {
        Self {
            k: index.k(),
            seed: index.seed(),
            assignments: index.assignments().to_vec(),
            centroids: index.centroids().to_vec(),
        }
    }
}

/// Everything needed to reassemble an artifact without re-encoding
#[derive(Debug, Clone)]
pub struct ArtifactParts {
    pub info: BuildInfo,
    pub records: Vec<CatalogRecord>,
    pub normalized: Vec<String>,
    pub item_vectors: Vec<Vector>,
    pub item_clusters: ClusterParts,
    pub aesthetics: Vec<AestheticProfile>,
    pub aesthetic_vectors: Vec<Vector>,
    pub aesthetic_clusters: Option<ClusterParts>,
}

/// Immutable output of the build phase
#[derive(Debug, Clone)]
pub struct BuildArtifact {
    info: BuildInfo,
    catalog: CatalogRepository,
    normalized: Vec<String>,
    items: EmbeddingStore<ItemId>,
    item_clusters: ClusterIndex,
    aesthetics: Vec<AestheticProfile>,
    aesthetic_store: EmbeddingStore<String>,
    aesthetic_clusters: Option<ClusterIndex>,
}

impl BuildArtifact {
    /// Reassemble an artifact from persisted parts, re-checking every build invariant
    pub fn from_parts(parts: ArtifactParts) -> Result<Self> {
        let ArtifactParts {
            info,
            records,
            normalized,
            item_vectors,
            item_clusters,
            aesthetics,
            aesthetic_vectors,
            aesthetic_clusters,
        } = parts;

        if normalized.len() != records.len() {
            return Err(Error::InvalidConfig(format!(
                "{} normalized descriptions for {} items",
                normalized.len(),
                records.len()
            )));
        }

        let ids: Vec<ItemId> = records.iter().map(|r| r.id.clone()).collect();
        let items = EmbeddingStore::from_vectors(ids, item_vectors)?;
        let names: Vec<String> = aesthetics.iter().map(|a| a.name.clone()).collect();
        let aesthetic_store = EmbeddingStore::from_vectors(names, aesthetic_vectors)?;
        check_shared_dim(&items, &aesthetic_store)?;

        if !items.is_empty() && items.dim() != info.dim {
            return Err(Error::DimensionMismatch {
                expected: info.dim,
                actual: items.dim(),
            });
        }

        let item_clusters = restore_clusters(item_clusters, items.vectors())?;
        let aesthetic_clusters = aesthetic_clusters
            .map(|parts| restore_clusters(parts, aesthetic_store.vectors()))
            .transpose()?;

        Ok(Self {
            info,
            catalog: CatalogRepository::new(records)?,
            normalized,
            items,
            item_clusters,
            aesthetics,
            aesthetic_store,
            aesthetic_clusters,
        })
    }

    /// Decompose into owned parts for persistence
    pub fn to_parts(&self) -> ArtifactParts {
        ArtifactParts {
            info: self.info.clone(),
            records: self.catalog.records().to_vec(),
            normalized: self.normalized.clone(),
            item_vectors: self.items.vectors().to_vec(),
            item_clusters: ClusterParts::from(&self.item_clusters),
            aesthetics: self.aesthetics.clone(),
            aesthetic_vectors: self.aesthetic_store.vectors().to_vec(),
            aesthetic_clusters: self.aesthetic_clusters.as_ref().map(ClusterParts::from),
        }
    }

    pub fn info(&self) -> &BuildInfo {
        &self.info
    }

    pub fn catalog(&self) -> &CatalogRepository {
        &self.catalog
    }

    pub fn items(&self) -> &EmbeddingStore<ItemId> {
        &self.items
    }

    pub fn item_clusters(&self) -> &ClusterIndex {
        &self.item_clusters
    }

    pub fn aesthetics(&self) -> &[AestheticProfile] {
        &self.aesthetics
    }

    pub fn aesthetic_store(&self) -> &EmbeddingStore<String> {
        &self.aesthetic_store
    }

    pub fn aesthetic_clusters(&self) -> Option<&ClusterIndex> {
        self.aesthetic_clusters.as_ref()
    }

    pub fn aesthetic(&self, name: &str) -> Option<&AestheticProfile> {
        self.aesthetic_store
            .position(&name.to_string())
            .map(|i| &self.aesthetics[i])
    }

    /// Catalog item at store position `index`
    pub fn item(&self, index: usize) -> Option<ClothingItem<'_>> {
        let record = self.catalog.records().get(index)?;
        Some(ClothingItem {
            id: &record.id,
            description: &record.description,
            image_ref: &record.image_ref,
            features: record.features.as_deref(),
            normalized: &self.normalized[index],
            vector: &self.items.vectors()[index],
            cluster: self.item_clusters.assignment(index)?,
        })
    }

    /// Number of catalog items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.info.dim
    }
}

fn check_shared_dim(items: &EmbeddingStore<ItemId>, aesthetics: &EmbeddingStore<String>) -> Result<()> {
    if !items.is_empty() && !aesthetics.is_empty() && items.dim() != aesthetics.dim() {
        return Err(Error::DimensionMismatch {
            expected: items.dim(),
            actual: aesthetics.dim(),
        });
    }
    Ok(())
}

fn restore_clusters(parts: ClusterParts, vectors: &[Vector]) -> Result<ClusterIndex> {
    ClusterIndex::from_parts(parts.k, parts.seed, parts.assignments, parts.centroids, vectors)
}

/// Runs the build phase
pub struct IndexBuilder {
    config: BuildConfig,
    normalizer: TextNormalizer,
    clusterer: Arc<dyn Clusterer>,
}

impl IndexBuilder {
    pub fn new(config: BuildConfig) -> Result<Self> {
        if config.catalog_clusters == 0 || config.aesthetic_clusters == Some(0) {
            return Err(Error::InvalidConfig("cluster count must be at least 1".to_string()));
        }
        if config.parallelism == Some(0) {
            return Err(Error::InvalidConfig("parallelism must be at least 1".to_string()));
        }
        let normalizer = TextNormalizer::new(config.noise_tokens.iter().cloned())?;

        Ok(Self {
            config,
            normalizer,
            clusterer: Arc::new(KMeans::default()),
        })
    }

    /// Replace the default k-means clusterer
    pub fn with_clusterer(mut self, clusterer: Arc<dyn Clusterer>) -> Self {
        self.clusterer = clusterer;
        self
    }

    /// Build a new artifact. Any stage failure aborts the whole build.
    pub fn build(
        &self,
        records: Vec<CatalogRecord>,
        aesthetics: Vec<AestheticRecord>,
        encoder: &dyn Encoder,
    ) -> Result<BuildArtifact> {
        match self.config.parallelism {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| Error::InvalidConfig(format!("thread pool: {}", e)))?;
                pool.install(|| self.run(records, aesthetics, encoder))
            }
            None => self.run(records, aesthetics, encoder),
        }
    }

    fn run(
        &self,
        records: Vec<CatalogRecord>,
        aesthetics: Vec<AestheticRecord>,
        encoder: &dyn Encoder,
    ) -> Result<BuildArtifact> {
        let started = Instant::now();
        let catalog = CatalogRepository::new(records)?;

        let stage = Instant::now();
        let normalized: Vec<String> = catalog
            .records()
            .par_iter()
            .map(|r| self.normalizer.normalize(r.embedding_text()))
            .collect();
        info!("Normalized {} catalog descriptions in {:?}", normalized.len(), stage.elapsed());

        let stage = Instant::now();
        let ids: Vec<ItemId> = catalog.records().iter().map(|r| r.id.clone()).collect();
        let items = EmbeddingStore::build(ids, &normalized, encoder)?;
        info!(
            "Embedded {} catalog items (dim {}) in {:?}",
            items.len(),
            items.dim(),
            stage.elapsed()
        );

        // Aesthetic text is embedded as written; normalization is catalog-only.
        let stage = Instant::now();
        let aesthetics: Vec<AestheticProfile> = aesthetics.into_iter().map(Into::into).collect();
        let names: Vec<String> = aesthetics.iter().map(|a| a.name.clone()).collect();
        let combined: Vec<&str> = aesthetics.iter().map(|a| a.combined.as_str()).collect();
        let aesthetic_store = EmbeddingStore::build(names, &combined, encoder)?;
        check_shared_dim(&items, &aesthetic_store)?;
        info!("Embedded {} aesthetic profiles in {:?}", aesthetic_store.len(), stage.elapsed());

        let stage = Instant::now();
        let item_clusters = ClusterIndex::fit(
            &items,
            self.config.catalog_clusters,
            self.config.seed,
            self.clusterer.as_ref(),
        )?;
        let aesthetic_clusters = self
            .config
            .aesthetic_clusters
            .map(|k| ClusterIndex::fit(&aesthetic_store, k, self.config.seed, self.clusterer.as_ref()))
            .transpose()?;
        info!(
            "Clustered catalog into {} groups with {} (inertia {:.4}) in {:?}",
            item_clusters.k(),
            self.clusterer.name(),
            item_clusters.inertia(),
            stage.elapsed()
        );

        let dim = if items.is_empty() { aesthetic_store.dim() } else { items.dim() };
        let info = BuildInfo {
            encoder: encoder.name().to_string(),
            dim,
            seed: self.config.seed,
        };
        info!("Build finished in {:?}", started.elapsed());

        Ok(BuildArtifact {
            info,
            catalog,
            normalized,
            items,
            item_clusters,
            aesthetics,
            aesthetic_store,
            aesthetic_clusters,
        })
    }
}
