// Snapshot persistence for build artifacts
use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use lookbook_core::{CatalogRecord, ItemId, Vector};
use lookbook_similarity::{AestheticProfile, ArtifactParts, BuildArtifact, BuildInfo, ClusterParts};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;
const SNAPSHOT_EXTENSION: &str = "snapshot";
const CHECKSUM_EXTENSION: &str = "sha256";

/// Snapshot description for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDescription {
    pub name: String,
    pub creation_time: Option<String>,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Build artifact as written to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSnapshot {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub encoder: String,
    pub dim: usize,
    pub seed: u64,
    pub items: Vec<ItemData>,
    pub aesthetics: Vec<AestheticData>,
    pub item_clusters: ClusterMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aesthetic_clusters: Option<ClusterMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemData {
    pub id: ItemId,
    pub description: String,
    pub image_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<String>,
    pub normalized_description: String,
    pub vector: Vec<f32>,
    pub cluster_id: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AestheticData {
    pub name: String,
    pub motif: String,
    pub colour: String,
    pub combined_text: String,
    pub vector: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterMeta {
    pub k: usize,
    pub seed: u64,
    pub centroids: Vec<Vec<f32>>,
}

impl ClusterMeta {
    fn from_parts(parts: &ClusterParts) -> Self {
        Self {
            k: parts.k,
            seed: parts.seed,
            centroids: parts.centroids.iter().map(|c| c.as_slice().to_vec()).collect(),
        }
    }

    fn into_parts(self, assignments: Vec<usize>) -> ClusterParts {
        ClusterParts {
            k: self.k,
            seed: self.seed,
            assignments,
            centroids: self.centroids.into_iter().map(Vector::new).collect(),
        }
    }
}

impl ArtifactSnapshot {
    pub fn from_artifact(artifact: &BuildArtifact) -> Self {
        let parts = artifact.to_parts();
        let item_clusters = ClusterMeta::from_parts(&parts.item_clusters);
        let aesthetic_clusters = parts.aesthetic_clusters.as_ref().map(ClusterMeta::from_parts);

        let items = parts
            .records
            .into_iter()
            .zip(parts.normalized)
            .zip(parts.item_vectors)
            .zip(parts.item_clusters.assignments)
            .map(|(((record, normalized), vector), cluster_id)| ItemData {
                id: record.id,
                description: record.description,
                image_ref: record.image_ref,
                features: record.features,
                normalized_description: normalized,
                vector: vector.into_inner(),
                cluster_id,
            })
            .collect();

        let aesthetic_assignments = parts.aesthetic_clusters.map(|c| c.assignments);
        let aesthetics = parts
            .aesthetics
            .into_iter()
            .zip(parts.aesthetic_vectors)
            .enumerate()
            .map(|(i, (profile, vector))| AestheticData {
                name: profile.name,
                motif: profile.motif,
                colour: profile.colour,
                combined_text: profile.combined,
                vector: vector.into_inner(),
                cluster_id: aesthetic_assignments.as_ref().and_then(|a| a.get(i).copied()),
            })
            .collect();

        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            created_at: Utc::now(),
            encoder: parts.info.encoder,
            dim: parts.info.dim,
            seed: parts.info.seed,
            items,
            aesthetics,
            item_clusters,
            aesthetic_clusters,
        }
    }

    /// Rebuild the artifact, validating every build invariant again
    pub fn into_artifact(self) -> Result<BuildArtifact> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            bail!(
                "unsupported snapshot format version {} (expected {})",
                self.format_version,
                SNAPSHOT_FORMAT_VERSION
            );
        }

        let mut records = Vec::with_capacity(self.items.len());
        let mut normalized = Vec::with_capacity(self.items.len());
        let mut item_vectors = Vec::with_capacity(self.items.len());
        let mut item_assignments = Vec::with_capacity(self.items.len());
        for item in self.items {
            records.push(CatalogRecord {
                id: item.id,
                description: item.description,
                image_ref: item.image_ref,
                features: item.features,
            });
            normalized.push(item.normalized_description);
            item_vectors.push(Vector::new(item.vector));
            item_assignments.push(item.cluster_id);
        }

        let mut aesthetics = Vec::with_capacity(self.aesthetics.len());
        let mut aesthetic_vectors = Vec::with_capacity(self.aesthetics.len());
        let mut aesthetic_assignments = Vec::with_capacity(self.aesthetics.len());
        for aesthetic in self.aesthetics {
            aesthetic_assignments.push(aesthetic.cluster_id);
            aesthetic_vectors.push(Vector::new(aesthetic.vector));
            aesthetics.push(AestheticProfile {
                name: aesthetic.name,
                motif: aesthetic.motif,
                colour: aesthetic.colour,
                combined: aesthetic.combined_text,
            });
        }

        let aesthetic_clusters = match self.aesthetic_clusters {
            Some(meta) => {
                let assignments = aesthetic_assignments
                    .into_iter()
                    .collect::<Option<Vec<usize>>>()
                    .ok_or_else(|| anyhow!("aesthetic clusters present but an aesthetic has no cluster id"))?;
                Some(meta.into_parts(assignments))
            }
            None => None,
        };

        let parts = ArtifactParts {
            info: BuildInfo {
                encoder: self.encoder,
                dim: self.dim,
                seed: self.seed,
            },
            records,
            normalized,
            item_vectors,
            item_clusters: self.item_clusters.into_parts(item_assignments),
            aesthetics,
            aesthetic_vectors,
            aesthetic_clusters,
        };
        BuildArtifact::from_parts(parts).context("snapshot violates index invariants")
    }
}

pub struct SnapshotManager {
    snapshot_dir: PathBuf,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(snapshot_dir: P) -> Result<Self> {
        let snapshot_dir = snapshot_dir.as_ref().to_path_buf();
        fs::create_dir_all(&snapshot_dir)
            .with_context(|| format!("failed to create {}", snapshot_dir.display()))?;
        Ok(Self { snapshot_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.snapshot_dir
    }

    /// Snapshot filename with a sortable timestamp
    fn generate_snapshot_name(created_at: &DateTime<Utc>) -> String {
        format!(
            "lookbook-{}.{}",
            created_at.format("%Y-%m-%d-%H-%M-%S-%6f"),
            SNAPSHOT_EXTENSION
        )
    }

    fn snapshot_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            bail!("invalid snapshot name '{}'", name);
        }
        Ok(self.snapshot_dir.join(name))
    }

    fn checksum_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".");
        name.push(CHECKSUM_EXTENSION);
        PathBuf::from(name)
    }

    /// Persist an artifact as a new snapshot
    pub fn save(&self, artifact: &BuildArtifact) -> Result<SnapshotDescription> {
        self.create(&ArtifactSnapshot::from_artifact(artifact))
    }

    /// Write a snapshot: gzip JSON to a temp file, rename into place, then
    /// write the checksum sidecar
    pub fn create(&self, snapshot: &ArtifactSnapshot) -> Result<SnapshotDescription> {
        let name = Self::generate_snapshot_name(&snapshot.created_at);
        let path = self.snapshot_path(&name)?;
        if path.exists() {
            bail!("snapshot '{}' already exists", name);
        }

        let json = serde_json::to_vec(snapshot)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        let compressed = encoder.finish()?;
        let checksum = format!("{:x}", Sha256::digest(&compressed));

        let tmp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path)
                .with_context(|| format!("failed to create {}", tmp_path.display()))?;
            file.write_all(&compressed)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;
        // Sidecar only once the data file is in place
        fs::write(Self::checksum_path(&path), &checksum)?;

        tracing::info!(
            "Created snapshot {} ({} items, {} bytes)",
            name,
            snapshot.items.len(),
            compressed.len()
        );

        Ok(SnapshotDescription {
            name,
            creation_time: Some(snapshot.created_at.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
            size: compressed.len() as u64,
            checksum: Some(checksum),
        })
    }

    /// All snapshots, newest first
    pub fn list(&self) -> Result<Vec<SnapshotDescription>> {
        let mut snapshots = Vec::new();
        for entry in fs::read_dir(&self.snapshot_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let metadata = fs::metadata(&path)?;
            let creation_time = metadata
                .modified()
                .ok()
                .map(|t| DateTime::<Utc>::from(t).format("%Y-%m-%dT%H:%M:%SZ").to_string());
            let checksum = fs::read_to_string(Self::checksum_path(&path))
                .ok()
                .map(|s| s.trim().to_string());

            snapshots.push(SnapshotDescription {
                name: name.to_string(),
                creation_time,
                size: metadata.len(),
                checksum,
            });
        }

        // Names embed the creation timestamp
        snapshots.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(snapshots)
    }

    /// Load a snapshot by name, verifying its checksum
    pub fn load(&self, name: &str) -> Result<ArtifactSnapshot> {
        let path = self.snapshot_path(name)?;
        if !path.exists() {
            bail!("snapshot '{}' not found", name);
        }

        let compressed = fs::read(&path)?;
        let expected = fs::read_to_string(Self::checksum_path(&path))
            .with_context(|| format!("checksum missing for snapshot '{}'", name))?;
        let actual = format!("{:x}", Sha256::digest(&compressed));
        if actual != expected.trim() {
            bail!(
                "checksum mismatch for snapshot '{}': expected {}, got {}",
                name,
                expected.trim(),
                actual
            );
        }

        Self::decode(&compressed).with_context(|| format!("failed to decode snapshot '{}'", name))
    }

    fn decode(compressed: &[u8]) -> Result<ArtifactSnapshot> {
        let mut decoder = GzDecoder::new(compressed);
        let mut json = Vec::new();
        decoder.read_to_end(&mut json)?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// Newest snapshot, if any
    pub fn load_latest(&self) -> Result<Option<(SnapshotDescription, ArtifactSnapshot)>> {
        match self.list()?.into_iter().next() {
            Some(description) => {
                let snapshot = self.load(&description.name)?;
                Ok(Some((description, snapshot)))
            }
            None => Ok(None),
        }
    }

    /// Load and validate a snapshot as a ready artifact
    pub fn load_artifact(&self, name: &str) -> Result<BuildArtifact> {
        self.load(name)?.into_artifact()
    }

    /// Delete a snapshot and its checksum; false if it did not exist
    pub fn delete(&self, name: &str) -> Result<bool> {
        let path = self.snapshot_path(name)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        let checksum = Self::checksum_path(&path);
        if checksum.exists() {
            fs::remove_file(checksum)?;
        }
        tracing::info!("Deleted snapshot {}", name);
        Ok(true)
    }
}
