//! Centroid-based partitioning of an embedding store.
//!
//! The cluster index is bookkeeping for diagnostics: it records which
//! partition each item falls into but is never used to prune queries.
//!
//! ## K-means
//!
//! [`KMeans`] seeds centroids with k-means++ from a `StdRng` created with
//! the caller's seed, then runs Lloyd iterations:
//!
//! ```text
//! J = Σ_c Σ_{x ∈ C_c} ||x - μ_c||²
//! ```
//!
//! Assignment ties go to the lowest centroid index and centroid sums are
//! accumulated in item order, so the same store, k and seed always give
//! the same assignments.

use crate::{EmbeddingStore, Error, Result, Vector};
use ahash::AHashSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::fmt::Display;
use std::hash::Hash;

/// Raw output of a clustering primitive
#[derive(Debug, Clone)]
pub struct ClusterFit {
    /// Cluster id per input vector, aligned by index
    pub assignments: Vec<usize>,
    /// One centroid per cluster
    pub centroids: Vec<Vector>,
}

/// A clustering primitive
pub trait Clusterer: Send + Sync {
    /// Partition `vectors` into exactly `k` groups.
    /// Must be deterministic for equal inputs and seed.
    fn fit(&self, vectors: &[Vector], k: usize, seed: u64) -> Result<ClusterFit>;

    fn name(&self) -> &str;
}

/// Lloyd's k-means with k-means++ seeding
#[derive(Debug, Clone)]
pub struct KMeans {
    pub max_iter: usize,
    /// Stop once no centroid moves further than this
    pub tolerance: f32,
}

impl Default for KMeans {
    fn default() -> Self {
        Self {
            max_iter: 300,
            tolerance: 1e-4,
        }
    }
}

impl KMeans {
    pub fn new(max_iter: usize, tolerance: f32) -> Self {
        Self { max_iter, tolerance }
    }

    fn init_plus_plus(vectors: &[Vector], k: usize, rng: &mut StdRng) -> Vec<Vector> {
        let first = rng.random_range(0..vectors.len());
        let mut centroids = vec![vectors[first].clone()];
        let mut d2: Vec<f64> = vectors
            .iter()
            .map(|v| f64::from(v.squared_l2_distance(&centroids[0])))
            .collect();

        while centroids.len() < k {
            let total: f64 = d2.iter().sum();
            if total <= 0.0 {
                break;
            }

            let target = rng.random::<f64>() * total;
            let mut acc = 0.0;
            let mut chosen = None;
            for (i, &w) in d2.iter().enumerate() {
                if w <= 0.0 {
                    continue;
                }
                acc += w;
                if acc > target {
                    chosen = Some(i);
                    break;
                }
            }
            let Some(next) = chosen.or_else(|| d2.iter().rposition(|&w| w > 0.0)) else {
                break;
            };

            let centroid = vectors[next].clone();
            for (i, v) in vectors.iter().enumerate() {
                let d = f64::from(v.squared_l2_distance(&centroid));
                if d < d2[i] {
                    d2[i] = d;
                }
            }
            centroids.push(centroid);
        }

        centroids
    }

    fn assign(vectors: &[Vector], centroids: &[Vector]) -> Vec<usize> {
        vectors
            .par_iter()
            .map(|v| nearest_centroid(v, centroids).0)
            .collect()
    }

    /// Mean of each cluster; clusters left empty keep their previous centroid
    fn update(vectors: &[Vector], assignments: &[usize], previous: &[Vector]) -> Vec<Vector> {
        let dim = previous.first().map(Vector::dim).unwrap_or(0);
        let mut sums = vec![vec![0.0f64; dim]; previous.len()];
        let mut counts = vec![0usize; previous.len()];

        for (v, &c) in vectors.iter().zip(assignments) {
            counts[c] += 1;
            for (s, x) in sums[c].iter_mut().zip(v.as_slice()) {
                *s += f64::from(*x);
            }
        }

        sums.into_iter()
            .zip(counts)
            .zip(previous)
            .map(|((sum, count), prev)| {
                if count == 0 {
                    prev.clone()
                } else {
                    Vector::new(sum.into_iter().map(|s| (s / count as f64) as f32).collect())
                }
            })
            .collect()
    }
}

impl Clusterer for KMeans {
    fn fit(&self, vectors: &[Vector], k: usize, seed: u64) -> Result<ClusterFit> {
        if k == 0 {
            return Err(Error::InvalidConfig("k must be at least 1".to_string()));
        }
        if vectors.len() < k {
            return Err(Error::InsufficientData {
                k,
                distinct: distinct_count(vectors),
            });
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut centroids = Self::init_plus_plus(vectors, k, &mut rng);
        if centroids.len() < k {
            return Err(Error::InsufficientData {
                k,
                distinct: distinct_count(vectors),
            });
        }

        let mut assignments = Self::assign(vectors, &centroids);
        for iteration in 0..self.max_iter {
            let updated = Self::update(vectors, &assignments, &centroids);
            let shift = centroids
                .iter()
                .zip(&updated)
                .map(|(old, new)| (new - old).norm())
                .fold(0.0f32, f32::max);
            centroids = updated;

            let next = Self::assign(vectors, &centroids);
            let changed = next != assignments;
            assignments = next;

            if !changed || shift <= self.tolerance {
                tracing::debug!(iterations = iteration + 1, shift, "k-means converged");
                break;
            }
        }

        Ok(ClusterFit {
            assignments,
            centroids,
        })
    }

    fn name(&self) -> &str {
        "kmeans"
    }
}

/// Index of the nearest centroid and the squared distance to it
fn nearest_centroid(v: &Vector, centroids: &[Vector]) -> (usize, f32) {
    let mut best = (0, f32::INFINITY);
    for (c, centroid) in centroids.iter().enumerate() {
        let d = v.squared_l2_distance(centroid);
        if d < best.1 {
            best = (c, d);
        }
    }
    best
}

/// Number of bit-distinct vectors
pub fn distinct_count(vectors: &[Vector]) -> usize {
    vectors
        .iter()
        .map(Vector::bit_key)
        .collect::<AHashSet<_>>()
        .len()
}

/// Cluster assignments and centroids for one store
#[derive(Debug, Clone)]
pub struct ClusterIndex {
    k: usize,
    seed: u64,
    assignments: Vec<usize>,
    centroids: Vec<Vector>,
    sizes: Vec<usize>,
    inertia: f64,
}

impl ClusterIndex {
    /// Partition `store` into `k` clusters.
    ///
    /// An empty store yields an empty index; otherwise `k` may not exceed the
    /// number of distinct vectors.
    pub fn fit<K>(
        store: &EmbeddingStore<K>,
        k: usize,
        seed: u64,
        clusterer: &dyn Clusterer,
    ) -> Result<Self>
    where
        K: Eq + Hash + Clone + Display,
    {
        if k == 0 {
            return Err(Error::InvalidConfig("k must be at least 1".to_string()));
        }
        if store.is_empty() {
            return Ok(Self::empty(k, seed));
        }

        let distinct = distinct_count(store.vectors());
        if k > distinct {
            return Err(Error::InsufficientData { k, distinct });
        }

        let fit = clusterer.fit(store.vectors(), k, seed)?;
        Self::from_parts(k, seed, fit.assignments, fit.centroids, store.vectors())
    }

    /// Index with no members, used for empty stores
    pub fn empty(k: usize, seed: u64) -> Self {
        Self {
            k,
            seed,
            assignments: Vec::new(),
            centroids: Vec::new(),
            sizes: Vec::new(),
            inertia: 0.0,
        }
    }

    /// Validate clusterer output (or restored data) against `vectors`
    pub fn from_parts(
        k: usize,
        seed: u64,
        assignments: Vec<usize>,
        centroids: Vec<Vector>,
        vectors: &[Vector],
    ) -> Result<Self> {
        if vectors.is_empty() && assignments.is_empty() {
            return Ok(Self::empty(k, seed));
        }
        if assignments.len() != vectors.len() {
            return Err(Error::InvalidConfig(format!(
                "{} cluster assignments for {} vectors",
                assignments.len(),
                vectors.len()
            )));
        }
        if centroids.len() != k {
            return Err(Error::InvalidConfig(format!(
                "expected {} centroids, got {}",
                k,
                centroids.len()
            )));
        }
        let dim = vectors[0].dim();
        if let Some(bad) = centroids.iter().find(|c| c.dim() != dim) {
            return Err(Error::DimensionMismatch {
                expected: dim,
                actual: bad.dim(),
            });
        }
        if let Some(&bad) = assignments.iter().find(|&&c| c >= k) {
            return Err(Error::InvalidConfig(format!(
                "cluster id {} out of range for k = {}",
                bad, k
            )));
        }

        let mut sizes = vec![0usize; k];
        let mut inertia = 0.0f64;
        for (v, &c) in vectors.iter().zip(&assignments) {
            sizes[c] += 1;
            inertia += f64::from(v.squared_l2_distance(&centroids[c]));
        }

        Ok(Self {
            k,
            seed,
            assignments,
            centroids,
            sizes,
            inertia,
        })
    }

    /// Within-cluster sum of squared distances for k = each of `ks`.
    ///
    /// Numeric input for choosing the cluster count offline.
    pub fn elbow<K, I>(
        store: &EmbeddingStore<K>,
        ks: I,
        seed: u64,
        clusterer: &dyn Clusterer,
    ) -> Result<Vec<(usize, f64)>>
    where
        K: Eq + Hash + Clone + Display,
        I: IntoIterator<Item = usize>,
    {
        ks.into_iter()
            .map(|k| Self::fit(store, k, seed, clusterer).map(|index| (k, index.inertia())))
            .collect()
    }

    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Cluster of the item at store position `index`
    #[inline]
    pub fn assignment(&self, index: usize) -> Option<usize> {
        self.assignments.get(index).copied()
    }

    #[inline]
    pub fn assignments(&self) -> &[usize] {
        &self.assignments
    }

    #[inline]
    pub fn centroids(&self) -> &[Vector] {
        &self.centroids
    }

    /// Store positions of the members of `cluster`, in store order
    pub fn members(&self, cluster: usize) -> Vec<usize> {
        self.assignments
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == cluster)
            .map(|(i, _)| i)
            .collect()
    }

    #[inline]
    pub fn cluster_sizes(&self) -> &[usize] {
        &self.sizes
    }

    #[inline]
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}
