use crate::artifact::BuildArtifact;
use crate::response::{QueryMode, ScoredItem, SearchHit, SearchResponse};
use lookbook_core::{Encoder, Error, Result, Vector};
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, warn};

/// Reason a query short-circuits to an empty result
#[derive(Debug, Clone, PartialEq, Eq)]
enum Miss {
    EmptyCatalog,
    NotFound(String),
}

impl Miss {
    fn log(&self, mode: QueryMode) {
        match self {
            Miss::EmptyCatalog => debug!("{:?} query against an empty catalog", mode),
            Miss::NotFound(name) => warn!("Unknown aesthetic '{}', returning no results", name),
        }
    }
}

/// Score direction of a ranking
#[derive(Debug, Clone, Copy)]
enum Order {
    /// Higher scores first (cosine similarity)
    Descending,
    /// Lower scores first (Euclidean distance)
    Ascending,
}

impl Order {
    /// Map a score to a key where smaller always ranks first. NaN ranks last.
    #[inline]
    fn rank_key(self, score: f32) -> OrderedFloat<f32> {
        if score.is_nan() {
            return OrderedFloat(f32::INFINITY);
        }
        match self {
            Order::Descending => OrderedFloat(-score),
            Order::Ascending => OrderedFloat(score),
        }
    }
}

/// Select the best `k` of `scores`, ties broken by position.
///
/// Partial selection on the total key `(rank_key, index)` followed by a sort
/// of the selected prefix; the result equals a stable full sort truncated to `k`.
fn top_k(scores: Vec<f32>, k: usize, order: Order) -> Vec<(usize, f32)> {
    let n = scores.len();
    let k = k.min(n);
    if k == 0 {
        return Vec::new();
    }

    let key = move |&(i, s): &(usize, f32)| (order.rank_key(s), i);
    let mut ranked: Vec<(usize, f32)> = scores.into_iter().enumerate().collect();
    if k < n {
        ranked.select_nth_unstable_by_key(k - 1, key);
        ranked.truncate(k);
    }
    ranked.sort_unstable_by_key(key);
    ranked
}

/// Answers ranked queries over one build artifact.
///
/// Cloning is cheap; every clone shares the same artifact and encoder.
#[derive(Clone)]
pub struct SimilarityEngine {
    artifact: Arc<BuildArtifact>,
    encoder: Arc<dyn Encoder>,
}

impl std::fmt::Debug for SimilarityEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityEngine")
            .field("encoder", &self.encoder.name())
            .field("items", &self.artifact.len())
            .field("dim", &self.artifact.dim())
            .finish()
    }
}

impl SimilarityEngine {
    pub fn new(artifact: Arc<BuildArtifact>, encoder: Arc<dyn Encoder>) -> Self {
        Self { artifact, encoder }
    }

    pub fn artifact(&self) -> &Arc<BuildArtifact> {
        &self.artifact
    }

    pub fn encoder(&self) -> &Arc<dyn Encoder> {
        &self.encoder
    }

    fn precheck_text(&self) -> std::result::Result<(), Miss> {
        if self.artifact.is_empty() {
            return Err(Miss::EmptyCatalog);
        }
        Ok(())
    }

    fn precheck_aesthetic(&self, name: &str) -> std::result::Result<&Vector, Miss> {
        if self.artifact.is_empty() {
            return Err(Miss::EmptyCatalog);
        }
        self.artifact
            .aesthetic_store()
            .get(&name.to_string())
            .map_err(|_| Miss::NotFound(name.to_string()))
    }

    /// Encode query text into the artifact's vector space
    pub fn encode_query(&self, query: &str) -> Result<Vector> {
        let vector = self.encoder.encode(query).map(Vector::new).map_err(Error::encoding)?;
        if !self.artifact.is_empty() && vector.dim() != self.artifact.dim() {
            return Err(Error::encoding(format!(
                "query vector has dimension {}, index has {}",
                vector.dim(),
                self.artifact.dim()
            )));
        }
        Ok(vector)
    }

    /// Top `k` catalog items by cosine similarity to `query`, best first.
    ///
    /// An empty catalog returns no results without calling the encoder.
    pub fn query_by_text(&self, query: &str, k: usize) -> Result<Vec<ScoredItem>> {
        if let Err(miss) = self.precheck_text() {
            miss.log(QueryMode::Text);
            return Ok(Vec::new());
        }
        let vector = self.encode_query(query)?;
        self.rank_by_cosine(&vector, k)
    }

    /// Rank the catalog against an already encoded query vector
    pub fn rank_by_cosine(&self, query: &Vector, k: usize) -> Result<Vec<ScoredItem>> {
        if let Err(miss) = self.precheck_text() {
            miss.log(QueryMode::Text);
            return Ok(Vec::new());
        }
        if query.dim() != self.artifact.dim() {
            return Err(Error::DimensionMismatch {
                expected: self.artifact.dim(),
                actual: query.dim(),
            });
        }

        let scores: Vec<f32> = self
            .artifact
            .items()
            .vectors()
            .par_iter()
            .map(|v| v.cosine_similarity(query))
            .collect();
        let results = self.collect_ranked(top_k(scores, k, Order::Descending));

        debug!(
            "Text query ranked {} items, returning {} (best {:?})",
            self.artifact.len(),
            results.len(),
            results.first().map(|r| r.score)
        );
        Ok(results)
    }

    /// Top `k` catalog items closest in Euclidean distance to the named
    /// aesthetic, closest first. Unknown names yield no results.
    pub fn query_by_aesthetic(&self, name: &str, k: usize) -> Vec<ScoredItem> {
        let target = match self.precheck_aesthetic(name) {
            Ok(vector) => vector,
            Err(miss) => {
                miss.log(QueryMode::Aesthetic);
                return Vec::new();
            }
        };

        let distances: Vec<f32> = self
            .artifact
            .items()
            .vectors()
            .par_iter()
            .map(|v| v.l2_distance(target))
            .collect();
        let results = self.collect_ranked(top_k(distances, k, Order::Ascending));

        debug!(
            "Aesthetic query '{}' ranked {} items, returning {} (closest {:?})",
            name,
            self.artifact.len(),
            results.len(),
            results.first().map(|r| r.score)
        );
        results
    }

    fn collect_ranked(&self, ranked: Vec<(usize, f32)>) -> Vec<ScoredItem> {
        let ids = self.artifact.items().ids();
        ranked
            .into_iter()
            .map(|(index, score)| ScoredItem {
                id: ids[index].clone(),
                index,
                score,
            })
            .collect()
    }

    /// [`query_by_text`](Self::query_by_text) hydrated with display fields
    pub fn search_by_text(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let scored = self.query_by_text(query, k)?;
        Ok(self.artifact.catalog().hydrate_scored(&scored))
    }

    /// [`query_by_aesthetic`](Self::query_by_aesthetic) hydrated with display fields
    pub fn search_by_aesthetic(&self, name: &str, k: usize) -> Vec<SearchHit> {
        let scored = self.query_by_aesthetic(name, k);
        self.artifact.catalog().hydrate_scored(&scored)
    }

    /// Run a query in either mode and wrap the hits with statistics
    pub fn respond(&self, mode: QueryMode, query: &str, k: usize) -> Result<SearchResponse> {
        let hits = match mode {
            QueryMode::Text => self.search_by_text(query, k)?,
            QueryMode::Aesthetic => self.search_by_aesthetic(query, k),
        };
        Ok(SearchResponse::new(mode, query, hits, self.artifact.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{BuildConfig, IndexBuilder};
    use lookbook_core::{AestheticRecord, CatalogRecord, EncoderError, HashEncoder, ItemId};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Maps known texts to fixed vectors; anything else fails
    struct TableEncoder {
        table: HashMap<&'static str, Vec<f32>>,
        calls: AtomicUsize,
    }

    impl TableEncoder {
        fn new(entries: Vec<(&'static str, Vec<f32>)>) -> Self {
            Self {
                table: entries.into_iter().collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Encoder for TableEncoder {
        fn encode(&self, text: &str) -> std::result::Result<Vec<f32>, EncoderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.table
                .get(text)
                .cloned()
                .ok_or_else(|| EncoderError::Failed(format!("no vector for '{}'", text)))
        }

        fn name(&self) -> &str {
            "table"
        }
    }

    fn engine_with(
        records: Vec<CatalogRecord>,
        aesthetics: Vec<AestheticRecord>,
        encoder: Arc<dyn Encoder>,
        k: usize,
    ) -> SimilarityEngine {
        let config = BuildConfig {
            catalog_clusters: k,
            ..Default::default()
        };
        let artifact = IndexBuilder::new(config)
            .unwrap()
            .build(records, aesthetics, encoder.as_ref())
            .unwrap();
        SimilarityEngine::new(Arc::new(artifact), encoder)
    }

    fn table_engine() -> (SimilarityEngine, Arc<TableEncoder>) {
        let encoder = Arc::new(TableEncoder::new(vec![
            ("red floral", vec![1.0, 0.0, 0.0]),
            ("blue striped", vec![0.0, 1.0, 0.0]),
            ("red floral frock", vec![0.9, 0.1, 0.0]),
            ("navy", vec![0.0, 0.0, 1.0]),
            ("florals pastel green", vec![1.0, 0.0, 0.0]),
            ("query red", vec![1.0, 0.0, 0.0]),
            ("short", vec![1.0, 0.0]),
        ]));
        let engine = engine_with(
            vec![
                CatalogRecord::new(1u64, "red floral dress", "1.jpg"),
                CatalogRecord::new(2u64, "blue striped shirt", "2.jpg"),
                CatalogRecord::new(3u64, "red floral frock", "3.jpg"),
                CatalogRecord::new(4u64, "navy", "4.jpg"),
            ],
            vec![AestheticRecord::new("Cottagecore", "florals", "pastel green")],
            encoder.clone(),
            2,
        );
        (engine, encoder)
    }

    fn ids(results: &[ScoredItem]) -> Vec<ItemId> {
        results.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn test_top_k_stable_ties() {
        let ranked = top_k(vec![0.5, 0.9, 0.5, 0.9, 0.1], 4, Order::Descending);
        assert_eq!(ranked, vec![(1, 0.9), (3, 0.9), (0, 0.5), (2, 0.5)]);

        let ranked = top_k(vec![2.0, 1.0, 1.0, 0.5], 3, Order::Ascending);
        assert_eq!(ranked, vec![(3, 0.5), (1, 1.0), (2, 1.0)]);
    }

    #[test]
    fn test_top_k_nan_ranks_last() {
        let ranked = top_k(vec![f32::NAN, 0.2, 0.8], 3, Order::Descending);
        assert_eq!(ranked[0], (2, 0.8));
        assert_eq!(ranked[1], (1, 0.2));
        assert!(ranked[2].1.is_nan());

        let ranked = top_k(vec![f32::NAN, 3.0], 1, Order::Ascending);
        assert_eq!(ranked, vec![(1, 3.0)]);
    }

    #[test]
    fn test_top_k_bounds() {
        assert!(top_k(vec![1.0, 2.0], 0, Order::Descending).is_empty());
        assert_eq!(top_k(vec![1.0, 2.0], 10, Order::Descending).len(), 2);
        assert!(top_k(Vec::new(), 3, Order::Ascending).is_empty());
    }

    #[test]
    fn test_text_query_cosine_descending() {
        let (engine, _) = table_engine();
        let results = engine.query_by_text("query red", 4).unwrap();

        assert_eq!(
            ids(&results),
            vec![ItemId::Integer(1), ItemId::Integer(3), ItemId::Integer(2), ItemId::Integer(4)]
        );
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_text_query_truncates_to_k() {
        let (engine, _) = table_engine();
        assert_eq!(engine.query_by_text("query red", 2).unwrap().len(), 2);
        assert!(engine.query_by_text("query red", 0).unwrap().is_empty());
    }

    #[test]
    fn test_text_query_ties_by_insertion_order() {
        let (engine, _) = table_engine();
        // Items 2 and 4 are both orthogonal to the query.
        let results = engine.query_by_text("query red", 4).unwrap();
        assert_eq!(results[2].score, results[3].score);
        assert_eq!(results[2].id, ItemId::Integer(2));
        assert_eq!(results[3].id, ItemId::Integer(4));
    }

    #[test]
    fn test_text_query_encoding_failure() {
        let (engine, _) = table_engine();
        let result = engine.query_by_text("unknown text", 3);
        assert!(matches!(result, Err(Error::EncodingFailure { index: None, .. })));
    }

    #[test]
    fn test_text_query_dimension_mismatch_is_encoding_failure() {
        let (engine, _) = table_engine();
        assert!(matches!(
            engine.query_by_text("short", 3),
            Err(Error::EncodingFailure { .. })
        ));
    }

    #[test]
    fn test_rank_by_cosine_rejects_wrong_dim() {
        let (engine, _) = table_engine();
        let result = engine.rank_by_cosine(&Vector::new(vec![1.0; 5]), 3);
        assert!(matches!(result, Err(Error::DimensionMismatch { expected: 3, actual: 5 })));
    }

    #[test]
    fn test_aesthetic_query_euclidean_ascending() {
        let (engine, _) = table_engine();
        let results = engine.query_by_aesthetic("Cottagecore", 3);

        assert_eq!(ids(&results), vec![ItemId::Integer(1), ItemId::Integer(3), ItemId::Integer(2)]);
        assert!(results[0].score.abs() < 1e-6);
        assert!(results.windows(2).all(|w| w[0].score <= w[1].score));
    }

    #[test]
    fn test_unknown_aesthetic_is_empty() {
        let (engine, _) = table_engine();
        assert!(engine.query_by_aesthetic("Y2K", 5).is_empty());
        assert!(engine.search_by_aesthetic("Y2K", 5).is_empty());
    }

    #[test]
    fn test_empty_catalog_skips_encoder() {
        let encoder = Arc::new(TableEncoder::new(vec![("florals pastel green", vec![1.0, 0.0, 0.0])]));
        let engine = engine_with(
            Vec::new(),
            vec![AestheticRecord::new("Cottagecore", "florals", "pastel green")],
            encoder.clone(),
            8,
        );
        let calls_after_build = encoder.calls.load(Ordering::SeqCst);

        assert!(engine.query_by_text("anything at all", 5).unwrap().is_empty());
        assert!(engine.query_by_aesthetic("Cottagecore", 5).is_empty());
        assert_eq!(encoder.calls.load(Ordering::SeqCst), calls_after_build);
    }

    #[test]
    fn test_search_hydrates_in_rank_order() {
        let (engine, _) = table_engine();
        let hits = engine.search_by_text("query red", 2).unwrap();
        assert_eq!(hits[0].description, "red floral dress");
        assert_eq!(hits[1].description, "red floral frock");
        assert_eq!(hits[1].image_ref, "3.jpg");
    }

    #[test]
    fn test_respond_stats() {
        let (engine, _) = table_engine();
        let response = engine.respond(QueryMode::Text, "query red", 3).unwrap();
        assert_eq!(response.stats.candidates_count, 4);
        assert_eq!(response.stats.results_count, 3);
        assert_eq!(response.hits[0].id, ItemId::Integer(1));
    }

    #[test]
    fn test_empty_query_text_is_encoded() {
        let engine = engine_with(
            vec![
                CatalogRecord::new(1u64, "red floral dress", "1.jpg"),
                CatalogRecord::new(2u64, "blue striped shirt", "2.jpg"),
            ],
            Vec::new(),
            Arc::new(HashEncoder::new(32)),
            1,
        );
        let results = engine.query_by_text("", 2).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_hash_encoder_red_floral_scenario() {
        let engine = engine_with(
            vec![
                CatalogRecord::new(1u64, "red floral dress", "1.jpg"),
                CatalogRecord::new(2u64, "blue striped shirt", "2.jpg"),
                CatalogRecord::new(3u64, "red floral frock", "3.jpg"),
            ],
            Vec::new(),
            Arc::new(HashEncoder::default()),
            2,
        );
        let results = engine.query_by_text("red floral", 2).unwrap();
        let mut top: Vec<_> = ids(&results);
        top.sort_by_key(|id| id.to_string());
        assert_eq!(top, vec![ItemId::Integer(1), ItemId::Integer(3)]);
    }
}
