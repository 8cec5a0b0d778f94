//! Result types for ranked queries
//!
//! [`ScoredItem`] is what the engine ranks; [`SearchHit`] is the same row
//! hydrated with catalog display fields, and [`SearchResponse`] wraps a hit
//! list with summary statistics for callers that render results.

use lookbook_core::ItemId;
use serde::Serialize;

/// Which query mode produced a result list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// Free-text query, scored by cosine similarity (higher is better)
    Text,
    /// Aesthetic profile query, scored by Euclidean distance (lower is better)
    Aesthetic,
}

/// A ranked catalog item before hydration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredItem {
    pub id: ItemId,
    /// Position of the item in the catalog store
    pub index: usize,
    pub score: f32,
}

/// A ranked catalog item with its display fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: ItemId,
    pub description: String,
    pub image_ref: String,
    pub score: f32,
}

/// Summary statistics for a ranked query
#[derive(Debug, Clone, Serialize)]
pub struct QueryStats {
    /// Number of catalog items scored
    pub candidates_count: usize,
    /// Number of results returned
    pub results_count: usize,
    /// Score of the first-ranked result
    pub best_score: Option<f32>,
    /// Mean score of the returned results
    pub mean_score: Option<f32>,
}

impl QueryStats {
    pub fn compute(hits: &[SearchHit], candidates_count: usize) -> Self {
        let mean_score = if hits.is_empty() {
            None
        } else {
            Some(hits.iter().map(|h| h.score).sum::<f32>() / hits.len() as f32)
        };

        Self {
            candidates_count,
            results_count: hits.len(),
            best_score: hits.first().map(|h| h.score),
            mean_score,
        }
    }
}

/// Hydrated results of one query
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub mode: QueryMode,
    pub query: String,
    pub hits: Vec<SearchHit>,
    pub stats: QueryStats,
}

impl SearchResponse {
    pub fn new(mode: QueryMode, query: impl Into<String>, hits: Vec<SearchHit>, candidates_count: usize) -> Self {
        let stats = QueryStats::compute(&hits, candidates_count);
        Self {
            mode,
            query: query.into(),
            hits,
            stats,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: u64, score: f32) -> SearchHit {
        SearchHit {
            id: ItemId::Integer(id),
            description: format!("item {}", id),
            image_ref: format!("img/{}.jpg", id),
            score,
        }
    }

    #[test]
    fn test_stats_empty() {
        let stats = QueryStats::compute(&[], 10);
        assert_eq!(stats.candidates_count, 10);
        assert_eq!(stats.results_count, 0);
        assert!(stats.best_score.is_none());
        assert!(stats.mean_score.is_none());
    }

    #[test]
    fn test_stats_best_is_first() {
        let stats = QueryStats::compute(&[hit(1, 0.9), hit(2, 0.5)], 4);
        assert_eq!(stats.best_score, Some(0.9));
        assert!((stats.mean_score.unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_response_serializes_mode() {
        let response = SearchResponse::new(QueryMode::Aesthetic, "Cottagecore", vec![hit(3, 0.2)], 3);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["mode"], "aesthetic");
        assert_eq!(json["hits"][0]["id"], 3);
        assert_eq!(json["stats"]["results_count"], 1);
    }
}
