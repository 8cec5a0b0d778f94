use crate::response::{ScoredItem, SearchHit};
use ahash::AHashMap;
use lookbook_core::{CatalogRecord, Error, ItemId, Result};
use serde::Serialize;

/// Display payload of one catalog item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub id: ItemId,
    pub description: String,
    pub image_ref: String,
}

/// Read-only mapping from item identity to display payload
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    records: Vec<CatalogRecord>,
    positions: AHashMap<ItemId, usize>,
}

impl CatalogRepository {
    pub fn new(records: Vec<CatalogRecord>) -> Result<Self> {
        let mut positions = AHashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if positions.insert(record.id.clone(), i).is_some() {
                return Err(Error::DuplicateId(record.id.to_string()));
            }
        }
        Ok(Self { records, positions })
    }

    pub fn get(&self, id: &ItemId) -> Result<&CatalogRecord> {
        self.positions
            .get(id)
            .map(|&i| &self.records[i])
            .ok_or_else(|| Error::NotFound(format!("catalog item {}", id)))
    }

    /// Records in catalog order
    pub fn records(&self) -> &[CatalogRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Display fields for `ids`, in exactly the given order.
    ///
    /// Missing ids are logged and skipped; the rest are still returned.
    pub fn hydrate(&self, ids: &[ItemId]) -> Vec<CatalogEntry> {
        ids.iter()
            .filter_map(|id| self.lookup(id))
            .map(|record| CatalogEntry {
                id: record.id.clone(),
                description: record.description.clone(),
                image_ref: record.image_ref.clone(),
            })
            .collect()
    }

    /// Like [`hydrate`](Self::hydrate), carrying each item's score along
    pub fn hydrate_scored(&self, scored: &[ScoredItem]) -> Vec<SearchHit> {
        scored
            .iter()
            .filter_map(|item| {
                self.lookup(&item.id).map(|record| SearchHit {
                    id: record.id.clone(),
                    description: record.description.clone(),
                    image_ref: record.image_ref.clone(),
                    score: item.score,
                })
            })
            .collect()
    }

    fn lookup(&self, id: &ItemId) -> Option<&CatalogRecord> {
        match self.get(id) {
            Ok(record) => Some(record),
            Err(_) => {
                tracing::warn!(%id, "catalog item missing during hydration, skipping");
                None
            }
        }
    }
}
