use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a catalog item
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Integer(u64),
    Uuid(Uuid),
    String(String),
}

impl ItemId {
    /// Parse a raw identity, preferring integer, then UUID, then plain string
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(i) = raw.parse::<u64>() {
            ItemId::Integer(i)
        } else if let Ok(u) = Uuid::parse_str(raw) {
            ItemId::Uuid(u)
        } else {
            ItemId::String(raw.to_string())
        }
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemId::String(s) => write!(f, "{}", s),
            ItemId::Uuid(u) => write!(f, "{}", u),
            ItemId::Integer(i) => write!(f, "{}", i),
        }
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId::String(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId::String(s.to_string())
    }
}

impl From<u64> for ItemId {
    fn from(i: u64) -> Self {
        ItemId::Integer(i)
    }
}

impl From<Uuid> for ItemId {
    fn from(u: Uuid) -> Self {
        ItemId::Uuid(u)
    }
}

/// One catalog row as delivered by the dataset loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: ItemId,
    /// Human-facing description, shown with results
    pub description: String,
    /// Image reference (path or URL)
    pub image_ref: String,
    /// Optional feature text; embedded instead of the description when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<String>,
}

impl CatalogRecord {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<ItemId>, description: impl Into<String>, image_ref: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            image_ref: image_ref.into(),
            features: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_features(mut self, features: impl Into<String>) -> Self {
        self.features = Some(features.into());
        self
    }

    /// Raw text fed to normalization and the encoder
    pub fn embedding_text(&self) -> &str {
        self.features.as_deref().unwrap_or(&self.description)
    }
}

/// One aesthetic row as delivered by the dataset loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AestheticRecord {
    pub name: String,
    pub motif: String,
    pub colour: String,
}

impl AestheticRecord {
    pub fn new(name: impl Into<String>, motif: impl Into<String>, colour: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            motif: motif.into(),
            colour: colour.into(),
        }
    }

    /// Motif and colour text joined by a single space
    pub fn combined(&self) -> String {
        format!("{} {}", self.motif, self.colour)
    }
}
