// CSV dataset loading for catalog and aesthetic rows
use ahash::AHashSet;
use anyhow::{anyhow, bail, Context, Result};
use lookbook_core::{AestheticRecord, CatalogRecord, ItemId};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Deserialize)]
struct CatalogRow {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    features: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AestheticRow {
    #[serde(rename = "Aesthetic", default)]
    name: Option<String>,
    #[serde(rename = "Key motifs", default)]
    motif: Option<String>,
    #[serde(rename = "Key colours", default)]
    colour: Option<String>,
}

/// Non-empty trimmed value of a required column
fn required(value: Option<String>, column: &str, line: usize) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("line {}: missing value for '{}'", line, column))
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Load catalog rows from a CSV file with `image,description,features`
/// headers and an optional `id` column.
pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<Vec<CatalogRecord>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open catalog {}", path.display()))?;
    read_catalog(file).with_context(|| format!("invalid catalog {}", path.display()))
}

/// Parse catalog rows. Rows without an `id` are keyed by their row index.
pub fn read_catalog<R: Read>(reader: R) -> Result<Vec<CatalogRecord>> {
    let now = Instant::now();
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut seen = AHashSet::new();
    let mut records = Vec::new();

    for (row, result) in csv_reader.deserialize::<CatalogRow>().enumerate() {
        let line = row + 2;
        let raw = result.with_context(|| format!("line {}: malformed row", line))?;

        let id = match optional(raw.id) {
            Some(id) => ItemId::parse(&id),
            None => ItemId::Integer(row as u64),
        };
        if !seen.insert(id.clone()) {
            bail!("line {}: duplicate item id {}", line, id);
        }

        let image = required(raw.image, "image", line)?;
        let description = required(raw.description, "description", line)?;
        let mut record = CatalogRecord::new(id, description, image);
        if let Some(features) = optional(raw.features) {
            record = record.with_features(features);
        }
        records.push(record);
    }

    tracing::debug!("read {} catalog rows in {:?}", records.len(), now.elapsed());
    Ok(records)
}

/// Load aesthetic profiles from a CSV file with
/// `Aesthetic,Key motifs,Key colours` headers.
pub fn load_aesthetics<P: AsRef<Path>>(path: P) -> Result<Vec<AestheticRecord>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open aesthetics {}", path.display()))?;
    read_aesthetics(file).with_context(|| format!("invalid aesthetics {}", path.display()))
}

pub fn read_aesthetics<R: Read>(reader: R) -> Result<Vec<AestheticRecord>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut seen = AHashSet::new();
    let mut records = Vec::new();

    for (row, result) in csv_reader.deserialize::<AestheticRow>().enumerate() {
        let line = row + 2;
        let raw = result.with_context(|| format!("line {}: malformed row", line))?;

        let name = required(raw.name, "Aesthetic", line)?;
        if !seen.insert(name.clone()) {
            bail!("line {}: duplicate aesthetic '{}'", line, name);
        }
        let motif = required(raw.motif, "Key motifs", line)?;
        let colour = required(raw.colour, "Key colours", line)?;
        records.push(AestheticRecord::new(name, motif, colour));
    }

    Ok(records)
}
