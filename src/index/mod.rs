//! Read-only ingredient index: per-100g nutrient vectors, nutritional
//! coordinates, health scores and diet tags, keyed by ingredient name.
//!
//! Built once (from CSV or a snapshot) and shared behind `Arc` between
//! concurrent requests. Nothing here mutates after construction.

pub mod data_loader;
pub mod embedding_engine;
pub mod embedding_store;
pub mod matcher;
pub mod snapshot;
pub mod tags;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

use crate::errors::IndexError;
use crate::nutrition::profile::NutrientVector;
use embedding_store::{EmbeddingStore, Neighbor};
use tags::TagSet;

pub use data_loader::load_ingredient_table;
pub use matcher::SemanticMatcher;
pub use tags::DietTag;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngredientRecord {
    pub name: String,
    /// Nutrients per 100 g.
    pub nutrients: NutrientVector,
    pub health_score: f64,
    pub cluster: Option<u32>,
    pub tags: TagSet,
}

impl IngredientRecord {
    pub fn has_tag(&self, tag: DietTag) -> bool {
        self.tags.contains(&tag)
    }
}

/// Lowercased, trimmed, single-spaced form used for every name comparison.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn words(name: &str) -> Vec<&str> {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

/// True when `needle`'s words appear as a contiguous run in `haystack`.
fn contains_words(haystack: &[&str], needle: &[&str]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

#[derive(Debug, Clone)]
pub struct IngredientIndex {
    records: Vec<IngredientRecord>,
    coordinates: EmbeddingStore,
    by_name: HashMap<String, usize>,
}

impl IngredientIndex {
    /// Assembles an index from records and their coordinates (row `i` of the
    /// store belongs to record `i`). Duplicate names keep the first record.
    pub fn from_parts(records: Vec<IngredientRecord>, coordinates: EmbeddingStore) -> Result<Self, IndexError> {
        coordinates.validate(records.len())?;
        let mut by_name = HashMap::with_capacity(records.len());
        for (row, record) in records.iter().enumerate() {
            let key = normalize_name(&record.name);
            if by_name.contains_key(&key) {
                warn!(name = %record.name, row, "duplicate ingredient name; keeping the first record");
                continue;
            }
            by_name.insert(key, row);
        }
        Ok(Self {
            records,
            coordinates,
            by_name,
        })
    }

    /// Loads a snapshot (`.json`) or a CSV ingredient table, by extension.
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::load_snapshot(path)
        } else {
            load_ingredient_table(path)
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[IngredientRecord] {
        &self.records
    }

    pub fn get(&self, row: usize) -> Option<&IngredientRecord> {
        self.records.get(row)
    }

    pub fn coordinates(&self, row: usize) -> Option<&[f32]> {
        self.coordinates.row(row)
    }

    pub fn embedding_dimension(&self) -> usize {
        self.coordinates.dimension()
    }

    pub(crate) fn store(&self) -> &EmbeddingStore {
        &self.coordinates
    }

    /// Rows nearest to `row` in coordinate space among those `filter` accepts.
    pub fn neighbors_of<F>(&self, row: usize, top_k: usize, filter: F) -> Vec<Neighbor>
    where
        F: Fn(usize) -> bool + Sync,
    {
        match self.coordinates.row(row) {
            Some(query) => self.coordinates.nearest(query, top_k, filter),
            None => Vec::new(),
        }
    }

    pub fn exact_row(&self, name: &str) -> Option<usize> {
        self.by_name.get(&normalize_name(name)).copied()
    }

    /// Word-level partial match. A record whose whole name appears in the
    /// query wins over one that merely contains the query; among those the
    /// longest record name wins, then the alphabetically first.
    pub fn partial_row(&self, name: &str) -> Option<usize> {
        let query = normalize_name(name);
        let query_words = words(&query);
        if query_words.is_empty() {
            return None;
        }

        let mut best: Option<(u8, usize, &str, usize)> = None;
        for (row, record) in self.records.iter().enumerate() {
            let record_name = normalize_name(&record.name);
            let record_words = words(&record_name);
            let rank = if contains_words(&query_words, &record_words) {
                2
            } else if contains_words(&record_words, &query_words) {
                1
            } else {
                continue;
            };
            let candidate = (rank, record.name.len(), record.name.as_str(), row);
            let better = match &best {
                None => true,
                Some((r, len, n, _)) => {
                    (rank, candidate.1) > (*r, *len) || ((rank, candidate.1) == (*r, *len) && candidate.2 < *n)
                }
            };
            if better {
                best = Some(candidate);
            }
        }
        best.map(|(_, _, _, row)| row)
    }
}

/// Resolves free recipe text to an index row.
pub trait IngredientLookup: Send + Sync {
    fn index(&self) -> &IngredientIndex;

    fn resolve(&self, name: &str) -> Option<usize>;

    fn record(&self, name: &str) -> Option<&IngredientRecord> {
        self.resolve(name).and_then(|row| self.index().get(row))
    }
}

impl IngredientLookup for IngredientIndex {
    fn index(&self) -> &IngredientIndex {
        self
    }

    fn resolve(&self, name: &str) -> Option<usize> {
        self.exact_row(name).or_else(|| self.partial_row(name))
    }
}
