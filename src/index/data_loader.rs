use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

use crate::errors::IndexError;
use crate::index::embedding_store::{EmbeddingStore, Metric};
use crate::index::tags::{derive_tags, parse_tag_cell};
use crate::index::{normalize_name, IngredientIndex, IngredientRecord};
use crate::nutrition::health_score::health_score;
use crate::nutrition::profile::{NutrientVector, NUTRIENT_COLUMNS};

// Expected column headers
const NAME_COL: &str = "name";
const HEALTH_SCORE_COL: &str = "health_score";
const CLUSTER_COL: &str = "cluster";
const TAGS_COL: &str = "tags";
const EMBEDDING_PREFIXES: [&str; 2] = ["emb_", "pca_"];

fn parse_optional_f64(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name))
}

fn required_column(headers: &StringRecord, name: &str) -> Result<usize, IndexError> {
    column(headers, name).ok_or_else(|| IndexError::MissingColumn(name.to_string()))
}

fn is_embedding_column(header: &str) -> bool {
    let lower = header.trim().to_lowercase();
    EMBEDDING_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
}

/// Loads the ingredient table into an [`IngredientIndex`].
///
/// Empty or unparseable nutrient cells count as 0. A missing `health_score`
/// is computed from the row's nutrients and missing `tags` are derived from
/// the name.
pub fn load_ingredient_table(csv_path: &Path) -> Result<IngredientIndex, IndexError> {
    if !csv_path.exists() {
        return Err(IndexError::NotFound(csv_path.to_path_buf()));
    }

    let file = std::fs::File::open(csv_path)?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(file);

    let headers = rdr.headers()?.clone();

    // Get column indices
    let name_idx = required_column(&headers, NAME_COL)?;
    let mut nutrient_idx = [0usize; 13];
    for (slot, col) in nutrient_idx.iter_mut().zip(NUTRIENT_COLUMNS) {
        *slot = required_column(&headers, col)?;
    }
    let score_idx = column(&headers, HEALTH_SCORE_COL);
    let cluster_idx = column(&headers, CLUSTER_COL);
    let tags_idx = column(&headers, TAGS_COL);
    let embedding_idx: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| is_embedding_column(h))
        .map(|(i, _)| i)
        .collect();

    let mut store = EmbeddingStore::new(embedding_idx.len(), Metric::Euclidean);
    let mut records = Vec::new();
    let mut seen = HashSet::new();

    for (row_index, result) in rdr.records().enumerate() {
        let record = result?;

        let name = record.get(name_idx).unwrap_or("").trim().to_string();
        if name.is_empty() {
            continue;
        }
        if !seen.insert(normalize_name(&name)) {
            warn!(name = %name, row = row_index, "duplicate ingredient row skipped");
            continue;
        }

        let mut values = [0.0; 13];
        for (value, idx) in values.iter_mut().zip(nutrient_idx) {
            *value = record.get(idx).and_then(parse_optional_f64).unwrap_or(0.0);
        }
        let nutrients = NutrientVector::from_array(values);

        let mut coords = Vec::with_capacity(embedding_idx.len());
        for &idx in &embedding_idx {
            let cell = record.get(idx).unwrap_or("").trim();
            match cell.parse::<f32>() {
                Ok(v) if v.is_finite() => coords.push(v),
                _ => {
                    return Err(IndexError::NonFiniteEmbedding {
                        name,
                        column: headers.get(idx).unwrap_or_default().to_string(),
                    })
                }
            }
        }

        let health = score_idx
            .and_then(|idx| record.get(idx))
            .and_then(parse_optional_f64)
            .map(|s| s.max(0.0))
            .unwrap_or_else(|| health_score(&nutrients));

        let cluster = cluster_idx
            .and_then(|idx| record.get(idx))
            .and_then(|s| s.trim().parse::<u32>().ok());

        let tag_cell = tags_idx.and_then(|idx| record.get(idx)).unwrap_or("").trim();
        let tags = if tag_cell.is_empty() {
            derive_tags(&name)
        } else {
            let (tags, unknown) = parse_tag_cell(tag_cell);
            if !unknown.is_empty() {
                warn!(name = %name, ?unknown, "ignoring unknown diet tags");
            }
            tags
        };

        store.push(&coords)?;
        records.push(IngredientRecord {
            name,
            nutrients,
            health_score: health,
            cluster,
            tags,
        });
    }

    if records.is_empty() {
        return Err(IndexError::Empty(csv_path.to_path_buf()));
    }

    info!(
        path = ?csv_path,
        records = records.len(),
        dimension = store.dimension(),
        "loaded ingredient table"
    );
    IngredientIndex::from_parts(records, store)
}
