use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::errors::IndexError;
use crate::index::embedding_store::EmbeddingStore;
use crate::index::{IngredientIndex, IngredientRecord};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    records: &'a [IngredientRecord],
    coordinates: &'a EmbeddingStore,
}

#[derive(Deserialize)]
struct Snapshot {
    #[serde(default)]
    version: u32,
    records: Vec<IngredientRecord>,
    coordinates: EmbeddingStore,
}

impl IngredientIndex {
    /// Writes the index as one JSON document. The coordinate matrix is stored
    /// as base64 little-endian `f32`.
    pub fn save_snapshot(&self, path: &Path) -> Result<(), IndexError> {
        let snapshot = SnapshotRef {
            version: SNAPSHOT_VERSION,
            records: self.records(),
            coordinates: self.store(),
        };
        let json = serde_json::to_string(&snapshot)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;
        info!(path = ?path, records = self.len(), "saved index snapshot");
        Ok(())
    }

    pub fn load_snapshot(path: &Path) -> Result<Self, IndexError> {
        if !path.exists() {
            return Err(IndexError::NotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&contents)?;
        if snapshot.records.is_empty() {
            return Err(IndexError::Empty(path.to_path_buf()));
        }
        let index = IngredientIndex::from_parts(snapshot.records, snapshot.coordinates)?;
        info!(
            path = ?path,
            version = snapshot.version,
            records = index.len(),
            dimension = index.embedding_dimension(),
            "loaded index snapshot"
        );
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::IndexError;
    use crate::index::test_support::sample_index;
    use crate::index::IngredientIndex;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_snapshot_reload_preserves_records_and_coordinates() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("index.json");
        let index = sample_index();
        index.save_snapshot(&path)?;

        let reloaded = IngredientIndex::load(&path)?;
        assert_eq!(reloaded.len(), index.len());
        for (a, b) in reloaded.records().iter().zip(index.records()) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.tags, b.tags);
            assert_eq!(a.cluster, b.cluster);
            assert!((a.health_score - b.health_score).abs() < 1e-9);
        }
        assert_eq!(reloaded.coordinates(7), index.coordinates(7));
        assert_eq!(reloaded.exact_row("tofu"), index.exact_row("tofu"));
        Ok(())
    }

    #[test]
    fn test_snapshot_with_truncated_matrix_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("index.json");
        sample_index().save_snapshot(&path)?;

        let mut value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        // One record too many for the stored matrix.
        let first = value["records"][0].clone();
        value["records"].as_array_mut().unwrap().push(first);
        std::fs::write(&path, serde_json::to_string(&value)?)?;

        let result = IngredientIndex::load_snapshot(&path);
        assert!(matches!(result, Err(IndexError::MatrixSizeMismatch { .. })));
        Ok(())
    }

    #[test]
    fn test_missing_snapshot() {
        let result = IngredientIndex::load_snapshot(std::path::Path::new("no_such_snapshot.json"));
        assert!(matches!(result, Err(IndexError::NotFound(_))));
    }
}
