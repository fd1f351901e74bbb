use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

use crate::index::embedding_engine::NameEmbedder;
use crate::index::embedding_store::{EmbeddingStore, Metric};
use crate::index::{normalize_name, IngredientIndex, IngredientLookup};

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.75;

/// Name resolution with a semantic fallback: lexical matching first, then
/// the record whose name embedding is closest by cosine similarity, if that
/// similarity reaches the threshold.
pub struct SemanticMatcher {
    index: Arc<IngredientIndex>,
    embedder: Box<dyn NameEmbedder>,
    names: EmbeddingStore,
    threshold: f32,
}

impl SemanticMatcher {
    /// Embeds every record name once up front.
    pub fn new(index: Arc<IngredientIndex>, embedder: Box<dyn NameEmbedder>) -> Result<Self> {
        let texts: Vec<String> = index.records().iter().map(|r| normalize_name(&r.name)).collect();
        let vectors = embedder.embed(&texts)?;
        let dimension = vectors.first().map(Vec::len).unwrap_or(0);

        let mut names = EmbeddingStore::new(dimension, Metric::Cosine);
        for vector in &vectors {
            names.push(vector)?;
        }
        names.validate(index.len())?;
        info!(records = index.len(), dimension, "name embeddings ready");

        Ok(Self {
            index,
            embedder,
            names,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        })
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    fn semantic_row(&self, name: &str) -> Option<usize> {
        let query = self.embedder.embed_one(&normalize_name(name)).ok()?;
        let best = self.names.nearest(&query, 1, |_| true).into_iter().next()?;
        let similarity = 1.0 - best.distance;
        debug!(query = name, row = best.row, similarity, "semantic name match candidate");
        (similarity >= self.threshold).then_some(best.row)
    }
}

impl IngredientLookup for SemanticMatcher {
    fn index(&self) -> &IngredientIndex {
        &self.index
    }

    fn resolve(&self, name: &str) -> Option<usize> {
        self.index.resolve(name).or_else(|| self.semantic_row(name))
    }
}
