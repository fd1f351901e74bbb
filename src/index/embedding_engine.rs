use anyhow::{anyhow, Result};
use model2vec_rs::model::StaticModel;

const EMBEDDING_MODEL_ID: &str = "minishlab/potion-base-32M";

/// Text embedder over ingredient names, backed by a model2vec static model.
pub trait NameEmbedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Failed to generate embedding for single text: {}", text))
    }
}

pub struct EmbeddingEngine {
    model: StaticModel,
}

impl EmbeddingEngine {
    /// Downloads (or reuses the cached) static model.
    pub fn new() -> Result<Self> {
        let model = StaticModel::from_pretrained(EMBEDDING_MODEL_ID, None, None, None)?;
        Ok(Self { model })
    }
}

impl NameEmbedder for EmbeddingEngine {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(self.model.encode(texts))
    }
}
