use std::path::PathBuf;

use thiserror::Error;

/// Failures while building or reloading the ingredient index.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Ingredient table not found at: {0:?}")]
    NotFound(PathBuf),
    #[error("Column '{0}' not found")]
    MissingColumn(String),
    #[error("No valid ingredient rows loaded from {0:?}")]
    Empty(PathBuf),
    #[error("Non-finite embedding value for ingredient '{name}' in column '{column}'")]
    NonFiniteEmbedding { name: String, column: String },
    #[error("Embedding dimension mismatch: snapshot has {found}, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Matrix size mismatch: expected {expected}, got {found}")]
    MatrixSizeMismatch { expected: usize, found: usize },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// The only fatal class of transformation failure is validation; every other
/// degradation is recovered inside the engine and reported in the result body.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
}

impl TransformError {
    pub fn validation(msg: impl Into<String>) -> Self {
        TransformError::Validation(msg.into())
    }
}

impl From<serde_json::Error> for TransformError {
    fn from(err: serde_json::Error) -> Self {
        TransformError::MalformedRequest(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ApiConnectionError {
    #[error("API key not found in environment: {0}")]
    MissingApiKey(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("API error {status}: {error_body}")]
    ApiError {
        status: reqwest::StatusCode,
        error_body: String,
    },
    #[error("No response choices received from API")]
    NoChoices,
}

/// Failure of one step-adaptation attempt. The engine recovers from all of
/// them by keeping the original steps.
#[derive(Error, Debug)]
pub enum StepAdaptationError {
    #[error(transparent)]
    Api(#[from] ApiConnectionError),
    #[error("Step adaptation timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("No numbered steps found in adapted text")]
    EmptyResponse,
    #[error("Step adaptation failed: {0}")]
    Other(String),
}
