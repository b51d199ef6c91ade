//! Error types for the affect engine

use thiserror::Error;

/// Errors that can occur during inference or training
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model artifact schema mismatch: {0}")]
    ArtifactSchema(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Insufficient training data: {0}")]
    InsufficientData(String),
}
