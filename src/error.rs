//! Error types for Keel

use thiserror::Error;

/// Result type for Keel operations
pub type Result<T> = std::result::Result<T, KeelError>;

/// Keel error types
#[derive(Error, Debug)]
pub enum KeelError {
    #[error("spec validation failed:\n{0}")]
    Validation(crate::validate::ValidationReport),

    #[error("spec parse error: {0}")]
    SpecParse(String),

    #[error("dependency cycle detected at resource: {0}")]
    DependencyCycle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}
