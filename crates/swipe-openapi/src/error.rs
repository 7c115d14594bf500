//! Error types for document assembly.

use thiserror::Error;

/// Errors that can occur while assembling or serializing a document.
#[derive(Debug, Error)]
pub enum OpenApiError {
    /// Structurally invalid document.
    #[error("invalid OpenAPI document: {message}")]
    InvalidDocument { message: String },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
