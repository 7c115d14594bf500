//! Emission errors.

use thiserror::Error;

/// Writer or formatter failure while emitting one file.
#[derive(Debug, Error)]
pub enum EmitError {
    /// The assembled source did not parse, so it cannot be formatted.
    #[error("generated source failed to format: {message}")]
    Format { message: String },

    /// Document serialization failed.
    #[error("document serialization failed: {0}")]
    Document(#[from] serde_json::Error),
}
