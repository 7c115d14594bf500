//! Typed OpenAPI 3.0 document model.
//!
//! The emitters assemble an [`OpenApi`] value and serialize it to JSON; the
//! maps are ordered so two runs over the same input produce byte-identical
//! documents.

mod error;
mod types;

pub use error::OpenApiError;
pub use types::*;

/// Result type for OpenAPI operations.
pub type Result<T> = std::result::Result<T, OpenApiError>;
