//! Emitters for the swipe generator.
//!
//! Generators are pure consumers of a model and a writer. Source generators
//! append Rust fragments to a shared [`SourceWriter`] keyed by output file;
//! document generators produce standalone bytes (OpenAPI JSON, Markdown).

use std::path::PathBuf;

mod config;
mod convert;
mod error;
mod jsonrpc;
mod markdown;
mod middleware;
mod openapi_gen;
mod rest;
mod writer;

pub use config::ConfigGenerator;
pub use convert::{write_convert_type, zero_check};
pub use error::EmitError;
pub use markdown::MarkdownGenerator;
pub use openapi_gen::OpenapiGenerator;
pub use rest::TransportGenerator;
pub use writer::{Format, PrettyFormat, SourceWriter};

/// A generator contributing Rust source to a framed output file.
///
/// Generators sharing a `(output_dir, filename)` key append to the same
/// file in invocation order.
pub trait SourceGenerator {
    /// Output file name; the shared transport file by default.
    fn filename(&self) -> String {
        "swipe_gen.rs".to_string()
    }

    /// Output directory relative to the entry point's base path; `None`
    /// writes into the base path itself.
    fn output_dir(&self) -> Option<PathBuf> {
        None
    }

    fn generate(&self, w: &mut SourceWriter) -> Result<(), EmitError>;
}

/// A generator producing a standalone document.
pub trait DocGenerator {
    fn filename(&self) -> String;

    /// Output directory relative to the entry point's base path.
    fn output_dir(&self) -> Option<PathBuf> {
        None
    }

    fn generate(&self) -> Result<Vec<u8>, EmitError>;
}
