//! Error types for package loading and DSL parsing.

use std::path::PathBuf;

use thiserror::Error;

use crate::Position;

/// Errors raised while loading and parsing source packages.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A file could not be read.
    #[error("{path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A file failed to parse as Rust source.
    #[error("{path}:{line}:{column}: {message}")]
    Syntax {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    /// A CLI pattern was malformed.
    #[error("invalid pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },

    /// A pattern matched no source files.
    #[error("no source files matched pattern `{0}`")]
    EmptyPattern(String),
}

/// Errors raised while parsing the option DSL.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A required option was absent.
    #[error("{position}: missing required option `{name}`")]
    MissingOption { name: String, position: Position },

    /// An option value had the wrong kind.
    #[error("{position}: option `{name}` must be {expected}, found {found}")]
    KindMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
        position: Position,
    },

    /// A top-level option name outside the closed vocabulary.
    #[error("{position}: unknown option `{name}`")]
    UnknownOption { name: String, position: Position },

    /// Structurally malformed DSL input.
    #[error("{position}: {message}")]
    Malformed { message: String, position: Position },
}
