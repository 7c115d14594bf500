//! Semantic errors raised while building models.

use std::path::PathBuf;

use swipe_parse::Position;
use thiserror::Error;

/// Violations of the model's semantic rules.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Malformed DSL bubbled up from option parsing.
    #[error(transparent)]
    Parse(#[from] swipe_parse::ParseError),

    /// The `iface` option did not resolve to a trait declaration.
    #[error("{position}: the iface option must name a trait; found `{found}`")]
    NotATrait { found: String, position: Position },

    /// A method's unnamed results exceeded one value.
    #[error(
        "{position}: interface method `{method}` with unnamed results cannot return more than one value"
    )]
    UnnamedMultiResult { method: String, position: Position },

    /// The `config_env` expression did not resolve to a struct.
    #[error("{position}: the config_env option requires a struct-typed value; found `{found}`")]
    NotAStruct { found: String, position: Position },

    /// A `signature` (or methods-list) value was not a method selector.
    #[error("{position}: the {name} value must be a method selector")]
    NotASelector { name: String, position: Position },

    /// Files of one package resolved to more than one directory.
    #[error("found conflicting directories {first:?} and {second:?}")]
    ConflictingDirectories { first: PathBuf, second: PathBuf },
}
