//! Domain-level errors (no I/O concerns)

use std::path::PathBuf;
use thiserror::Error;

/// Domain errors represent invalid input to the pure transforms.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("{0}")]
    Query(#[from] QueryParseError),

    #[error("{0}")]
    Filter(#[from] FilterError),

    #[error("{0}")]
    Markup(#[from] MarkupError),

    #[error("invalid table {path}: {message}")]
    InvalidTable { path: PathBuf, message: String },
}

/// Query text that does not follow `db.<collection>.<operation>(<json>)`.
#[derive(Error, Debug)]
pub enum QueryParseError {
    #[error("invalid query: {0}")]
    Grammar(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("invalid JSON argument for {operation}: {source}")]
    InvalidJson {
        operation: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{operation} expects {expected}")]
    WrongArgument {
        operation: String,
        expected: &'static str,
    },
}

/// Filters and pipeline stages the in-memory evaluator cannot run.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("unsupported query operator: {0}")]
    UnsupportedOperator(String),

    #[error("unsupported pipeline stage: {0}")]
    UnsupportedStage(String),

    #[error("invalid {stage} stage: {message}")]
    InvalidStage { stage: String, message: String },

    #[error("invalid regex {pattern}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Markup that cannot be read back into a tree.
#[derive(Error, Debug)]
pub enum MarkupError {
    #[error("malformed markup: {0}")]
    Syntax(String),

    #[error("markup has no root element")]
    NoRoot,

    #[error("markup has more than one root element")]
    MultipleRoots,

    #[error("unknown node kind: {0}")]
    UnknownKind(String),
}
