//! Application-level errors (wraps domain errors)

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::DomainError;
use crate::infrastructure::store::StoreError;

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("cannot connect to {target}: {message}")]
    Connection { target: String, message: String },

    #[error("invalid input {path}: {message}")]
    InvalidInput { path: PathBuf, message: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl From<StoreError> for ApplicationError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unreachable { path, reason } => ApplicationError::Connection {
                target: path.display().to_string(),
                message: reason,
            },
            StoreError::Query(e) => ApplicationError::Domain(e.into()),
            other => ApplicationError::OperationFailed {
                context: "document store".to_string(),
                source: Box::new(other),
            },
        }
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
