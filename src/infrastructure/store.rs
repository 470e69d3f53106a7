//! Document store: named collections of JSON documents.
//!
//! [`JsonDirStore`] keeps one `<collection>.json` array per collection under a
//! store directory. Queries are evaluated in memory by [`crate::domain::filter`].

use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, instrument};
use walkdir::WalkDir;

use crate::domain::filter::{matches, run_pipeline};
use crate::domain::{FilterError, ParsedQuery, QueryOperation};

/// Errors from a document store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("document store unreachable: {path}: {reason}")]
    Unreachable { path: PathBuf, reason: String },

    #[error("collection {collection}: {source}")]
    Io {
        collection: String,
        #[source]
        source: std::io::Error,
    },

    #[error("collection {collection} is not a JSON array of documents: {message}")]
    Corrupt { collection: String, message: String },

    #[error("invalid collection name: {0}")]
    InvalidName(String),

    #[error("{0}")]
    Query(#[from] FilterError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Access to named document collections.
pub trait DocumentStore: Send + Sync {
    /// Fail with [`StoreError::Unreachable`] if the store cannot be used.
    fn ping(&self) -> StoreResult<()>;

    /// Collection names, sorted, without `system.*` collections.
    fn list_collections(&self) -> StoreResult<Vec<String>>;

    /// All documents of a collection in stored order; empty if it does not exist.
    fn documents(&self, collection: &str) -> StoreResult<Vec<Value>>;

    /// Replace the content of a collection. Returns the number of documents written.
    fn replace_collection(&self, collection: &str, docs: Vec<Value>) -> StoreResult<usize>;

    /// Documents matching `filter`, in stored order.
    fn find(&self, collection: &str, filter: &Value) -> StoreResult<Vec<Value>> {
        let mut out = Vec::new();
        for doc in self.documents(collection)? {
            if matches(&doc, filter)? {
                out.push(doc);
            }
        }
        Ok(out)
    }

    /// Result of an aggregation pipeline over the collection.
    fn aggregate(&self, collection: &str, pipeline: &[Value]) -> StoreResult<Vec<Value>> {
        Ok(run_pipeline(self.documents(collection)?, pipeline)?)
    }
}

impl ParsedQuery {
    /// Run the query against its collection in `store`.
    pub fn execute(&self, store: &dyn DocumentStore) -> StoreResult<Vec<Value>> {
        match &self.operation {
            QueryOperation::Find(filter) => store.find(&self.collection, filter),
            QueryOperation::Aggregate(pipeline) => store.aggregate(&self.collection, pipeline),
        }
    }
}

const COLLECTION_EXT: &str = "json";

/// Store backed by a directory of JSON array files.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open a store, creating its directory if needed.
    pub fn create(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| StoreError::Unreachable {
            path: root.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_path(&self, collection: &str) -> StoreResult<PathBuf> {
        let valid = !collection.is_empty()
            && !collection.starts_with('.')
            && collection
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(StoreError::InvalidName(collection.to_string()));
        }
        Ok(self.root.join(format!("{collection}.{COLLECTION_EXT}")))
    }
}

impl DocumentStore for JsonDirStore {
    fn ping(&self) -> StoreResult<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(StoreError::Unreachable {
                path: self.root.clone(),
                reason: "not a directory".to_string(),
            })
        }
    }

    fn list_collections(&self) -> StoreResult<Vec<String>> {
        self.ping()?;
        let mut names: Vec<String> = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == COLLECTION_EXT))
            .filter_map(|e| {
                e.path()
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
            })
            .filter(|name| !name.starts_with("system."))
            .collect();
        names.sort();
        Ok(names)
    }

    #[instrument(level = "debug", skip(self))]
    fn documents(&self, collection: &str) -> StoreResult<Vec<Value>> {
        self.ping()?;
        let path = self.collection_path(collection)?;
        if !path.exists() {
            debug!("collection {} does not exist", collection);
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| StoreError::Io {
            collection: collection.to_string(),
            source,
        })?;
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Array(docs)) => Ok(docs),
            Ok(_) => Err(StoreError::Corrupt {
                collection: collection.to_string(),
                message: "top-level value is not an array".to_string(),
            }),
            Err(e) => Err(StoreError::Corrupt {
                collection: collection.to_string(),
                message: e.to_string(),
            }),
        }
    }

    #[instrument(level = "debug", skip(self, docs), fields(count = docs.len()))]
    fn replace_collection(&self, collection: &str, docs: Vec<Value>) -> StoreResult<usize> {
        self.ping()?;
        let path = self.collection_path(collection)?;
        let docs: Vec<Value> = docs.into_iter().map(with_id).collect();
        let count = docs.len();

        let io_err = |source| StoreError::Io {
            collection: collection.to_string(),
            source,
        };
        let content = serde_json::to_string_pretty(&Value::Array(docs)).map_err(|e| {
            StoreError::Corrupt {
                collection: collection.to_string(),
                message: e.to_string(),
            }
        })?;

        // Write next to the target and rename, so readers never see a partial file.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root).map_err(io_err)?;
        tmp.write_all(content.as_bytes()).map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;

        debug!("wrote {} documents to {}", count, path.display());
        Ok(count)
    }
}

/// Give a document an `_id` if it has none.
fn with_id(doc: Value) -> Value {
    match doc {
        Value::Object(map) if !map.contains_key("_id") => {
            let mut out = Map::with_capacity(map.len() + 1);
            out.insert(
                "_id".to_string(),
                Value::String(uuid::Uuid::new_v4().to_string()),
            );
            out.extend(map);
            Value::Object(out)
        }
        other => other,
    }
}
