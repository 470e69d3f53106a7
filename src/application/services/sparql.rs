//! SPARQL queries over the exported Turtle graph
//!
//! The graph is loaded into an in-memory oxigraph store. Each query writes
//! one result file named after its number: solutions as CSV, booleans as
//! text, graphs as Turtle. A failing query is recorded and the rest still run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use oxigraph::io::RdfFormat;
use oxigraph::sparql::results::QueryResultsFormat;
use oxigraph::sparql::{EvaluationError, QueryResults};
use oxigraph::store::Store;
use tracing::{debug, error, info, instrument};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::{split_sparql_queries, SparqlQuery};
use crate::infrastructure::traits::FileSystem;

/// Shape of a query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SparqlResultKind {
    /// SELECT, written as CSV
    Solutions,
    /// ASK, written as `true`/`false`
    Boolean(bool),
    /// CONSTRUCT or DESCRIBE, written as Turtle
    Graph,
}

impl SparqlResultKind {
    pub fn extension(&self) -> &'static str {
        match self {
            SparqlResultKind::Solutions => "csv",
            SparqlResultKind::Boolean(_) => "txt",
            SparqlResultKind::Graph => "ttl",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparqlOutput {
    pub number: usize,
    pub kind: SparqlResultKind,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparqlFailure {
    pub number: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparqlSummary {
    /// Triples in the loaded graph
    pub triples: usize,
    pub outputs: Vec<SparqlOutput>,
    pub failures: Vec<SparqlFailure>,
}

/// Runs numbered SPARQL queries against a Turtle file.
pub struct SparqlService {
    fs: Arc<dyn FileSystem>,
}

impl SparqlService {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Load a Turtle file into a fresh in-memory store.
    pub fn load_graph(&self, graph: &Path) -> ApplicationResult<Store> {
        let content = self
            .fs
            .read_to_string(graph)
            .with_path_context("read graph", graph)?;
        let store = Store::new().map_err(|e| ApplicationError::OperationFailed {
            context: "open in-memory graph store".to_string(),
            source: Box::new(e),
        })?;
        store
            .load_from_reader(RdfFormat::Turtle, content.as_bytes())
            .map_err(|e| ApplicationError::InvalidInput {
                path: graph.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(store)
    }

    /// Run every query in `queries_file` against `graph`, writing results into `out_dir`.
    #[instrument(level = "debug", skip(self))]
    pub fn run(
        &self,
        queries_file: &Path,
        graph: &Path,
        out_dir: &Path,
    ) -> ApplicationResult<SparqlSummary> {
        let content = self
            .fs
            .read_to_string(queries_file)
            .with_path_context("read SPARQL queries", queries_file)?;
        let queries = split_sparql_queries(&content);
        debug!("{} queries in {}", queries.len(), queries_file.display());

        let store = self.load_graph(graph)?;
        let triples = store.len().map_err(|e| ApplicationError::OperationFailed {
            context: format!("count triples: {}", graph.display()),
            source: Box::new(e),
        })?;
        info!("{} triples loaded from {}", triples, graph.display());

        self.fs
            .create_dir_all(out_dir)
            .with_path_context("create SPARQL result directory", out_dir)?;

        let mut summary = SparqlSummary {
            triples,
            ..SparqlSummary::default()
        };
        for query in &queries {
            match self.run_query(&store, query, out_dir) {
                Ok(output) => summary.outputs.push(output),
                Err(e) => {
                    error!("SPARQL query {}: {}", query.number, e);
                    summary.failures.push(SparqlFailure {
                        number: query.number,
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(summary)
    }

    /// Evaluate one query and write its result file.
    pub fn run_query(
        &self,
        store: &Store,
        query: &SparqlQuery,
        out_dir: &Path,
    ) -> ApplicationResult<SparqlOutput> {
        let failed = |e: EvaluationError| ApplicationError::OperationFailed {
            context: format!("SPARQL query {}", query.number),
            source: Box::new(e),
        };

        let results = store.query(query.text.as_str()).map_err(failed)?;
        let (kind, bytes) = match results {
            QueryResults::Boolean(answer) => {
                (SparqlResultKind::Boolean(answer), answer.to_string().into_bytes())
            }
            solutions @ QueryResults::Solutions(_) => (
                SparqlResultKind::Solutions,
                solutions
                    .write(Vec::new(), QueryResultsFormat::Csv)
                    .map_err(failed)?,
            ),
            graph @ QueryResults::Graph(_) => (
                SparqlResultKind::Graph,
                graph.write_graph(Vec::new(), RdfFormat::Turtle).map_err(failed)?,
            ),
        };

        let path = out_dir.join(format!("query_{}.{}", query.number, kind.extension()));
        let text = String::from_utf8(bytes).map_err(|e| ApplicationError::OperationFailed {
            context: format!("encode SPARQL result {}", query.number),
            source: Box::new(e),
        })?;
        self.fs
            .write(&path, &text)
            .with_path_context("write SPARQL result", &path)?;

        info!("query {} -> {}", query.number, path.display());
        Ok(SparqlOutput {
            number: query.number,
            kind,
            path,
        })
    }
}
