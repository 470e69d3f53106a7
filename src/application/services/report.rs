//! Query reports: named queries → result trees → XML and HTML files
//!
//! Each query is processed in isolation. A query that fails to parse or run
//! is recorded in the summary and the remaining queries still run; only an
//! unreachable store aborts the whole report.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::application::stylesheet::{HtmlStylesheet, Stylesheet};
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::domain::{load_queries, parse_query, to_xml, MarkupOptions, NamedQuery, TreeBuilder};
use crate::infrastructure::store::DocumentStore;
use crate::infrastructure::traits::FileSystem;

/// Files written for one successful query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryReport {
    pub name: String,
    pub documents: usize,
    pub xml: PathBuf,
    pub rendered: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFailure {
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub reports: Vec<QueryReport>,
    pub failures: Vec<QueryFailure>,
}

impl ReportSummary {
    pub fn succeeded(&self) -> usize {
        self.reports.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Successful queries that returned no documents.
    pub fn empty(&self) -> usize {
        self.reports.iter().filter(|r| r.documents == 0).count()
    }
}

/// Runs named queries against the store and writes one report per query.
pub struct ReportService {
    fs: Arc<dyn FileSystem>,
    store: Arc<dyn DocumentStore>,
    settings: Arc<Settings>,
    stylesheet: Box<dyn Stylesheet>,
}

impl ReportService {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        store: Arc<dyn DocumentStore>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            fs,
            store,
            settings,
            stylesheet: Box::new(HtmlStylesheet),
        }
    }

    pub fn with_stylesheet(mut self, stylesheet: Box<dyn Stylesheet>) -> Self {
        self.stylesheet = stylesheet;
        self
    }

    fn builder(&self) -> TreeBuilder {
        TreeBuilder::new().with_element_label(&self.settings.tree.element_label)
    }

    fn markup_options(&self) -> MarkupOptions {
        MarkupOptions {
            kind_attribute: self.settings.tree.kind_attribute.clone(),
            ..MarkupOptions::default()
        }
    }

    /// Run every query in `queries_file`, writing reports into `out_dir`.
    #[instrument(level = "debug", skip(self))]
    pub fn run(&self, queries_file: &Path, out_dir: &Path) -> ApplicationResult<ReportSummary> {
        let content = self
            .fs
            .read_to_string(queries_file)
            .with_path_context("read queries", queries_file)?;
        let queries = load_queries(&content);
        debug!("{} queries in {}", queries.len(), queries_file.display());

        self.store.ping()?;
        self.fs
            .create_dir_all(out_dir)
            .with_path_context("create report directory", out_dir)?;

        let mut summary = ReportSummary::default();
        for query in &queries {
            match self.run_query(query, out_dir) {
                Ok(report) => summary.reports.push(report),
                Err(e @ ApplicationError::Connection { .. }) => return Err(e),
                Err(e) => {
                    error!("query {}: {}", query.name, e);
                    summary.failures.push(QueryFailure {
                        name: query.name.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            "reports: {} written, {} failed, {} empty",
            summary.succeeded(),
            summary.failed(),
            summary.empty()
        );
        Ok(summary)
    }

    /// Parse, execute and render a single named query.
    pub fn run_query(&self, query: &NamedQuery, out_dir: &Path) -> ApplicationResult<QueryReport> {
        let parsed = parse_query(&query.text).map_err(crate::domain::DomainError::from)?;
        debug!(
            "query {}: {}.{}",
            query.name,
            parsed.collection,
            parsed.operation.name()
        );

        let docs = parsed.execute(self.store.as_ref())?;
        if docs.is_empty() {
            warn!("query {} returned no documents", query.name);
        }
        let documents = docs.len();

        let tree = self.builder().build(&Value::Array(docs));
        let xml = to_xml(&tree, &self.markup_options()).map_err(crate::domain::DomainError::from)?;

        let stem = file_stem(&query.name);
        let xml_path = out_dir.join(format!("{stem}.xml"));
        self.fs
            .write(&xml_path, &xml)
            .with_path_context("write XML report", &xml_path)?;

        let rendered = self.stylesheet.render(&query.name, &tree);
        let rendered_path = out_dir.join(format!("{stem}.{}", self.stylesheet.extension()));
        self.fs
            .write(&rendered_path, &rendered)
            .with_path_context("write rendered report", &rendered_path)?;

        info!("query {}: {} documents -> {}", query.name, documents, rendered_path.display());
        Ok(QueryReport {
            name: query.name.clone(),
            documents,
            xml: xml_path,
            rendered: rendered_path,
        })
    }
}

/// Query name usable as a file name.
fn file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':' | '\0') { '_' } else { c })
        .collect();
    if stem.is_empty() || stem == "." || stem == ".." {
        "query".to_string()
    } else {
        stem
    }
}
