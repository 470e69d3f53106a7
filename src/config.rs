//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/bioetl/bioetl.toml`
//! 3. Local config: `<project_dir>/.bioetl.toml`
//! 4. Environment variables: `BIOETL_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::markup::DEFAULT_KIND_ATTRIBUTE;
use crate::domain::rdf::{DEFAULT_BASE_NS, DEFAULT_VOCAB_NS};
use crate::domain::tree::DEFAULT_ELEMENT_LABEL;

pub const CONFIG_FILE_NAME: &str = "bioetl.toml";
pub const LOCAL_CONFIG_FILE_NAME: &str = ".bioetl.toml";

/// One tab-delimited source table and the columns kept from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasetConfig {
    /// Output name: written as `<cleaned_dir>/<name>.json`
    pub name: String,
    /// Source file, relative to `raw_dir`
    pub source: PathBuf,
    /// Columns to keep, in output order (empty keeps all)
    #[serde(default)]
    pub columns: Vec<String>,
}

impl DatasetConfig {
    fn new(name: &str, source: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            source: PathBuf::from(source),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Tree and markup settings for reports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TreeConfig {
    /// Label of sequence element nodes
    pub element_label: String,
    /// Attribute carrying the node kind in XML output
    pub kind_attribute: String,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            element_label: DEFAULT_ELEMENT_LABEL.to_string(),
            kind_attribute: DEFAULT_KIND_ATTRIBUTE.to_string(),
        }
    }
}

/// RDF export settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RdfConfig {
    /// Namespace for classes and predicates
    pub vocab_ns: String,
    /// Namespace for document IRIs
    pub base_ns: String,
    /// Classes defined elsewhere; no `rdfs:Class` triple is emitted for them
    pub known_classes: Vec<String>,
    /// Collections to export (empty exports all)
    pub collections: Vec<String>,
}

impl Default for RdfConfig {
    fn default() -> Self {
        Self {
            vocab_ns: DEFAULT_VOCAB_NS.to_string(),
            base_ns: DEFAULT_BASE_NS.to_string(),
            known_classes: vec![],
            collections: vec![],
        }
    }
}

/// Raw settings for intermediate parsing (`None` means "not specified, inherit").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub raw_dir: Option<PathBuf>,
    pub cleaned_dir: Option<PathBuf>,
    pub store_dir: Option<PathBuf>,
    pub report_dir: Option<PathBuf>,
    pub queries_file: Option<PathBuf>,
    pub rdf_out: Option<PathBuf>,
    pub sparql_queries: Option<PathBuf>,
    pub sparql_dir: Option<PathBuf>,
    pub collections: Option<Vec<String>>,
    pub datasets: Option<Vec<DatasetConfig>>,
    pub tree: RawTreeConfig,
    pub rdf: RawRdfConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawTreeConfig {
    pub element_label: Option<String>,
    pub kind_attribute: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawRdfConfig {
    pub vocab_ns: Option<String>,
    pub base_ns: Option<String>,
    pub known_classes: Option<Vec<String>>,
    pub collections: Option<Vec<String>>,
}

/// Unified configuration for bioetl.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Directory holding the raw tab-delimited tables
    pub raw_dir: PathBuf,
    /// Directory for cleaned JSON files
    pub cleaned_dir: PathBuf,
    /// Document store directory
    pub store_dir: PathBuf,
    /// Directory for XML/HTML reports
    pub report_dir: PathBuf,
    /// Named queries used by `report` and `run`
    pub queries_file: PathBuf,
    /// Turtle output file
    pub rdf_out: PathBuf,
    /// SPARQL queries run by `sparql`
    pub sparql_queries: PathBuf,
    /// Directory for SPARQL results
    pub sparql_dir: PathBuf,
    /// Collections loaded into the store, one `<name>.json` each
    pub collections: Vec<String>,
    pub datasets: Vec<DatasetConfig>,
    pub tree: TreeConfig,
    pub rdf: RdfConfig,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub project_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            cleaned_dir: PathBuf::from("cleaned_data"),
            store_dir: PathBuf::from("store"),
            report_dir: PathBuf::from("results/reports"),
            queries_file: PathBuf::from("queries.txt"),
            rdf_out: PathBuf::from("results/rdf/graph.ttl"),
            sparql_queries: PathBuf::from("queries.sparql"),
            sparql_dir: PathBuf::from("results/sparql"),
            collections: [
                "patients",
                "samples",
                "variants",
                "oncokb_genes",
                "uniprot",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            datasets: default_datasets(),
            tree: TreeConfig::default(),
            rdf: RdfConfig::default(),
            project_dir: PathBuf::from("."),
        }
    }
}

fn default_datasets() -> Vec<DatasetConfig> {
    vec![
        DatasetConfig::new(
            "patients",
            "data_clinical_patient.txt",
            &[
                "PATIENT_ID",
                "OS_MONTHS",
                "OS_STATUS",
                "DFS_MONTHS",
                "DFS_STATUS",
                "AGE_AT_DIAGNOSIS",
                "SEX",
                "RACE",
                "METASTASIS",
                "TIME_TO_RECURRENCE_MONTHS",
                "SITE_FIRST_RECURRENCE",
                "TREATMENT",
                "LYMPH_NODE_EXAMINED_COUNT",
                "PRIMARY_MELANOMA_TUMOR_ULCERATION",
            ],
        ),
        DatasetConfig::new(
            "samples",
            "data_clinical_sample.txt",
            &[
                "PATIENT_ID",
                "SAMPLE_ID",
                "STAGE_AT_PRESENTATION",
                "PRIMARY_SITE",
                "SAMPLE_TYPE",
                "METASTATIC_SITE",
                "PRIMARY_DEPTH",
                "CANCER_TYPE",
                "CANCER_TYPE_DETAILED",
                "TMB_NONSYNONYMOUS",
            ],
        ),
        DatasetConfig::new(
            "variants",
            "data_mutations.txt",
            &[
                "Tumor_Sample_Barcode",
                "Matched_Norm_Sample_Barcode",
                "Hugo_Symbol",
                "Chromosome",
                "Start_Position",
                "End_Position",
                "Strand",
                "Consequence",
                "Variant_Classification",
                "Variant_Type",
                "Reference_Allele",
                "Tumor_Seq_Allele1",
                "HGVSc",
                "HGVSp",
                "HGVSp_Short",
                "t_ref_count",
                "t_alt_count",
                "t_depth",
                "Mutation_Status",
                "Verification_Status",
                "Validation_Status",
            ],
        ),
    ]
}

/// Get the XDG config directory for bioetl.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "bioetl").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Get the path to the local config file in a project directory.
pub fn local_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(LOCAL_CONFIG_FILE_NAME)
}

/// Expand `~`, `$VAR` and `${VAR}`; unknown variables leave the input unchanged.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Resolve a configured path against the project directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.resolve(&self.raw_dir)
    }

    pub fn cleaned_dir(&self) -> PathBuf {
        self.resolve(&self.cleaned_dir)
    }

    pub fn store_dir(&self) -> PathBuf {
        self.resolve(&self.store_dir)
    }

    pub fn report_dir(&self) -> PathBuf {
        self.resolve(&self.report_dir)
    }

    pub fn queries_file(&self) -> PathBuf {
        self.resolve(&self.queries_file)
    }

    pub fn rdf_out(&self) -> PathBuf {
        self.resolve(&self.rdf_out)
    }

    pub fn sparql_queries(&self) -> PathBuf {
        self.resolve(&self.sparql_queries)
    }

    pub fn sparql_dir(&self) -> PathBuf {
        self.resolve(&self.sparql_dir)
    }

    /// Expand shell variables and tilde in path-like fields.
    fn expand_paths(&mut self) {
        for path in [
            &mut self.raw_dir,
            &mut self.cleaned_dir,
            &mut self.store_dir,
            &mut self.report_dir,
            &mut self.queries_file,
            &mut self.rdf_out,
            &mut self.sparql_queries,
            &mut self.sparql_dir,
        ] {
            *path = PathBuf::from(expand_env_vars(path.to_string_lossy().as_ref()));
        }
    }

    /// Merge overlay config onto self. Scalars and arrays given in the overlay replace.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        let pick = |o: &Option<PathBuf>, base: &PathBuf| o.clone().unwrap_or_else(|| base.clone());
        Self {
            raw_dir: pick(&overlay.raw_dir, &self.raw_dir),
            cleaned_dir: pick(&overlay.cleaned_dir, &self.cleaned_dir),
            store_dir: pick(&overlay.store_dir, &self.store_dir),
            report_dir: pick(&overlay.report_dir, &self.report_dir),
            queries_file: pick(&overlay.queries_file, &self.queries_file),
            rdf_out: pick(&overlay.rdf_out, &self.rdf_out),
            sparql_queries: pick(&overlay.sparql_queries, &self.sparql_queries),
            sparql_dir: pick(&overlay.sparql_dir, &self.sparql_dir),
            collections: overlay
                .collections
                .clone()
                .unwrap_or_else(|| self.collections.clone()),
            datasets: overlay
                .datasets
                .clone()
                .unwrap_or_else(|| self.datasets.clone()),
            tree: TreeConfig {
                element_label: overlay
                    .tree
                    .element_label
                    .clone()
                    .unwrap_or_else(|| self.tree.element_label.clone()),
                kind_attribute: overlay
                    .tree
                    .kind_attribute
                    .clone()
                    .unwrap_or_else(|| self.tree.kind_attribute.clone()),
            },
            rdf: RdfConfig {
                vocab_ns: overlay
                    .rdf
                    .vocab_ns
                    .clone()
                    .unwrap_or_else(|| self.rdf.vocab_ns.clone()),
                base_ns: overlay
                    .rdf
                    .base_ns
                    .clone()
                    .unwrap_or_else(|| self.rdf.base_ns.clone()),
                known_classes: overlay
                    .rdf
                    .known_classes
                    .clone()
                    .unwrap_or_else(|| self.rdf.known_classes.clone()),
                collections: overlay
                    .rdf
                    .collections
                    .clone()
                    .unwrap_or_else(|| self.rdf.collections.clone()),
            },
            project_dir: self.project_dir.clone(),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `project_dir` - Project directory for local config and path resolution (default: cwd)
    ///
    /// # Precedence (lowest to highest)
    /// 1. Compiled defaults
    /// 2. Global config: `$XDG_CONFIG_HOME/bioetl/bioetl.toml`
    /// 3. Local config: `<project_dir>/.bioetl.toml`
    /// 4. Environment variables: `BIOETL_*` prefix, `__` for nesting
    pub fn load(project_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw);
            }
        }

        let project_dir = project_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let local_path = local_config_path(&project_dir);
        if local_path.exists() {
            let raw = load_raw_settings(&local_path)?;
            current = current.merge_with(&raw);
        }
        current.project_dir = project_dir;

        current = Self::apply_env_overrides(current)?;

        current.expand_paths();

        Ok(current)
    }

    /// Apply BIOETL_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("BIOETL")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("collections")
                    .with_list_parse_key("rdf.known_classes")
                    .with_list_parse_key("rdf.collections")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_err)?;

        for (key, path) in [
            ("raw_dir", &mut settings.raw_dir),
            ("cleaned_dir", &mut settings.cleaned_dir),
            ("store_dir", &mut settings.store_dir),
            ("report_dir", &mut settings.report_dir),
            ("queries_file", &mut settings.queries_file),
            ("rdf_out", &mut settings.rdf_out),
            ("sparql_queries", &mut settings.sparql_queries),
            ("sparql_dir", &mut settings.sparql_dir),
        ] {
            if let Ok(val) = config.get_string(key) {
                *path = PathBuf::from(val);
            }
        }
        if let Ok(val) = config.get::<Vec<String>>("collections") {
            settings.collections = val;
        }
        if let Ok(val) = config.get_string("tree.element_label") {
            settings.tree.element_label = val;
        }
        if let Ok(val) = config.get_string("tree.kind_attribute") {
            settings.tree.kind_attribute = val;
        }
        if let Ok(val) = config.get_string("rdf.vocab_ns") {
            settings.rdf.vocab_ns = val;
        }
        if let Ok(val) = config.get_string("rdf.base_ns") {
            settings.rdf.base_ns = val;
        }
        if let Ok(val) = config.get::<Vec<String>>("rdf.known_classes") {
            settings.rdf.known_classes = val;
        }
        if let Ok(val) = config.get::<Vec<String>>("rdf.collections") {
            settings.rdf.collections = val;
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# bioetl configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/bioetl/bioetl.toml
#   Local:  <project>/.bioetl.toml
#   Env:    BIOETL_* environment variables (BIOETL_TREE__ELEMENT_LABEL=item)
#
# Relative paths are resolved against the project directory.

# raw_dir = "data/raw"
# cleaned_dir = "cleaned_data"
# store_dir = "store"
# report_dir = "results/reports"
# queries_file = "queries.txt"
# rdf_out = "results/rdf/graph.ttl"
# sparql_queries = "queries.sparql"
# sparql_dir = "results/sparql"

# Collections loaded from <cleaned_dir>/<name>.json
# collections = ["patients", "samples", "variants", "oncokb_genes", "uniprot"]

[tree]
# element_label = "element"
# kind_attribute = "type"

[rdf]
# vocab_ns = "http://example.org/melanoma_es#"
# base_ns = "http://example.org/melanoma_es/"
# known_classes = ["patients", "samples"]
# collections = []

# Source tables cleaned by `bioetl convert` (replaces the built-in list)
# [[datasets]]
# name = "patients"
# source = "data_clinical_patient.txt"
# columns = ["PATIENT_ID", "SEX", "AGE_AT_DIAGNOSIS"]
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn given_no_local_config_when_loading_then_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let settings = Settings::load(Some(temp.path())).expect("load defaults");

        assert_eq!(settings.project_dir, temp.path());
        assert_eq!(settings.datasets.len(), 3);
        assert_eq!(settings.tree.element_label, "element");
    }

    #[test]
    fn given_local_config_when_loading_then_overrides_defaults() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(LOCAL_CONFIG_FILE_NAME),
            r#"
store_dir = "db"
collections = ["patients"]

[tree]
element_label = "item"

[[datasets]]
name = "genes"
source = "genes.tsv"
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(temp.path())).unwrap();

        assert_eq!(settings.store_dir(), temp.path().join("db"));
        assert_eq!(settings.collections, vec!["patients"]);
        assert_eq!(settings.tree.element_label, "item");
        assert_eq!(settings.tree.kind_attribute, "type");
        assert_eq!(settings.datasets.len(), 1);
        assert!(settings.datasets[0].columns.is_empty());
    }

    #[test]
    fn given_invalid_toml_when_loading_then_config_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(LOCAL_CONFIG_FILE_NAME), "store_dir = [").unwrap();

        let err = Settings::load(Some(temp.path())).unwrap_err();
        assert!(matches!(err, ApplicationError::Config { .. }));
    }

    #[test]
    fn given_tilde_in_path_when_expand_paths_then_expands_to_home() {
        let mut settings = Settings {
            store_dir: PathBuf::from("~/bioetl-store"),
            ..Settings::default()
        };

        settings.expand_paths();

        let home = std::env::var("HOME").expect("HOME should be set");
        assert!(settings.store_dir.to_string_lossy().starts_with(&home));
    }

    #[test]
    fn given_absolute_path_when_resolving_then_kept() {
        let settings = Settings {
            project_dir: PathBuf::from("/project"),
            ..Settings::default()
        };
        assert_eq!(settings.resolve(Path::new("/abs/x")), PathBuf::from("/abs/x"));
        assert_eq!(settings.resolve(Path::new("rel")), PathBuf::from("/project/rel"));
    }

    #[test]
    fn given_template_when_parsed_then_valid_toml() {
        let raw: RawSettings = toml::from_str(&Settings::template()).unwrap();
        assert!(raw.store_dir.is_none());
    }

    #[test]
    fn given_settings_when_to_toml_then_round_trips() {
        let settings = Settings::default();
        let text = settings.to_toml().unwrap();
        let back: Settings = toml::from_str(&text).unwrap();
        assert_eq!(back.datasets, settings.datasets);
        assert_eq!(back.rdf, settings.rdf);
    }
}
