//! Tests for ConvertService and LoadService

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;

use bioetl::application::services::{ConvertService, LoadService, LoadStatus};
use bioetl::application::ApplicationError;
use bioetl::config::{DatasetConfig, Settings};
use bioetl::infrastructure::traits::RealFileSystem;
use bioetl::infrastructure::{DocumentStore, JsonDirStore};
use bioetl::util::testing;

const PATIENT_TABLE: &str = "\
#Patient Identifier\tSex\tAge
#STRING\tSTRING\tNUMBER
PATIENT_ID\tSEX\tAGE_AT_DIAGNOSIS\tIGNORED
P1\t Female \t61\tx
P2\tMale\tNA\ty
P3\t\t38
";

/// Helper to create test settings rooted at a temp project directory
fn test_settings(project: &Path) -> Settings {
    testing::init_test_setup();
    Settings {
        project_dir: project.to_path_buf(),
        collections: vec!["patients".into(), "samples".into(), "uniprot".into()],
        datasets: vec![DatasetConfig {
            name: "patients".into(),
            source: PathBuf::from("patients.txt"),
            columns: vec!["SEX".into(), "PATIENT_ID".into(), "AGE_AT_DIAGNOSIS".into(), "MISSING".into()],
        }],
        ..Settings::default()
    }
}

fn write_file(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

// ============================================================
// ConvertService
// ============================================================

#[test]
fn given_raw_table_when_converting_then_cleaned_records_written() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let settings = test_settings(temp.path());
    write_file(&settings.raw_dir().join("patients.txt"), PATIENT_TABLE);
    let service = ConvertService::new(Arc::new(RealFileSystem), Arc::new(settings.clone()));

    // Act
    let converted = service.convert_all(&[]).unwrap();

    // Assert
    assert_eq!(converted.len(), 1);
    assert_eq!(converted[0].records, 3);
    assert_eq!(converted[0].missing_columns, vec!["MISSING"]);
    assert_eq!(
        read_json(&settings.cleaned_dir().join("patients.json")),
        json!([
            {"SEX": "Female", "PATIENT_ID": "P1", "AGE_AT_DIAGNOSIS": 61},
            {"SEX": "Male", "PATIENT_ID": "P2", "AGE_AT_DIAGNOSIS": null},
            {"SEX": null, "PATIENT_ID": "P3", "AGE_AT_DIAGNOSIS": 38}
        ])
    );
}

#[test]
fn given_output_key_order_when_converting_then_follows_configured_columns() {
    let temp = TempDir::new().unwrap();
    let settings = test_settings(temp.path());
    write_file(&settings.raw_dir().join("patients.txt"), PATIENT_TABLE);
    let service = ConvertService::new(Arc::new(RealFileSystem), Arc::new(settings.clone()));

    service.convert_all(&[]).unwrap();

    let records = read_json(&settings.cleaned_dir().join("patients.json"));
    let keys: Vec<&String> = records[0].as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["SEX", "PATIENT_ID", "AGE_AT_DIAGNOSIS"]);
}

#[test]
fn given_missing_source_when_converting_then_operation_failed() {
    let temp = TempDir::new().unwrap();
    let settings = test_settings(temp.path());
    let service = ConvertService::new(Arc::new(RealFileSystem), Arc::new(settings));

    let err = service.convert_all(&[]).unwrap_err();

    assert!(matches!(err, ApplicationError::OperationFailed { .. }));
    assert!(err.to_string().contains("patients.txt"));
}

#[test]
fn given_unknown_dataset_selection_when_converting_then_nothing_converted() {
    let temp = TempDir::new().unwrap();
    let settings = test_settings(temp.path());
    let service = ConvertService::new(Arc::new(RealFileSystem), Arc::new(settings));

    let converted = service.convert_all(&["genes".to_string()]).unwrap();

    assert!(converted.is_empty());
}

// ============================================================
// LoadService
// ============================================================

fn load_fixture() -> (TempDir, Settings, Arc<JsonDirStore>) {
    let temp = TempDir::new().unwrap();
    let settings = test_settings(temp.path());
    let store = Arc::new(JsonDirStore::create(settings.store_dir()).unwrap());
    (temp, settings, store)
}

#[test]
fn given_cleaned_files_when_loading_then_collections_replaced_and_missing_skipped() {
    // Arrange
    let (_temp, settings, store) = load_fixture();
    let cleaned = settings.cleaned_dir();
    write_file(&cleaned.join("patients.json"), r#"[{"PATIENT_ID": "P1"}, {"PATIENT_ID": "P2"}]"#);
    write_file(&cleaned.join("samples.json"), "[]");
    store
        .replace_collection("patients", vec![json!({"_id": "stale"})])
        .unwrap();
    let service = LoadService::new(Arc::new(RealFileSystem), store.clone(), Arc::new(settings));

    // Act
    let summary = service.load_all().unwrap();

    // Assert
    assert_eq!(
        summary.collections,
        vec![
            ("patients".to_string(), LoadStatus::Loaded(2)),
            ("samples".to_string(), LoadStatus::Empty),
            ("uniprot".to_string(), LoadStatus::Missing),
        ]
    );
    assert_eq!(summary.documents(), 2);

    let docs = store.documents("patients").unwrap();
    assert_eq!(docs.len(), 2);
    assert!(docs.iter().all(|d| d["_id"].is_string() && d["_id"] != "stale"));
}

#[test]
fn given_single_object_file_when_loading_then_one_document() {
    let (_temp, settings, store) = load_fixture();
    let path = settings.cleaned_dir().join("uniprot.json");
    write_file(&path, r#"{"accession": "P15056", "gene": "BRAF"}"#);
    let service = LoadService::new(Arc::new(RealFileSystem), store.clone(), Arc::new(settings));

    let status = service.load_file("uniprot", &path).unwrap();

    assert_eq!(status, LoadStatus::Loaded(1));
    assert_eq!(store.documents("uniprot").unwrap()[0]["gene"], "BRAF");
}

#[test]
fn given_scalar_file_when_loading_then_invalid_input() {
    let (_temp, settings, store) = load_fixture();
    let path = settings.cleaned_dir().join("uniprot.json");
    write_file(&path, "42");
    let service = LoadService::new(Arc::new(RealFileSystem), store, Arc::new(settings));

    let err = service.load_file("uniprot", &path).unwrap_err();

    assert!(matches!(err, ApplicationError::InvalidInput { .. }));
}

#[test]
fn given_absent_store_when_loading_then_connection_error() {
    let temp = TempDir::new().unwrap();
    let settings = test_settings(temp.path());
    let store = Arc::new(JsonDirStore::new(settings.store_dir()));
    let service = LoadService::new(Arc::new(RealFileSystem), store, Arc::new(settings));

    let err = service.load_all().unwrap_err();

    assert!(matches!(err, ApplicationError::Connection { .. }));
}
