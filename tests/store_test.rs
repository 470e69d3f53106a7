//! Tests for the JSON directory document store and query execution

use rstest::rstest;
use serde_json::{json, Value};
use tempfile::TempDir;

use bioetl::domain::parse_query;
use bioetl::infrastructure::{DocumentStore, JsonDirStore, StoreError};

fn patients() -> Vec<Value> {
    vec![
        json!({"_id": "p1", "PATIENT_ID": "P1", "SEX": "Female", "AGE": 61, "TREATMENT": ["IL2", "PD1"]}),
        json!({"_id": "p2", "PATIENT_ID": "P2", "SEX": "Male", "AGE": 45, "TREATMENT": []}),
        json!({"_id": "p3", "PATIENT_ID": "P3", "SEX": "Female", "AGE": 38, "stage": {"code": "IIIB"}}),
        json!({"_id": "p4", "PATIENT_ID": "P4", "SEX": null, "AGE": 70}),
    ]
}

fn seeded_store() -> (TempDir, JsonDirStore) {
    let temp = TempDir::new().unwrap();
    let store = JsonDirStore::new(temp.path());
    store.replace_collection("patients", patients()).unwrap();
    (temp, store)
}

fn ids(docs: &[Value]) -> Vec<&str> {
    docs.iter().filter_map(|d| d["_id"].as_str()).collect()
}

// ============================================================
// collections
// ============================================================

#[test]
fn given_collections_when_listing_then_sorted_without_system() {
    let (_temp, store) = seeded_store();
    store.replace_collection("samples", vec![]).unwrap();
    store.replace_collection("system.indexes", vec![]).unwrap();

    let names = store.list_collections().unwrap();

    assert_eq!(names, vec!["patients", "samples"]);
}

#[test]
fn given_existing_collection_when_replacing_then_previous_content_gone() {
    let (_temp, store) = seeded_store();

    let count = store
        .replace_collection("patients", vec![json!({"_id": "new"})])
        .unwrap();

    assert_eq!(count, 1);
    assert_eq!(ids(&store.documents("patients").unwrap()), vec!["new"]);
}

#[test]
fn given_missing_collection_when_finding_then_empty() {
    let (_temp, store) = seeded_store();
    assert!(store.find("nothing", &json!({})).unwrap().is_empty());
}

#[test]
fn given_unreachable_store_when_finding_then_unreachable_error() {
    let temp = TempDir::new().unwrap();
    let store = JsonDirStore::new(temp.path().join("absent"));

    let err = store.find("patients", &json!({})).unwrap_err();

    assert!(matches!(err, StoreError::Unreachable { .. }));
}

#[test]
fn given_corrupt_collection_file_when_reading_then_corrupt_error() {
    let (temp, store) = seeded_store();
    std::fs::write(temp.path().join("broken.json"), "{not json").unwrap();

    let err = store.documents("broken").unwrap_err();

    assert!(matches!(err, StoreError::Corrupt { .. }));
}

// ============================================================
// find()
// ============================================================

#[test]
fn given_equality_filter_when_finding_then_stored_order_kept() {
    let (_temp, store) = seeded_store();
    let docs = store.find("patients", &json!({"SEX": "Female"})).unwrap();
    assert_eq!(ids(&docs), vec!["p1", "p3"]);
}

#[test]
fn given_range_and_logical_operators_when_finding_then_filtered() {
    let (_temp, store) = seeded_store();

    let docs = store
        .find(
            "patients",
            &json!({"$or": [{"AGE": {"$gte": 65}}, {"AGE": {"$lt": 40}}]}),
        )
        .unwrap();

    assert_eq!(ids(&docs), vec!["p3", "p4"]);
}

#[test]
fn given_array_field_when_matching_element_then_found() {
    let (_temp, store) = seeded_store();
    let docs = store.find("patients", &json!({"TREATMENT": "PD1"})).unwrap();
    assert_eq!(ids(&docs), vec!["p1"]);
}

#[test]
fn given_dotted_path_when_finding_then_nested_field_matched() {
    let (_temp, store) = seeded_store();
    let docs = store.find("patients", &json!({"stage.code": "IIIB"})).unwrap();
    assert_eq!(ids(&docs), vec!["p3"]);
}

#[test]
fn given_in_exists_and_regex_when_finding_then_filtered() {
    let (_temp, store) = seeded_store();

    let in_docs = store
        .find("patients", &json!({"PATIENT_ID": {"$in": ["P2", "P4"]}}))
        .unwrap();
    let exists_docs = store
        .find("patients", &json!({"stage": {"$exists": true}}))
        .unwrap();
    let regex_docs = store
        .find("patients", &json!({"SEX": {"$regex": "^fem", "$options": "i"}}))
        .unwrap();

    assert_eq!(ids(&in_docs), vec!["p2", "p4"]);
    assert_eq!(ids(&exists_docs), vec!["p3"]);
    assert_eq!(ids(&regex_docs), vec!["p1", "p3"]);
}

#[test]
fn given_unknown_operator_when_finding_then_query_error() {
    let (_temp, store) = seeded_store();
    let err = store
        .find("patients", &json!({"AGE": {"$near": 1}}))
        .unwrap_err();
    assert!(matches!(err, StoreError::Query(_)));
}

// ============================================================
// aggregate()
// ============================================================

#[test]
fn given_group_pipeline_when_aggregating_then_counts_per_key_in_first_seen_order() {
    let (_temp, store) = seeded_store();

    let docs = store
        .aggregate(
            "patients",
            &[json!({"$group": {"_id": "$SEX", "n": {"$sum": 1}, "max_age": {"$max": "$AGE"}}})],
        )
        .unwrap();

    assert_eq!(
        docs,
        vec![
            json!({"_id": "Female", "n": 2, "max_age": 61}),
            json!({"_id": "Male", "n": 1, "max_age": 45}),
            json!({"_id": null, "n": 1, "max_age": 70}),
        ]
    );
}

#[test]
fn given_match_sort_limit_project_when_aggregating_then_applied_in_order() {
    let (_temp, store) = seeded_store();

    let docs = store
        .aggregate(
            "patients",
            &[
                json!({"$match": {"AGE": {"$gt": 40}}}),
                json!({"$sort": {"AGE": -1}}),
                json!({"$limit": 2}),
                json!({"$project": {"_id": 0, "PATIENT_ID": 1}}),
            ],
        )
        .unwrap();

    assert_eq!(docs, vec![json!({"PATIENT_ID": "P4"}), json!({"PATIENT_ID": "P1"})]);
}

#[rstest]
#[case::id_only(json!({"_id": 1}), json!({"_id": "p2"}))]
#[case::id_true(json!({"_id": true}), json!({"_id": "p2"}))]
#[case::id_excluded(json!({"_id": 0}), json!({"PATIENT_ID": "P2", "SEX": "Male", "AGE": 45, "TREATMENT": []}))]
#[case::field_keeps_id(json!({"SEX": 1}), json!({"_id": "p2", "SEX": "Male"}))]
fn given_id_projection_when_aggregating_then_mode_follows_rules(
    #[case] projection: Value,
    #[case] expected: Value,
) {
    let (_temp, store) = seeded_store();

    let docs = store
        .aggregate(
            "patients",
            &[json!({"$match": {"_id": "p2"}}), json!({"$project": projection})],
        )
        .unwrap();

    assert_eq!(docs, vec![expected]);
}

#[test]
fn given_unwind_and_count_when_aggregating_then_one_doc_per_element() {
    let (_temp, store) = seeded_store();

    let docs = store
        .aggregate(
            "patients",
            &[json!({"$unwind": "$TREATMENT"}), json!({"$count": "treatments"})],
        )
        .unwrap();

    assert_eq!(docs, vec![json!({"treatments": 2})]);
}

#[test]
fn given_unknown_stage_when_aggregating_then_unsupported_stage() {
    let (_temp, store) = seeded_store();
    let err = store
        .aggregate("patients", &[json!({"$lookup": {}})])
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Query(bioetl::domain::FilterError::UnsupportedStage(s)) if s == "$lookup"
    ));
}

// ============================================================
// ParsedQuery::execute()
// ============================================================

#[test]
fn given_parsed_find_when_executing_then_runs_against_collection() {
    let (_temp, store) = seeded_store();
    let query = parse_query(r#"db.patients.find({"SEX": "Male"})"#).unwrap();

    let docs = query.execute(&store).unwrap();

    assert_eq!(ids(&docs), vec!["p2"]);
}

#[test]
fn given_parsed_aggregate_when_executing_then_pipeline_runs() {
    let (_temp, store) = seeded_store();
    let query = parse_query(r#"db.patients.aggregate([{"$skip": 3}])"#).unwrap();

    let docs = query.execute(&store).unwrap();

    assert_eq!(ids(&docs), vec!["p4"]);
}
