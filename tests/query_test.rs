//! Tests for query files and the query mini-language

use rstest::rstest;
use serde_json::json;

use bioetl::domain::{load_queries, parse_query, QueryOperation, QueryParseError};

#[test]
fn given_query_file_when_loading_then_sections_in_order() {
    // Arrange
    let content = "\
ignored preamble
[females]
db.patients.find(
  {\"SEX\": \"Female\"}
)

[by_stage]
db.samples.aggregate([{\"$group\": {\"_id\": \"$STAGE\"}}])
";

    // Act
    let queries = load_queries(content);

    // Assert
    let names: Vec<&str> = queries.iter().map(|q| q.name.as_str()).collect();
    assert_eq!(names, vec!["females", "by_stage"]);
    assert_eq!(queries[0].text, "db.patients.find(\n{\"SEX\": \"Female\"}\n)\n\n");
}

#[test]
fn given_repeated_header_when_loading_then_text_reset_position_kept() {
    let queries = load_queries("[a]\nold\n[b]\nb\n[a]\nnew\n");

    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0].name, "a");
    assert_eq!(queries[0].text, "new\n");
    assert_eq!(queries[1].name, "b");
}

#[test]
fn given_multiline_find_when_parsing_then_filter_extracted() {
    let parsed = parse_query("db.patients.find(\n{\"SEX\": \"Female\"}\n)\n").unwrap();

    assert_eq!(parsed.collection, "patients");
    assert_eq!(parsed.operation, QueryOperation::Find(json!({"SEX": "Female"})));
}

#[rstest]
#[case("db.patients.find()")]
#[case("db.patients.find(   )")]
fn given_empty_find_argument_when_parsing_then_empty_filter(#[case] raw: &str) {
    let parsed = parse_query(raw).unwrap();
    assert_eq!(parsed.operation, QueryOperation::Find(json!({})));
}

#[test]
fn given_aggregate_when_parsing_then_stages_extracted() {
    let parsed =
        parse_query(r#"db.variants.aggregate([{"$match": {"Hugo_Symbol": "BRAF"}}, {"$count": "n"}])"#)
            .unwrap();

    assert_eq!(parsed.collection, "variants");
    match parsed.operation {
        QueryOperation::Aggregate(stages) => assert_eq!(stages.len(), 2),
        other => panic!("expected aggregate, got {other:?}"),
    }
}

#[test]
fn given_trailing_text_after_call_when_parsing_then_ignored() {
    let parsed = parse_query("db.patients.find({}) ;").unwrap();
    assert_eq!(parsed.operation, QueryOperation::Find(json!({})));
}

#[rstest]
#[case("patients.find({})")]
#[case("db.patients")]
#[case("select * from patients")]
#[case("")]
fn given_text_outside_grammar_when_parsing_then_grammar_error(#[case] raw: &str) {
    let err = parse_query(raw).unwrap_err();
    assert!(matches!(err, QueryParseError::Grammar(_)), "{err:?}");
}

#[test]
fn given_unknown_operation_when_parsing_then_unsupported() {
    let err = parse_query("db.patients.deleteMany({})").unwrap_err();
    assert!(matches!(err, QueryParseError::UnsupportedOperation(op) if op == "deleteMany"));
}

#[test]
fn given_invalid_json_when_parsing_then_invalid_json_error() {
    let err = parse_query("db.patients.find({SEX: 'Female'})").unwrap_err();
    assert!(matches!(err, QueryParseError::InvalidJson { .. }));
}

#[rstest]
#[case("db.patients.find([1])")]
#[case("db.patients.aggregate({})")]
#[case("db.patients.aggregate([1])")]
fn given_wrong_argument_shape_when_parsing_then_wrong_argument(#[case] raw: &str) {
    let err = parse_query(raw).unwrap_err();
    assert!(matches!(err, QueryParseError::WrongArgument { .. }), "{err:?}");
}
