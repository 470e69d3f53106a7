//! Tests for the document tree builder and key normalization

use rstest::rstest;
use serde_json::{json, Value};

use bioetl::domain::tree::DEFAULT_ELEMENT_LABEL;
use bioetl::domain::{build, normalize_key, NodeKind, TreeBuilder, TreeNode, ROOT_LABEL};

fn labels(node: &TreeNode) -> Vec<&str> {
    node.children.iter().map(|c| c.label.as_str()).collect()
}

// ============================================================
// normalize_key()
// ============================================================

#[rstest]
#[case("_id", "id")]
#[case("a.b.c", "a_b_c")]
#[case("$match", "DOLLAR_match")]
#[case("name", "name")]
#[case("Hugo Symbol", "Hugo_Symbol")]
#[case("ns:key", "ns_key")]
#[case("1st", "field")]
#[case("", "field")]
#[case("-x", "field")]
#[case(".hidden", "_hidden")]
#[case(".id", "id")]
#[case("año", "año")]
fn given_key_when_normalizing_then_expected_label(#[case] key: &str, #[case] expected: &str) {
    assert_eq!(normalize_key(key), expected);
}

#[rstest]
#[case("_id")]
#[case("a.b.$c")]
#[case("x y:z")]
#[case("9lives")]
#[case(" id")]
#[case("DOLLAR_x")]
fn given_any_key_when_normalizing_twice_then_fixed_point(#[case] key: &str) {
    let once = normalize_key(key);
    assert_eq!(normalize_key(&once), once);
}

// ============================================================
// build()
// ============================================================

#[rstest]
#[case(json!(null))]
#[case(json!(1))]
#[case(json!("x"))]
#[case(json!([]))]
#[case(json!({}))]
#[case(json!([{"a": [1, {"b": null}]}]))]
fn given_any_value_when_building_then_root_label_is_fixed(#[case] value: Value) {
    assert_eq!(build(&value).label, ROOT_LABEL);
}

#[test]
fn given_mapping_when_building_then_one_child_per_key_in_order() {
    // Arrange
    let value = json!({"z": 1, "a": 2, "m.n": 3});

    // Act
    let tree = build(&value);

    // Assert
    assert_eq!(tree.kind, Some(NodeKind::Object));
    assert_eq!(labels(&tree), vec!["z", "a", "m_n"]);
}

#[test]
fn given_sequence_when_building_then_element_children_in_order() {
    let tree = build(&json!(["b", "a", "c"]));

    assert_eq!(tree.kind, Some(NodeKind::List));
    assert_eq!(labels(&tree), vec![DEFAULT_ELEMENT_LABEL; 3]);
    let texts: Vec<&str> = tree.children.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["b", "a", "c"]);
}

#[rstest]
#[case(json!(true), "true")]
#[case(json!(false), "false")]
#[case(json!(42), "42")]
#[case(json!(-3.5), "-3.5")]
#[case(json!("  spaced  "), "  spaced  ")]
#[case(json!(null), "")]
fn given_scalar_when_building_then_leaf_with_canonical_text(
    #[case] value: Value,
    #[case] text: &str,
) {
    let tree = build(&value);

    assert!(tree.is_leaf());
    assert_eq!(tree.kind, None);
    assert_eq!(tree.text, text);
}

#[test]
fn given_patient_document_when_building_then_matches_expected_tree() {
    // Arrange
    let value = json!({"name": "Ana", "scores": [1, 2], "_id": "x1"});

    // Act
    let tree = build(&value);

    // Assert
    let mut scores = TreeNode::new("scores");
    scores.kind = Some(NodeKind::List);
    scores.children = vec![TreeNode::leaf("element", "1"), TreeNode::leaf("element", "2")];

    let mut expected = TreeNode::new("root");
    expected.kind = Some(NodeKind::Object);
    expected.children = vec![TreeNode::leaf("name", "Ana"), scores, TreeNode::leaf("id", "x1")];

    assert_eq!(tree, expected);
}

#[test]
fn given_empty_sequence_when_building_then_list_root_without_children() {
    let tree = build(&json!([]));

    assert_eq!(tree.kind, Some(NodeKind::List));
    assert!(tree.children.is_empty());
    assert!(tree.text.is_empty());
}

#[test]
fn given_keys_colliding_after_normalization_when_building_then_both_kept() {
    let tree = build(&json!({"a.b": 1, "a_b": 2}));
    assert_eq!(labels(&tree), vec!["a_b", "a_b"]);
}

#[test]
fn given_nested_value_when_building_then_only_containers_have_kind() {
    let tree = build(&json!({"a": [{"b": [null, 1, "x"]}, []], "c": {}}));

    let mut stack = vec![&tree];
    while let Some(node) = stack.pop() {
        if node.kind.is_none() {
            assert!(node.children.is_empty(), "{} has children but no kind", node.label);
        }
        stack.extend(node.children.iter());
    }
}

#[test]
fn given_very_deep_nesting_when_building_and_dropping_then_does_not_overflow() {
    // Arrange: 200_000 nested arrays
    let mut value = json!(0);
    for _ in 0..200_000 {
        value = Value::Array(vec![value]);
    }

    // Act
    let tree = build(&value);

    // Assert
    assert_eq!(tree.node_count(), 200_001);
    drop(tree);

    // serde_json drops recursively; take the input apart iteratively.
    let mut pending = vec![value];
    while let Some(v) = pending.pop() {
        if let Value::Array(items) = v {
            pending.extend(items);
        }
    }
}

#[test]
fn given_custom_element_label_when_building_then_sequence_children_use_it() {
    let builder = TreeBuilder::new().with_element_label("item");
    let tree = builder.build(&json!([1]));
    assert_eq!(labels(&tree), vec!["item"]);
}

#[test]
fn given_invalid_element_label_when_configuring_then_normalized() {
    let builder = TreeBuilder::new().with_element_label("my.item");
    assert_eq!(builder.element_label(), "my_item");
}

#[test]
fn given_existing_node_when_build_into_then_content_attached() {
    let mut node = TreeNode::new("result");
    TreeBuilder::new().build_into(&mut node, &json!({"k": "v"}));

    assert_eq!(node.label, "result");
    assert_eq!(node.kind, Some(NodeKind::Object));
    assert_eq!(node.child("k").map(|c| c.text.as_str()), Some("v"));
}
