//! Document tree: JSON values converted into labeled element trees.
//!
//! The tree is the in-memory form of the XML written for every report.
//! Mapping keys become child labels (see [`normalize_key`]), sequence
//! elements become children with a fixed element label, scalars become
//! leaf text.

use std::fmt;

use serde_json::Value;

use crate::domain::key::normalize_key;

/// Label of every tree root, regardless of input shape.
pub const ROOT_LABEL: &str = "root";

/// Default label for sequence elements.
pub const DEFAULT_ELEMENT_LABEL: &str = "element";

/// Which container a node was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Object,
    List,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Object => "object",
            NodeKind::List => "list",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "object" => Some(NodeKind::Object),
            "list" => Some(NodeKind::List),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A labeled node with ordered children.
///
/// `kind` is set only on nodes built from mappings or sequences; `text` is
/// meaningful only on leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub label: String,
    pub kind: Option<NodeKind>,
    pub children: Vec<TreeNode>,
    pub text: String,
}

impl TreeNode {
    /// Empty node with the given label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: None,
            children: Vec::new(),
            text: String::new(),
        }
    }

    /// Leaf node with text.
    pub fn leaf(label: impl Into<String>, text: impl Into<String>) -> Self {
        let mut node = Self::new(label);
        node.text = text.into();
        node
    }

    pub fn is_leaf(&self) -> bool {
        self.kind.is_none() && self.children.is_empty()
    }

    /// First direct child with the given label.
    pub fn child(&self, label: &str) -> Option<&TreeNode> {
        self.children.iter().find(|c| c.label == label)
    }

    /// Total number of nodes, this one included.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    /// Render as an indented tree for terminal display.
    pub fn to_termtree(&self) -> termtree::Tree<String> {
        let head = match (&self.kind, self.is_leaf()) {
            (Some(kind), _) => format!("{} [{}]", self.label, kind),
            (None, true) if self.text.is_empty() => self.label.clone(),
            (None, _) => format!("{} = {:?}", self.label, self.text),
        };
        termtree::Tree::new(head).with_leaves(self.children.iter().map(TreeNode::to_termtree))
    }
}

impl Drop for TreeNode {
    // Children are detached onto a heap stack so deep trees do not recurse.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Canonical text of a scalar: `true`/`false`, decimal numbers, strings verbatim,
/// empty for null. Containers have no scalar text.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Converts JSON values into [`TreeNode`]s.
///
/// Iterative: nesting depth is limited by memory, not by the call stack.
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    element_label: String,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self {
            element_label: DEFAULT_ELEMENT_LABEL.to_string(),
        }
    }

    /// Use a different label for sequence elements.
    ///
    /// Invalid labels are normalized the same way mapping keys are.
    pub fn with_element_label(mut self, label: &str) -> Self {
        self.element_label = normalize_key(label);
        self
    }

    pub fn element_label(&self) -> &str {
        &self.element_label
    }

    /// Build a tree rooted at [`ROOT_LABEL`].
    pub fn build(&self, value: &Value) -> TreeNode {
        let mut root = TreeNode::new(ROOT_LABEL);
        self.build_into(&mut root, value);
        root
    }

    /// Attach the content of `value` to an existing node.
    ///
    /// Mappings set `kind = object` and append one child per key, sequences set
    /// `kind = list` and append one child per element, scalars set the text.
    pub fn build_into(&self, node: &mut TreeNode, value: &Value) {
        let mut built = self.assemble(node.label.clone(), value);
        match built.kind {
            Some(kind) => node.kind = Some(kind),
            None => node.text = std::mem::take(&mut built.text),
        }
        node.children.append(&mut built.children);
    }

    fn assemble(&self, label: String, value: &Value) -> TreeNode {
        let mut current = Frame::open(label, value);
        let mut parents: Vec<Frame> = Vec::new();

        loop {
            if let Some((label, child)) = current.next_child(&self.element_label) {
                parents.push(std::mem::replace(&mut current, Frame::open(label, child)));
                continue;
            }
            match parents.pop() {
                Some(parent) => {
                    let done = std::mem::replace(&mut current, parent);
                    current.node.children.push(done.node);
                }
                None => return current.node,
            }
        }
    }
}

/// Build a tree with the default element label.
pub fn build(value: &Value) -> TreeNode {
    TreeBuilder::new().build(value)
}

/// One node under construction plus the input children not yet visited.
struct Frame<'a> {
    node: TreeNode,
    pending: Pending<'a>,
}

enum Pending<'a> {
    Object(serde_json::map::Iter<'a>),
    List(std::slice::Iter<'a, Value>),
    Done,
}

impl<'a> Frame<'a> {
    fn open(label: String, value: &'a Value) -> Self {
        let mut node = TreeNode::new(label);
        let pending = match value {
            Value::Object(map) => {
                node.kind = Some(NodeKind::Object);
                Pending::Object(map.iter())
            }
            Value::Array(items) => {
                node.kind = Some(NodeKind::List);
                Pending::List(items.iter())
            }
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                node.text = scalar_text(value).unwrap_or_default();
                Pending::Done
            }
        };
        Self { node, pending }
    }

    fn next_child(&mut self, element_label: &str) -> Option<(String, &'a Value)> {
        match &mut self.pending {
            Pending::Object(iter) => iter.next().map(|(k, v)| (normalize_key(k), v)),
            Pending::List(iter) => iter.next().map(|v| (element_label.to_string(), v)),
            Pending::Done => None,
        }
    }
}
