//! Query files and the `db.<collection>.<operation>(<json>)` mini-language.
//!
//! A query file is a list of named sections:
//!
//! ```text
//! [patients_by_sex]
//! db.patients.aggregate([
//!   {"$group": {"_id": "$SEX", "n": {"$sum": 1}}}
//! ])
//! ```

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::domain::error::QueryParseError;

/// Raw query text under a `[name]` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedQuery {
    pub name: String,
    pub text: String,
}

/// Split query file content into named queries, in file order.
///
/// Lines are trimmed. Lines before the first header are ignored. A repeated
/// header starts its query over but keeps the first position.
pub fn load_queries(content: &str) -> Vec<NamedQuery> {
    let mut queries: Vec<NamedQuery> = Vec::new();
    let mut current: Option<usize> = None;

    for line in content.lines() {
        let line = line.trim();
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let idx = match queries.iter().position(|q| q.name == name) {
                Some(idx) => {
                    queries[idx].text.clear();
                    idx
                }
                None => {
                    queries.push(NamedQuery {
                        name: name.to_string(),
                        text: String::new(),
                    });
                    queries.len() - 1
                }
            };
            current = Some(idx);
        } else if let Some(idx) = current {
            queries[idx].text.push_str(line);
            queries[idx].text.push('\n');
        }
    }

    queries
}

/// What to run against a collection.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOperation {
    /// Filter-based fetch
    Find(Value),
    /// Aggregation pipeline, one JSON object per stage
    Aggregate(Vec<Value>),
}

impl QueryOperation {
    pub fn name(&self) -> &'static str {
        match self {
            QueryOperation::Find(_) => "find",
            QueryOperation::Aggregate(_) => "aggregate",
        }
    }
}

/// A query bound to a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    pub collection: String,
    pub operation: QueryOperation,
}

fn query_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Unanchored at the end: anything after the last ')' is ignored.
    RE.get_or_init(|| Regex::new(r"^db\.(\w+)\.(\w+)\((.*)\)").expect("valid query regex"))
}

/// Parse `db.<collection>.<find|aggregate>(<json>)`.
///
/// Newlines are removed first, so a query may span several lines.
pub fn parse_query(raw: &str) -> Result<ParsedQuery, QueryParseError> {
    let flat: String = raw.chars().filter(|c| *c != '\n' && *c != '\r').collect();
    let flat = flat.trim();

    let caps = query_regex()
        .captures(flat)
        .ok_or_else(|| QueryParseError::Grammar(flat.to_string()))?;
    let collection = caps[1].to_string();
    let op = &caps[2];
    let args = caps[3].trim();

    let operation = match op {
        "find" => {
            if args.is_empty() {
                QueryOperation::Find(Value::Object(Map::new()))
            } else {
                match parse_argument(op, args)? {
                    filter @ Value::Object(_) => QueryOperation::Find(filter),
                    _ => {
                        return Err(QueryParseError::WrongArgument {
                            operation: op.to_string(),
                            expected: "a JSON object",
                        })
                    }
                }
            }
        }
        "aggregate" => match parse_argument(op, args)? {
            Value::Array(stages) if stages.iter().all(Value::is_object) => {
                QueryOperation::Aggregate(stages)
            }
            _ => {
                return Err(QueryParseError::WrongArgument {
                    operation: op.to_string(),
                    expected: "a JSON array of stage objects",
                })
            }
        },
        other => return Err(QueryParseError::UnsupportedOperation(other.to_string())),
    };

    Ok(ParsedQuery {
        collection,
        operation,
    })
}

fn parse_argument(op: &str, args: &str) -> Result<Value, QueryParseError> {
    serde_json::from_str(args).map_err(|source| QueryParseError::InvalidJson {
        operation: op.to_string(),
        source,
    })
}
