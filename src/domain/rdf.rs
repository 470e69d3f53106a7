//! Flattening of store documents into an RDF graph, written as Turtle.
//!
//! Each document becomes a subject typed with its collection's class. Field
//! names become predicates in the vocabulary namespace; nested documents
//! become nested nodes; extended-JSON references (`$oid`, `$ref`/`$id`)
//! become links between documents.

use std::collections::HashSet;
use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use itertools::Itertools;
use serde_json::{Map, Value};

pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS_NS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const OWL_NS: &str = "http://www.w3.org/2002/07/owl#";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";

pub const DEFAULT_VOCAB_NS: &str = "http://example.org/melanoma_es#";
pub const DEFAULT_BASE_NS: &str = "http://example.org/melanoma_es/";

/// Node or literal in a triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Iri(String),
    Blank(usize),
    Literal { lexical: String, datatype: String },
}

impl Term {
    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Iri(iri.into())
    }

    pub fn typed(lexical: impl Into<String>, xsd_type: &str) -> Self {
        Term::Literal {
            lexical: lexical.into(),
            datatype: format!("{XSD_NS}{xsd_type}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    pub subject: Term,
    pub predicate: String,
    pub object: Term,
}

/// Set of triples kept in insertion order.
#[derive(Debug, Default)]
pub struct Graph {
    triples: Vec<Triple>,
    seen: HashSet<Triple>,
    prefixes: Vec<(String, String)>,
    next_blank: usize,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a prefix used when writing Turtle.
    pub fn bind(&mut self, prefix: &str, namespace: &str) {
        self.prefixes.retain(|(p, _)| p != prefix);
        self.prefixes.push((prefix.to_string(), namespace.to_string()));
    }

    /// Add a triple; duplicates are ignored. Returns true if it was new.
    pub fn add(&mut self, subject: Term, predicate: impl Into<String>, object: Term) -> bool {
        let triple = Triple {
            subject,
            predicate: predicate.into(),
            object,
        };
        if self.seen.contains(&triple) {
            return false;
        }
        self.seen.insert(triple.clone());
        self.triples.push(triple);
        true
    }

    pub fn fresh_blank(&mut self) -> Term {
        self.next_blank += 1;
        Term::Blank(self.next_blank)
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn triples(&self) -> &[Triple] {
        &self.triples
    }

    pub fn contains(&self, subject: &Term, predicate: &str, object: &Term) -> bool {
        self.triples
            .iter()
            .any(|t| &t.subject == subject && t.predicate == predicate && &t.object == object)
    }

    /// Serialize as Turtle, grouping consecutive triples by subject.
    pub fn to_turtle(&self) -> String {
        let mut out = String::new();
        for (prefix, ns) in &self.prefixes {
            let _ = writeln!(out, "@prefix {prefix}: <{ns}> .");
        }

        for (subject, group) in &self.triples.iter().chunk_by(|t| &t.subject) {
            let _ = write!(out, "\n{}", self.format_term(subject));
            let statements: Vec<String> = group
                .map(|t| {
                    format!(
                        "{} {}",
                        self.format_predicate(&t.predicate),
                        self.format_term(&t.object)
                    )
                })
                .collect();
            let _ = writeln!(out, " {} .", statements.join(" ;\n    "));
        }
        out
    }

    fn format_predicate(&self, iri: &str) -> String {
        if iri == format!("{RDF_NS}type") {
            "a".to_string()
        } else {
            self.format_iri(iri)
        }
    }

    fn format_iri(&self, iri: &str) -> String {
        for (prefix, ns) in &self.prefixes {
            if let Some(local) = iri.strip_prefix(ns.as_str()) {
                if is_prefixed_local(local) {
                    return format!("{prefix}:{local}");
                }
            }
        }
        let escaped: String = iri
            .chars()
            .flat_map(|c| match c {
                '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\' | ' ' => {
                    format!("\\u{:04X}", c as u32).chars().collect::<Vec<_>>()
                }
                c => vec![c],
            })
            .collect();
        format!("<{escaped}>")
    }

    fn format_term(&self, term: &Term) -> String {
        match term {
            Term::Iri(iri) => self.format_iri(iri),
            Term::Blank(n) => format!("_:b{n}"),
            Term::Literal { lexical, datatype } => {
                format!("\"{}\"^^{}", escape_literal(lexical), self.format_iri(datatype))
            }
        }
    }
}

fn is_prefixed_local(local: &str) -> bool {
    !local.is_empty()
        && !local.starts_with('-')
        && local.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

fn escape_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

/// Predicate-safe form of a field name: trimmed, spaces to `_`, only
/// alphanumerics, `_` and `-` kept; `field` if nothing remains.
pub fn safe_local_name(key: &str) -> String {
    let name: String = key
        .trim()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if name.is_empty() {
        "field".to_string()
    } else {
        name
    }
}

/// Collection hinted by a key ending in `id` (`PATIENT_ID` → `patient`).
pub fn reference_hint(key: &str) -> Option<String> {
    let split = key.len().checked_sub(2)?;
    let suffix = key.get(split..)?;
    if !suffix.eq_ignore_ascii_case("id") {
        return None;
    }
    let hint = key[..split].trim_matches('_').to_lowercase();
    (!hint.is_empty()).then_some(hint)
}

/// Text of a document id: strings as-is, `{"$oid": ..}` unwrapped,
/// anything else in compact JSON.
pub fn id_text(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("$oid").and_then(Value::as_str) {
            Some(oid) => oid.to_string(),
            None => id.to_string(),
        },
        other => other.to_string(),
    }
}

/// Maps documents into a [`Graph`].
#[derive(Debug, Clone)]
pub struct RdfMapper {
    vocab_ns: String,
    base_ns: String,
    known_classes: HashSet<String>,
}

impl Default for RdfMapper {
    fn default() -> Self {
        Self::new(DEFAULT_VOCAB_NS, DEFAULT_BASE_NS)
    }
}

impl RdfMapper {
    pub fn new(vocab_ns: &str, base_ns: &str) -> Self {
        Self {
            vocab_ns: vocab_ns.to_string(),
            base_ns: base_ns.to_string(),
            known_classes: HashSet::new(),
        }
    }

    /// Classes already declared by an ontology; no `rdfs:Class` typing is emitted for them.
    pub fn with_known_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_classes = classes.into_iter().map(Into::into).collect();
        self
    }

    /// Empty graph with the standard prefixes bound.
    pub fn new_graph(&self) -> Graph {
        let mut graph = Graph::new();
        graph.bind("mel", &self.vocab_ns);
        graph.bind("base", &self.base_ns);
        graph.bind("rdf", RDF_NS);
        graph.bind("rdfs", RDFS_NS);
        graph.bind("owl", OWL_NS);
        graph.bind("xsd", XSD_NS);
        graph
    }

    pub fn class_iri(&self, collection: &str) -> String {
        format!("{}{}", self.vocab_ns, collection)
    }

    pub fn predicate_iri(&self, key: &str) -> String {
        format!("{}{}", self.vocab_ns, safe_local_name(key))
    }

    pub fn document_iri(&self, collection: &str, id: &Value) -> String {
        format!("{}{}/{}", self.base_ns, collection, id_text(id))
    }

    /// Add one document of `collection`.
    pub fn add_document(&self, graph: &mut Graph, collection: &str, doc: &Map<String, Value>) {
        let subject = match doc.get("_id") {
            Some(id) if is_present(id) => Term::iri(self.document_iri(collection, id)),
            _ => graph.fresh_blank(),
        };

        let class = self.class_iri(collection);
        graph.add(subject.clone(), format!("{RDF_NS}type"), Term::iri(&class));
        if !self.known_classes.contains(collection) && !self.known_classes.contains(&class) {
            graph.add(
                Term::iri(&class),
                format!("{RDF_NS}type"),
                Term::iri(format!("{RDFS_NS}Class")),
            );
        }

        self.add_fields(graph, &subject, doc);
    }

    fn add_fields(&self, graph: &mut Graph, subject: &Term, doc: &Map<String, Value>) {
        for (key, value) in doc.iter().filter(|(k, _)| k.as_str() != "_id") {
            let predicate = self.predicate_iri(key);
            self.add_value(graph, subject, &predicate, value, reference_hint(key).as_deref());
        }
    }

    fn add_value(
        &self,
        graph: &mut Graph,
        subject: &Term,
        predicate: &str,
        value: &Value,
        hint: Option<&str>,
    ) {
        let object = match value {
            Value::Array(items) => {
                for item in items {
                    self.add_value(graph, subject, predicate, item, hint);
                }
                return;
            }
            Value::Object(map) => match extended_json(map) {
                Some(Extended::DbRef { collection, id }) => {
                    Term::iri(self.document_iri(collection, id))
                }
                Some(Extended::ObjectId(oid)) => match hint {
                    Some(collection) => {
                        Term::iri(format!("{}{}/{}", self.base_ns, collection, oid))
                    }
                    None => Term::iri(format!("{}ref/{}", self.base_ns, oid)),
                },
                Some(Extended::Date(date)) => Term::typed(date_lexical(date), "dateTime"),
                None => {
                    let node = match map.get("_id") {
                        Some(id) => {
                            Term::iri(self.document_iri(hint.unwrap_or("ref"), id))
                        }
                        None => graph.fresh_blank(),
                    };
                    graph.add(subject.clone(), predicate, node.clone());
                    self.add_fields(graph, &node, map);
                    return;
                }
            },
            Value::Null => Term::typed("", "string"),
            Value::Bool(b) => Term::typed(b.to_string(), "boolean"),
            Value::Number(n) if n.is_i64() || n.is_u64() => Term::typed(n.to_string(), "integer"),
            Value::Number(n) => Term::typed(n.to_string(), "decimal"),
            Value::String(s) => Term::typed(s.as_str(), "string"),
        };
        graph.add(subject.clone(), predicate, object);
    }
}

fn is_present(id: &Value) -> bool {
    match id {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

enum Extended<'a> {
    DbRef { collection: &'a str, id: &'a Value },
    ObjectId(&'a str),
    Date(&'a Value),
}

fn extended_json(map: &Map<String, Value>) -> Option<Extended<'_>> {
    if let (Some(collection), Some(id)) = (map.get("$ref").and_then(Value::as_str), map.get("$id")) {
        return Some(Extended::DbRef { collection, id });
    }
    if map.len() != 1 {
        return None;
    }
    if let Some(oid) = map.get("$oid").and_then(Value::as_str) {
        return Some(Extended::ObjectId(oid));
    }
    map.get("$date").map(Extended::Date)
}

/// Lexical `xsd:dateTime` for an extended-JSON `$date` payload.
fn date_lexical(date: &Value) -> String {
    let millis = match date {
        Value::String(s) => {
            return DateTime::parse_from_rfc3339(s)
                .map(|d| d.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::AutoSi, true))
                .unwrap_or_else(|_| s.clone())
        }
        Value::Number(n) => n.as_i64(),
        Value::Object(m) => m
            .get("$numberLong")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<i64>().ok()),
        _ => None,
    };
    millis
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|d| d.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        .unwrap_or_else(|| date.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn given_key_ending_in_id_when_hinting_then_returns_prefix_lowercased() {
        assert_eq!(reference_hint("PATIENT_ID"), Some("patient".to_string()));
        assert_eq!(reference_hint("sampleId"), Some("sample".to_string()));
        assert_eq!(reference_hint("_id"), None);
        assert_eq!(reference_hint("id"), None);
        assert_eq!(reference_hint("name"), None);
    }

    #[test]
    fn given_messy_key_when_making_predicate_then_only_safe_chars_remain() {
        assert_eq!(safe_local_name(" Age at diagnosis (y) "), "Age_at_diagnosis_y");
        assert_eq!(safe_local_name("%%"), "field");
    }

    #[test]
    fn given_duplicate_triples_when_adding_then_kept_once() {
        let mut g = Graph::new();
        assert!(g.add(Term::iri("s"), "p", Term::iri("o")));
        assert!(!g.add(Term::iri("s"), "p", Term::iri("o")));
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn given_millis_date_when_formatting_then_utc_datetime() {
        assert_eq!(date_lexical(&json!({"$numberLong": "0"})), "1970-01-01T00:00:00Z");
        assert_eq!(date_lexical(&json!("2020-01-02T03:04:05+01:00")), "2020-01-02T02:04:05Z");
    }
}
