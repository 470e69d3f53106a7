//! In-memory evaluation of document filters and aggregation pipelines.
//!
//! Covers the subset of the Mongo query language that report queries use.
//! Stages run in order over plain vectors; nothing is indexed or planned.

use std::cmp::Ordering;

use regex::RegexBuilder;
use serde_json::{Map, Number, Value};

use crate::domain::error::FilterError;

pub type FilterResult<T> = Result<T, FilterError>;

static NULL: Value = Value::Null;

/// All values reachable by a dotted path. Arrays along the path fan out.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![doc];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => next.extend(map.get(segment)),
                Value::Array(items) => match segment.parse::<usize>() {
                    Ok(idx) => next.extend(items.get(idx)),
                    Err(_) => next.extend(
                        items
                            .iter()
                            .filter_map(|item| item.as_object())
                            .filter_map(|m| m.get(segment)),
                    ),
                },
                _ => {}
            }
        }
        current = next;
    }
    current
}

/// True if `doc` satisfies `filter`.
pub fn matches(doc: &Value, filter: &Value) -> FilterResult<bool> {
    let Value::Object(conditions) = filter else {
        return Err(FilterError::InvalidStage {
            stage: "$match".to_string(),
            message: "filter must be an object".to_string(),
        });
    };

    for (key, condition) in conditions {
        let ok = match key.as_str() {
            "$and" => sub_filters(key, condition)?
                .iter()
                .try_fold(true, |acc, f| Ok::<_, FilterError>(acc && matches(doc, f)?))?,
            "$or" => {
                let mut any = false;
                for f in sub_filters(key, condition)? {
                    if matches(doc, f)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            "$nor" => {
                let mut none = true;
                for f in sub_filters(key, condition)? {
                    if matches(doc, f)? {
                        none = false;
                        break;
                    }
                }
                none
            }
            op if op.starts_with('$') => {
                return Err(FilterError::UnsupportedOperator(op.to_string()))
            }
            path => field_matches(&lookup(doc, path), condition)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn sub_filters<'a>(op: &str, value: &'a Value) -> FilterResult<&'a Vec<Value>> {
    value.as_array().ok_or_else(|| FilterError::InvalidStage {
        stage: op.to_string(),
        message: "expects an array of filters".to_string(),
    })
}

fn is_operator_object(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty() && map.keys().all(|k| k.starts_with('$')),
        _ => false,
    }
}

fn field_matches(candidates: &[&Value], condition: &Value) -> FilterResult<bool> {
    let Value::Object(ops) = condition else {
        return Ok(equals_any(candidates, condition));
    };
    if !is_operator_object(condition) {
        return Ok(equals_any(candidates, condition));
    }

    for (op, arg) in ops {
        let ok = match op.as_str() {
            "$eq" => equals_any(candidates, arg),
            "$ne" => !equals_any(candidates, arg),
            "$gt" => compares_any(candidates, arg, |o| o == Ordering::Greater),
            "$gte" => compares_any(candidates, arg, |o| o != Ordering::Less),
            "$lt" => compares_any(candidates, arg, |o| o == Ordering::Less),
            "$lte" => compares_any(candidates, arg, |o| o != Ordering::Greater),
            "$in" => in_list(op, candidates, arg)?,
            "$nin" => !in_list(op, candidates, arg)?,
            "$exists" => truthy(arg) != candidates.is_empty(),
            "$regex" => {
                let options = ops.get("$options").and_then(Value::as_str).unwrap_or("");
                regex_matches(candidates, arg, options)?
            }
            "$options" => true,
            "$not" => !field_matches(candidates, arg)?,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Candidates plus the elements of array candidates.
fn expanded<'a>(candidates: &[&'a Value]) -> Vec<&'a Value> {
    let mut out = Vec::with_capacity(candidates.len());
    for &value in candidates {
        out.push(value);
        if let Value::Array(items) = value {
            out.extend(items.iter());
        }
    }
    out
}

fn equals_any(candidates: &[&Value], expected: &Value) -> bool {
    // A missing field equals null.
    if expected.is_null() && candidates.is_empty() {
        return true;
    }
    expanded(candidates)
        .into_iter()
        .any(|v| values_equal(v, expected))
}

fn compares_any(candidates: &[&Value], bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    expanded(candidates)
        .into_iter()
        .any(|v| compare_same_type(v, bound).is_some_and(&accept))
}

fn in_list(op: &str, candidates: &[&Value], arg: &Value) -> FilterResult<bool> {
    let options = arg.as_array().ok_or_else(|| FilterError::InvalidStage {
        stage: op.to_string(),
        message: "expects an array".to_string(),
    })?;
    Ok(options.iter().any(|o| equals_any(candidates, o)))
}

fn regex_matches(candidates: &[&Value], pattern: &Value, options: &str) -> FilterResult<bool> {
    let pattern = pattern.as_str().ok_or_else(|| FilterError::InvalidStage {
        stage: "$regex".to_string(),
        message: "pattern must be a string".to_string(),
    })?;
    let re = RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .build()
        .map_err(|source| FilterError::InvalidRegex {
            pattern: pattern.to_string(),
            source,
        })?;
    Ok(expanded(candidates)
        .into_iter()
        .filter_map(Value::as_str)
        .any(|s| re.is_match(s)))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => true,
    }
}

/// Equality with numeric values compared by magnitude (`1 == 1.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare_same_type(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Total order across types: null < numbers < strings < objects < arrays < booleans.
pub fn total_cmp(a: &Value, b: &Value) -> Ordering {
    type_rank(a).cmp(&type_rank(b)).then_with(|| match (a, b) {
        (Value::Object(x), Value::Object(y)) => x
            .iter()
            .zip(y.iter())
            .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| total_cmp(va, vb)))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(va, vb)| total_cmp(va, vb))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => compare_same_type(a, b).unwrap_or(Ordering::Equal),
    })
}

/// Run an aggregation pipeline over documents.
pub fn run_pipeline(docs: Vec<Value>, pipeline: &[Value]) -> FilterResult<Vec<Value>> {
    pipeline.iter().try_fold(docs, |docs, stage| apply_stage(docs, stage))
}

fn apply_stage(docs: Vec<Value>, stage: &Value) -> FilterResult<Vec<Value>> {
    let (name, spec) = match stage.as_object() {
        Some(map) if map.len() == 1 => map
            .iter()
            .next()
            .ok_or_else(|| invalid("pipeline", "empty stage"))?,
        _ => return Err(invalid("pipeline", "each stage must have exactly one key")),
    };

    match name.as_str() {
        "$match" => {
            let mut out = Vec::with_capacity(docs.len());
            for doc in docs {
                if matches(&doc, spec)? {
                    out.push(doc);
                }
            }
            Ok(out)
        }
        "$project" => project(docs, spec),
        "$sort" => sort(docs, spec),
        "$skip" => Ok(docs.into_iter().skip(count_arg(name, spec)?).collect()),
        "$limit" => Ok(docs.into_iter().take(count_arg(name, spec)?).collect()),
        "$count" => {
            let field = spec
                .as_str()
                .filter(|s| !s.is_empty() && !s.starts_with('$'))
                .ok_or_else(|| invalid(name, "expects a field name"))?;
            if docs.is_empty() {
                return Ok(docs);
            }
            let mut out = Map::new();
            out.insert(field.to_string(), Value::from(docs.len()));
            Ok(vec![Value::Object(out)])
        }
        "$unwind" => unwind(docs, spec),
        "$group" => group(docs, spec),
        other => Err(FilterError::UnsupportedStage(other.to_string())),
    }
}

fn invalid(stage: &str, message: &str) -> FilterError {
    FilterError::InvalidStage {
        stage: stage.to_string(),
        message: message.to_string(),
    }
}

fn count_arg(stage: &str, spec: &Value) -> FilterResult<usize> {
    spec.as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| invalid(stage, "expects a non-negative integer"))
}

/// Evaluate an expression: `"$path"` reads a field, objects evaluate member-wise,
/// anything else is a literal.
fn eval_expr(doc: &Value, expr: &Value) -> Value {
    match expr {
        Value::String(s) if s.starts_with('$') => lookup(doc, &s[1..])
            .first()
            .map(|v| (*v).clone())
            .unwrap_or(Value::Null),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), eval_expr(doc, v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn set_path(target: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            target.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(inner) = entry {
                set_path(inner, rest, value);
            }
        }
    }
}

fn remove_path(target: &mut Map<String, Value>, path: &str) {
    match path.split_once('.') {
        None => {
            target.shift_remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(inner)) = target.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

fn is_exclusion(value: &Value) -> bool {
    matches!(value, Value::Bool(false)) || value.as_f64() == Some(0.0)
}

fn is_inclusion(value: &Value) -> bool {
    matches!(value, Value::Bool(true)) || value.as_f64().is_some_and(|f| f != 0.0)
}

fn project(docs: Vec<Value>, spec: &Value) -> FilterResult<Vec<Value>> {
    let fields = spec
        .as_object()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| invalid("$project", "expects a non-empty object"))?;

    // `_id` decides the mode only when it is the sole field.
    let mut rules = fields
        .iter()
        .filter(|(k, _)| k.as_str() != "_id")
        .peekable();
    let exclusion_mode = match rules.peek() {
        Some(_) => rules.all(|(_, v)| is_exclusion(v)),
        None => fields.values().all(is_exclusion),
    };

    docs.into_iter()
        .map(|doc| {
            let Value::Object(source) = &doc else {
                return Ok(doc);
            };

            if exclusion_mode {
                let mut out = source.clone();
                for (path, _) in fields.iter().filter(|(_, v)| is_exclusion(v)) {
                    remove_path(&mut out, path);
                }
                return Ok(Value::Object(out));
            }

            let mut out = Map::new();
            let id_excluded = fields.get("_id").is_some_and(is_exclusion);
            if !id_excluded && !fields.contains_key("_id") {
                if let Some(id) = source.get("_id") {
                    out.insert("_id".to_string(), id.clone());
                }
            }
            for (path, rule) in fields {
                if is_exclusion(rule) {
                    if path != "_id" {
                        return Err(invalid(
                            "$project",
                            "cannot mix inclusion and exclusion",
                        ));
                    }
                    continue;
                }
                if is_inclusion(rule) {
                    if let Some(v) = lookup(&doc, path).first() {
                        set_path(&mut out, path, (*v).clone());
                    }
                } else {
                    set_path(&mut out, path, eval_expr(&doc, rule));
                }
            }
            Ok(Value::Object(out))
        })
        .collect()
}

fn sort(mut docs: Vec<Value>, spec: &Value) -> FilterResult<Vec<Value>> {
    let keys = spec
        .as_object()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| invalid("$sort", "expects a non-empty object"))?;

    let mut order = Vec::with_capacity(keys.len());
    for (path, dir) in keys {
        match dir.as_i64() {
            Some(1) => order.push((path.as_str(), false)),
            Some(-1) => order.push((path.as_str(), true)),
            _ => return Err(invalid("$sort", "direction must be 1 or -1")),
        }
    }

    docs.sort_by(|a, b| {
        order
            .iter()
            .map(|(path, descending)| {
                let va = lookup(a, path).first().copied().unwrap_or(&NULL);
                let vb = lookup(b, path).first().copied().unwrap_or(&NULL);
                let o = total_cmp(va, vb);
                if *descending {
                    o.reverse()
                } else {
                    o
                }
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    });
    Ok(docs)
}

fn unwind(docs: Vec<Value>, spec: &Value) -> FilterResult<Vec<Value>> {
    let (path, preserve) = match spec {
        Value::String(s) => (s.as_str(), false),
        Value::Object(map) => (
            map.get("path")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid("$unwind", "missing path"))?,
            map.get("preserveNullAndEmptyArrays")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        ),
        _ => return Err(invalid("$unwind", "expects a field path")),
    };
    let path = path
        .strip_prefix('$')
        .ok_or_else(|| invalid("$unwind", "field path must start with '$'"))?;

    let mut out = Vec::new();
    for doc in docs {
        let value = lookup(&doc, path).first().map(|v| (*v).clone());
        match value {
            Some(Value::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut copy = doc.clone();
                    if let Value::Object(map) = &mut copy {
                        set_path(map, path, item);
                    }
                    out.push(copy);
                }
            }
            Some(Value::Array(_)) | Some(Value::Null) | None => {
                if preserve {
                    out.push(doc);
                }
            }
            Some(_) => out.push(doc),
        }
    }
    Ok(out)
}

enum Accumulator {
    Sum { int: i64, float: f64, is_float: bool },
    Avg { total: f64, count: u64 },
    Min(Option<Value>),
    Max(Option<Value>),
    Push(Vec<Value>),
    AddToSet(Vec<Value>),
    First(Option<Value>),
    Last(Option<Value>),
}

impl Accumulator {
    fn new(op: &str) -> FilterResult<Self> {
        Ok(match op {
            "$sum" => Accumulator::Sum {
                int: 0,
                float: 0.0,
                is_float: false,
            },
            "$avg" => Accumulator::Avg {
                total: 0.0,
                count: 0,
            },
            "$min" => Accumulator::Min(None),
            "$max" => Accumulator::Max(None),
            "$push" => Accumulator::Push(Vec::new()),
            "$addToSet" => Accumulator::AddToSet(Vec::new()),
            "$first" => Accumulator::First(None),
            "$last" => Accumulator::Last(None),
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }

    fn add(&mut self, value: Value) {
        match self {
            Accumulator::Sum {
                int,
                float,
                is_float,
            } => {
                if let Value::Number(n) = &value {
                    match n.as_i64() {
                        Some(i) if !*is_float => match int.checked_add(i) {
                            Some(sum) => *int = sum,
                            None => {
                                *is_float = true;
                                *float = *int as f64 + i as f64;
                            }
                        },
                        _ => {
                            if !*is_float {
                                *is_float = true;
                                *float = *int as f64;
                            }
                            *float += n.as_f64().unwrap_or(0.0);
                        }
                    }
                }
            }
            Accumulator::Avg { total, count } => {
                if let Some(f) = value.as_f64() {
                    *total += f;
                    *count += 1;
                }
            }
            Accumulator::Min(current) => {
                if !value.is_null()
                    && current
                        .as_ref()
                        .map_or(true, |c| total_cmp(&value, c) == Ordering::Less)
                {
                    *current = Some(value);
                }
            }
            Accumulator::Max(current) => {
                if !value.is_null()
                    && current
                        .as_ref()
                        .map_or(true, |c| total_cmp(&value, c) == Ordering::Greater)
                {
                    *current = Some(value);
                }
            }
            Accumulator::Push(items) => items.push(value),
            Accumulator::AddToSet(items) => {
                if !items.iter().any(|i| values_equal(i, &value)) {
                    items.push(value);
                }
            }
            Accumulator::First(current) => {
                if current.is_none() {
                    *current = Some(value);
                }
            }
            Accumulator::Last(current) => *current = Some(value),
        }
    }

    fn finish(self) -> Value {
        match self {
            Accumulator::Sum {
                int,
                float,
                is_float,
            } => {
                if is_float {
                    float_value(float)
                } else {
                    Value::from(int)
                }
            }
            Accumulator::Avg { total, count } => {
                if count == 0 {
                    Value::Null
                } else {
                    float_value(total / count as f64)
                }
            }
            Accumulator::Min(v) | Accumulator::Max(v) | Accumulator::First(v) | Accumulator::Last(v) => {
                v.unwrap_or(Value::Null)
            }
            Accumulator::Push(items) | Accumulator::AddToSet(items) => Value::Array(items),
        }
    }
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn group(docs: Vec<Value>, spec: &Value) -> FilterResult<Vec<Value>> {
    let fields = spec
        .as_object()
        .ok_or_else(|| invalid("$group", "expects an object"))?;
    let key_expr = fields
        .get("_id")
        .ok_or_else(|| invalid("$group", "missing _id"))?;

    let mut accumulators: Vec<(&str, &str, &Value)> = Vec::new();
    for (name, acc) in fields.iter().filter(|(k, _)| k.as_str() != "_id") {
        let (op, expr) = acc
            .as_object()
            .filter(|m| m.len() == 1)
            .and_then(|m| m.iter().next())
            .ok_or_else(|| invalid("$group", "accumulator must be {\"$op\": expr}"))?;
        Accumulator::new(op)?;
        accumulators.push((name.as_str(), op.as_str(), expr));
    }

    // Groups in first-seen order
    let mut groups: Vec<(Value, Vec<Accumulator>)> = Vec::new();
    for doc in &docs {
        let key = eval_expr(doc, key_expr);
        let idx = match groups.iter().position(|(k, _)| values_equal(k, &key)) {
            Some(idx) => idx,
            None => {
                let accs = accumulators
                    .iter()
                    .map(|(_, op, _)| Accumulator::new(op))
                    .collect::<FilterResult<Vec<_>>>()?;
                groups.push((key, accs));
                groups.len() - 1
            }
        };
        for ((_, _, expr), acc) in accumulators.iter().zip(groups[idx].1.iter_mut()) {
            acc.add(eval_expr(doc, expr));
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, accs)| {
            let mut out = Map::new();
            out.insert("_id".to_string(), key);
            for ((name, _, _), acc) in accumulators.iter().zip(accs) {
                out.insert(name.to_string(), acc.finish());
            }
            Value::Object(out)
        })
        .collect())
}
