//! Cleaning of tab-delimited source tables into JSON records.

use std::path::Path;

use serde_json::{Map, Number, Value};

use crate::domain::error::DomainError;

/// Cell contents treated as missing.
pub const NA_VALUES: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "null", "NULL", "None", "#N/A",
];

/// Records produced from one table, keys in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedTable {
    pub columns: Vec<String>,
    pub records: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Integer,
    Float,
    Text,
}

/// Clean tab-delimited `content`.
///
/// - lines starting with `#` and blank lines are skipped
/// - the first remaining line is the header
/// - only `keep` columns present in the header are retained, in `keep` order
///   (all columns when `keep` is empty)
/// - cells are trimmed, NA-like cells become `null`
/// - each column becomes integers, floats or strings depending on its cells
pub fn clean_table(content: &str, keep: &[String], source: &Path) -> Result<CleanedTable, DomainError> {
    let mut lines = content
        .lines()
        .filter(|l| !l.starts_with('#') && !l.trim().is_empty());

    let header: Vec<String> = lines
        .next()
        .ok_or_else(|| DomainError::InvalidTable {
            path: source.to_path_buf(),
            message: "no header row".to_string(),
        })?
        .split('\t')
        .map(|c| c.trim().to_string())
        .collect();

    let selected: Vec<(usize, String)> = if keep.is_empty() {
        header.iter().cloned().enumerate().collect()
    } else {
        keep.iter()
            .filter_map(|col| header.iter().position(|h| h == col).map(|i| (i, col.clone())))
            .collect()
    };

    let rows: Vec<Vec<Option<String>>> = lines
        .map(|line| {
            let cells: Vec<&str> = line.split('\t').collect();
            selected
                .iter()
                .map(|(idx, _)| {
                    cells
                        .get(*idx)
                        .map(|c| c.trim())
                        .filter(|c| !NA_VALUES.contains(c))
                        .map(str::to_string)
                })
                .collect()
        })
        .collect();

    let types: Vec<ColumnType> = (0..selected.len())
        .map(|col| infer_type(rows.iter().filter_map(|r| r[col].as_deref())))
        .collect();

    let records = rows
        .into_iter()
        .map(|row| {
            let record: Map<String, Value> = selected
                .iter()
                .zip(types.iter())
                .zip(row)
                .map(|(((_, name), ty), cell)| (name.clone(), typed_value(cell, *ty)))
                .collect();
            Value::Object(record)
        })
        .collect();

    Ok(CleanedTable {
        columns: selected.into_iter().map(|(_, name)| name).collect(),
        records,
    })
}

fn infer_type<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnType {
    cells.fold(ColumnType::Integer, |ty, cell| match ty {
        ColumnType::Integer if cell.parse::<i64>().is_ok() => ColumnType::Integer,
        ColumnType::Integer | ColumnType::Float if cell.parse::<f64>().is_ok() => ColumnType::Float,
        _ => ColumnType::Text,
    })
}

fn typed_value(cell: Option<String>, ty: ColumnType) -> Value {
    let Some(cell) = cell else {
        return Value::Null;
    };
    match ty {
        ColumnType::Integer => cell.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
        ColumnType::Float => cell
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ColumnType::Text => Value::String(cell),
    }
}
