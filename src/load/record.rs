//! Payload shape sniffing and row flattening.
//!
//! Everything here is pure: JSON in, records/columns/text out. The
//! database side lives in the parent module.

use std::collections::HashSet;
use std::fmt;

use serde_json::{Map, Value};

/// SQLite's default SQLITE_MAX_COLUMN.
pub const MAX_COLUMNS: usize = 2000;

/// Envelope field preferred when an object wraps the records.
const DATA_FIELD: &str = "data";

/// Why a payload produced no table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// null, "", [] or {}
    Empty,
    /// object with no array-valued field
    NoRecordField,
    /// first record is not an object
    NotRecords,
    /// number, boolean or non-empty string at the top level
    Scalar,
    /// first record has a key SQLite cannot hold as a column
    BadColumn(String),
    TooManyColumns(usize),
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Empty => write!(f, "no data"),
            Shape::NoRecordField => write!(f, "no array-valued field to take records from"),
            Shape::NotRecords => write!(f, "records are not JSON objects"),
            Shape::Scalar => write!(f, "unknown data structure"),
            Shape::BadColumn(reason) => write!(f, "unusable column set: {reason}"),
            Shape::TooManyColumns(n) => {
                write!(f, "{n} columns exceeds the limit of {MAX_COLUMNS}")
            }
        }
    }
}

/// Extracts the record sequence from a decoded payload.
///
/// Accepts a bare array, or an object wrapping the array under `data`
/// (or, failing that, under its first array-valued field). An `Ok` with an
/// empty vector means the envelope was valid but held no records.
pub fn normalize(value: Value) -> Result<Vec<Value>, Shape> {
    let records = match value {
        Value::Array(items) if items.is_empty() => return Err(Shape::Empty),
        Value::Array(items) => items,
        Value::Object(map) if map.is_empty() => return Err(Shape::Empty),
        Value::Object(map) => take_record_field(map)?,
        Value::Null => return Err(Shape::Empty),
        Value::String(s) if s.is_empty() => return Err(Shape::Empty),
        Value::String(_) | Value::Number(_) | Value::Bool(_) => return Err(Shape::Scalar),
    };

    match records.first() {
        Some(first) if !first.is_object() => Err(Shape::NotRecords),
        _ => Ok(records),
    }
}

fn take_record_field(mut map: Map<String, Value>) -> Result<Vec<Value>, Shape> {
    let key = if map.get(DATA_FIELD).is_some_and(Value::is_array) {
        DATA_FIELD.to_string()
    } else {
        map.iter()
            .find(|(_, v)| v.is_array())
            .map(|(k, _)| k.clone())
            .ok_or(Shape::NoRecordField)?
    };

    match map.remove(&key) {
        Some(Value::Array(items)) => Ok(items),
        _ => Err(Shape::NoRecordField),
    }
}

/// Column list taken from the first record, in payload order.
pub fn columns_of(first: &Map<String, Value>) -> Result<Vec<String>, Shape> {
    if first.is_empty() {
        return Err(Shape::BadColumn("first record has no fields".to_string()));
    }
    if first.len() > MAX_COLUMNS {
        return Err(Shape::TooManyColumns(first.len()));
    }

    // sqlite column names are case-insensitive for ASCII
    let mut seen = HashSet::new();
    for key in first.keys() {
        if key.is_empty() {
            return Err(Shape::BadColumn("empty key".to_string()));
        }
        // sqlite ends a quoted identifier at NUL
        if key.contains('\0') {
            return Err(Shape::BadColumn(format!("key {key:?} contains NUL")));
        }
        if !seen.insert(key.to_ascii_lowercase()) {
            return Err(Shape::BadColumn(format!("duplicate key '{key}'")));
        }
    }

    Ok(first.keys().cloned().collect())
}

/// Values of `record` for `columns`; a missing key becomes "".
pub fn row_values(record: &Map<String, Value>, columns: &[String]) -> Vec<String> {
    columns
        .iter()
        .map(|column| record.get(column).map(cell_text).unwrap_or_default())
        .collect()
}

/// Text stored for one JSON value.
///
/// Strings go in verbatim, null as "", everything else as compact JSON.
/// Numbers keep their source digits.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Table name for an endpoint: every run of non-word characters becomes `_`.
pub fn sanitize_table_name(endpoint: &str) -> String {
    let mut name = String::with_capacity(endpoint.len());
    let mut in_run = false;

    for ch in endpoint.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            name.push(ch);
            in_run = false;
        } else if !in_run {
            name.push('_');
            in_run = true;
        }
    }

    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_array_of_objects() {
        let records = normalize(json!([{"a": 1}, {"a": 2}])).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn data_envelope() {
        let records = normalize(json!({"status": "ok", "data": [{"a": 1}]})).unwrap();
        assert_eq!(records, vec![json!({"a": 1})]);
    }

    #[test]
    fn data_field_wins_over_earlier_arrays() {
        let records = normalize(json!({"errors": [], "data": [{"a": 1}]})).unwrap();
        assert_eq!(records, vec![json!({"a": 1})]);
    }

    #[test]
    fn falls_back_to_first_array_field() {
        let records = normalize(json!({"data": "n/a", "rows": [{"a": 1}]})).unwrap();
        assert_eq!(records, vec![json!({"a": 1})]);
    }

    #[test]
    fn envelope_without_array_field() {
        assert_eq!(
            normalize(json!({"status": "error", "message": "sheet not found"})),
            Err(Shape::NoRecordField)
        );
    }

    #[test]
    fn envelope_with_empty_data_is_empty_record_set() {
        assert_eq!(normalize(json!({"data": []})), Ok(vec![]));
    }

    #[test]
    fn empty_payloads() {
        for value in [json!(null), json!([]), json!({}), json!("")] {
            assert_eq!(normalize(value), Err(Shape::Empty));
        }
    }

    #[test]
    fn scalars_rejected() {
        for value in [json!(3), json!(true), json!("hello")] {
            assert_eq!(normalize(value), Err(Shape::Scalar));
        }
    }

    #[test]
    fn array_of_scalars_rejected() {
        assert_eq!(normalize(json!([1, 2, 3])), Err(Shape::NotRecords));
        assert_eq!(normalize(json!({"data": [[1], [2]]})), Err(Shape::NotRecords));
    }

    #[test]
    fn columns_keep_payload_order() {
        let first = json!({"zeta": 1, "alpha": 2, "mid": 3});
        let columns = columns_of(first.as_object().unwrap()).unwrap();
        assert_eq!(columns, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn columns_reject_case_duplicates_and_empty_keys() {
        let dup = json!({"Id": 1, "id": 2});
        assert!(matches!(columns_of(dup.as_object().unwrap()), Err(Shape::BadColumn(_))));

        let empty = json!({"": 1});
        assert!(matches!(columns_of(empty.as_object().unwrap()), Err(Shape::BadColumn(_))));

        let no_fields = json!({});
        assert!(matches!(columns_of(no_fields.as_object().unwrap()), Err(Shape::BadColumn(_))));
    }

    #[test]
    fn columns_reject_nul_in_key() {
        let record: Value = serde_json::from_str(r#"{"id": 1, "a\u0000b": 2}"#).unwrap();
        assert!(matches!(columns_of(record.as_object().unwrap()), Err(Shape::BadColumn(_))));
    }

    #[test]
    fn too_many_columns() {
        let mut map = Map::new();
        for i in 0..=MAX_COLUMNS {
            map.insert(format!("c{i}"), json!(i));
        }
        assert_eq!(columns_of(&map), Err(Shape::TooManyColumns(MAX_COLUMNS + 1)));
    }

    #[test]
    fn row_values_default_missing_to_empty() {
        let columns = vec!["id".to_string(), "total".to_string(), "note".to_string()];
        let record = json!({"total": 9.5, "id": "7", "extra": "ignored"});
        assert_eq!(
            row_values(record.as_object().unwrap(), &columns),
            vec!["7", "9.5", ""]
        );
    }

    #[test]
    fn cell_text_formats() {
        assert_eq!(cell_text(&json!("plain")), "plain");
        assert_eq!(cell_text(&json!(42)), "42");
        assert_eq!(cell_text(&json!(false)), "false");
        assert_eq!(cell_text(&json!(null)), "");
        assert_eq!(cell_text(&json!({"b": 1, "a": [1, "x"]})), r#"{"b":1,"a":[1,"x"]}"#);
    }

    #[test]
    fn numbers_keep_source_text() {
        let record: Value =
            serde_json::from_str(r#"{"id": 123456789012345678901234567890, "f": 1e400}"#)
                .unwrap();
        let columns = columns_of(record.as_object().unwrap()).unwrap();
        assert_eq!(
            row_values(record.as_object().unwrap(), &columns),
            vec!["123456789012345678901234567890", "1e400"]
        );
    }

    #[test]
    fn sanitize_collapses_runs() {
        assert_eq!(sanitize_table_name("user stats!"), "user_stats_");
        assert_eq!(sanitize_table_name("orders"), "orders");
        assert_eq!(sanitize_table_name("Q3 -- sales (EU)"), "Q3_sales_EU_");
        assert_eq!(sanitize_table_name("a_!b"), "a__b");
        assert_eq!(sanitize_table_name("café-menü"), "café_menü");
    }
}
