//! Field access over JSON documents.
//!
//! Both the filter evaluator and the query-tree evaluator read document fields
//! through these helpers so that the two agree on what a field "contains".

use serde_json::Value;
use std::cmp::Ordering;

use crate::model::SortOrder;

/// Canonical string form of a scalar JSON value. Objects and nulls have none.
pub fn canonical(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Resolve a field by exact key first, then as a dotted path into nested objects.
pub fn lookup<'a>(doc: &'a Value, field: &str) -> Option<&'a Value> {
    let obj = doc.as_object()?;
    if let Some(v) = obj.get(field) {
        return Some(v);
    }
    if !field.contains('.') {
        return None;
    }
    let mut current = doc;
    for part in field.split('.') {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// All canonical scalar values of a field. Array fields are flattened one level.
pub fn field_values(doc: &Value, field: &str) -> Vec<String> {
    match lookup(doc, field) {
        None => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(canonical).collect(),
        Some(v) => canonical(v).into_iter().collect(),
    }
}

/// A field exists when it is present and not null (an empty array counts as absent).
pub fn field_exists(doc: &Value, field: &str) -> bool {
    match lookup(doc, field) {
        None | Some(Value::Null) => false,
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

/// Numeric comparison when both sides parse as finite numbers, lexicographic otherwise.
pub fn compare_values(left: &str, right: &str) -> Ordering {
    match (finite_number(left), finite_number(right)) {
        (Some(l), Some(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
        _ => left.cmp(right),
    }
}

/// `NaN` and infinities are treated as text.
fn finite_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Order two optional sort keys. Missing keys sort last in either direction.
pub fn compare_sort_keys(a: Option<&str>, b: Option<&str>, order: SortOrder) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match order {
            SortOrder::Ascending => compare_values(a, b),
            SortOrder::Descending => compare_values(b, a),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Every string value in the document, recursively, paired with its top-level field name.
pub fn string_values(doc: &Value) -> Vec<(&str, &str)> {
    fn walk<'a>(field: &'a str, value: &'a Value, out: &mut Vec<(&'a str, &'a str)>) {
        match value {
            Value::String(s) => out.push((field, s.as_str())),
            Value::Array(items) => items.iter().for_each(|v| walk(field, v, out)),
            Value::Object(map) => map.values().for_each(|v| walk(field, v, out)),
            _ => {}
        }
    }

    let mut out = Vec::new();
    if let Some(obj) = doc.as_object() {
        for (field, value) in obj {
            walk(field.as_str(), value, &mut out);
        }
    }
    out
}
