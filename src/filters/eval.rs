//! Filter condition evaluation over event payloads.

use serde_json::Value;
use serde::{Deserialize, Serialize};

/// Comparison operator for a filter condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    Contains,
    In,
    Nin,
}

/// One field-path condition against an event payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    /// Dotted path into the payload, e.g. `data.amount`.
    pub field_path: String,
    pub operator: FilterOperator,
    /// Comparison value. For `in`/`nin` this is a JSON array, or a string
    /// holding a JSON-encoded array.
    pub value: Value,
}

impl Filter {
    pub fn new(field_path: impl Into<String>, operator: FilterOperator, value: Value) -> Self {
        Self {
            field_path: field_path.into(),
            operator,
            value,
        }
    }
}

/// Resolve a dotted path inside a JSON tree.
///
/// Path segments index into objects by key; a numeric segment also indexes
/// into arrays.
pub fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Evaluate one filter against a payload.
///
/// A missing field path satisfies `ne` and `nin` (absence is not equal to
/// anything and not a member of anything) and fails every other operator.
/// This is a deliberate policy, not a coercion accident.
pub fn evaluate(filter: &Filter, payload: &Value) -> bool {
    match lookup_path(payload, &filter.field_path) {
        Some(actual) => apply(filter.operator, actual, &filter.value),
        None => matches!(filter.operator, FilterOperator::Ne | FilterOperator::Nin),
    }
}

fn apply(operator: FilterOperator, actual: &Value, expected: &Value) -> bool {
    match operator {
        FilterOperator::Eq => values_equal(actual, expected),
        FilterOperator::Ne => !values_equal(actual, expected),
        FilterOperator::Gt => compare_numeric(actual, expected, |a, b| a > b),
        FilterOperator::Lt => compare_numeric(actual, expected, |a, b| a < b),
        FilterOperator::Gte => compare_numeric(actual, expected, |a, b| a >= b),
        FilterOperator::Lte => compare_numeric(actual, expected, |a, b| a <= b),
        FilterOperator::Contains => stringify(actual).contains(&stringify(expected)),
        FilterOperator::In => is_member(actual, expected),
        FilterOperator::Nin => match decode_array(expected) {
            Some(items) => !items.iter().any(|item| values_equal(actual, item)),
            // Unusable membership list fails closed.
            None => false,
        },
    }
}

/// Strict equality when types agree; string-coerced equality otherwise.
fn values_equal(a: &Value, b: &Value) -> bool {
    if std::mem::discriminant(a) == std::mem::discriminant(b) {
        a == b
    } else {
        stringify(a) == stringify(b)
    }
}

/// Numeric comparison. Non-numeric operands fail closed.
fn compare_numeric(actual: &Value, expected: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (to_number(actual), to_number(expected)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn is_member(actual: &Value, expected: &Value) -> bool {
    match decode_array(expected) {
        Some(items) => items.iter().any(|item| values_equal(actual, item)),
        None => false,
    }
}

/// The configured membership list: a JSON array, or a string holding a
/// JSON-encoded array.
fn decode_array(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
