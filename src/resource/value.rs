//! Generic `value` filter
//!
//! Compares the value at a dotted key path against a literal.
//!
//! ```yaml
//! filters:
//!   - type: value
//!     key: location
//!     op: in
//!     value: [westeurope, northeurope]
//! ```

use super::filter::{Filter, RecordFilter};
use super::record::ResourceRecord;
use super::registry::FilterType;
use super::schema::{ParamDef, ParamSchema, ParamType};
use crate::error::Result;
use serde_json::{Map, Value};
use std::cmp::Ordering;

const OPERATORS: &[&str] = &[
    "eq", "ne", "in", "not-in", "contains", "gt", "lt", "present", "absent",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    In,
    NotIn,
    Contains,
    Gt,
    Lt,
    Present,
    Absent,
}

impl Op {
    fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "eq" => Self::Eq,
            "ne" => Self::Ne,
            "in" => Self::In,
            "not-in" => Self::NotIn,
            "contains" => Self::Contains,
            "gt" => Self::Gt,
            "lt" => Self::Lt,
            "present" => Self::Present,
            "absent" => Self::Absent,
            _ => return None,
        })
    }

    fn needs_value(self) -> bool {
        !matches!(self, Self::Present | Self::Absent)
    }
}

#[derive(Debug)]
pub struct ValueFilter {
    key: String,
    op: Op,
    value: Value,
}

impl FilterType for ValueFilter {
    const SCHEMA: ParamSchema = ParamSchema::new(
        "value",
        &[
            ParamDef::required("key", ParamType::String),
            ParamDef::optional("op", ParamType::String).one_of(OPERATORS),
            ParamDef::optional("value", ParamType::Any),
        ],
    );

    fn check(params: &Map<String, Value>) -> Vec<String> {
        let op = operator(params);
        let value = params.get("value").unwrap_or(&Value::Null);

        let mut issues = Vec::new();
        if op.needs_value() && value.is_null() {
            issues.push("parameter 'value' is required by this op".to_string());
        }
        if matches!(op, Op::In | Op::NotIn) && !value.is_null() && !value.is_array() {
            issues.push("parameter 'value' must be an array for 'in' and 'not-in'".to_string());
        }
        issues
    }

    fn build(params: &Map<String, Value>) -> Result<Filter> {
        let key = params
            .get("key")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let op = operator(params);
        let value = params.get("value").cloned().unwrap_or(Value::Null);

        Ok(Filter::Record(Box::new(Self { key, op, value })))
    }
}

/// `eq` when absent; an unknown op is left to the schema to report
fn operator(params: &Map<String, Value>) -> Op {
    params
        .get("op")
        .and_then(|v| v.as_str())
        .and_then(Op::parse)
        .unwrap_or(Op::Eq)
}

impl RecordFilter for ValueFilter {
    fn evaluate(&self, record: &ResourceRecord) -> bool {
        let actual = record.lookup(&self.key).filter(|v| !v.is_null());

        match (self.op, actual) {
            (Op::Present, found) => found.is_some(),
            (Op::Absent, found) => found.is_none(),
            (Op::Ne, None) => true,
            (Op::NotIn, None) => true,
            (_, None) => false,
            (Op::Eq, Some(actual)) => loose_eq(actual, &self.value),
            (Op::Ne, Some(actual)) => !loose_eq(actual, &self.value),
            (Op::In, Some(actual)) => in_list(actual, &self.value),
            (Op::NotIn, Some(actual)) => !in_list(actual, &self.value),
            (Op::Contains, Some(actual)) => contains(actual, &self.value),
            (Op::Gt, Some(actual)) => compare(actual, &self.value) == Some(Ordering::Greater),
            (Op::Lt, Some(actual)) => compare(actual, &self.value) == Some(Ordering::Less),
        }
    }
}

/// Strings compare case-insensitively, everything else structurally
fn loose_eq(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::String(a), Value::String(b)) => a.eq_ignore_ascii_case(b),
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => actual == expected,
    }
}

fn in_list(actual: &Value, expected: &Value) -> bool {
    expected
        .as_array()
        .is_some_and(|list| list.iter().any(|item| loose_eq(actual, item)))
}

fn contains(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Array(items), _) => items.iter().any(|item| loose_eq(item, expected)),
        (Value::String(haystack), Value::String(needle)) => haystack
            .to_lowercase()
            .contains(&needle.to_lowercase()),
        (Value::Object(map), Value::String(key)) => map.contains_key(key),
        _ => false,
    }
}

fn compare(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
