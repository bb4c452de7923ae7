//! Runtime value types
//!
//! Formulas only ever produce numbers, strings, booleans, null and arrays.
//! [`Value::Record`] exists so that composite data from the host context tree
//! (offer properties, catalog variants, price tiers) can be threaded through
//! to `get`, `len` and `getPrice`; no operator constructs one.

use crate::path::PathSegment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A dynamically-typed runtime value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent / null. Missing context entries evaluate to this.
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value (all numbers are f64)
    Number(f64),
    /// String value
    String(String),
    /// Ordered list of values
    Array(Vec<Value>),
    /// Opaque composite data reached from the context
    Record(BTreeMap<String, Value>),
}

/// Parse a string the way numeric-looking strings are recognised by the
/// language: trimmed, non-empty, plain decimal notation with optional exponent.
pub fn parse_numeric(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    if !t
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return None;
    }
    t.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Format a number without a trailing `.0` for integral values.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let s = if n > 0.0 { "Infinity" } else { "-Infinity" };
        s.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl Value {
    /// Check if this is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the value's kind, used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Record(_) => "record",
        }
    }

    /// The value as a number if it is a number or a numeric-looking string.
    ///
    /// This is the only implicit coercion the language performs: it decides
    /// whether `+` adds or concatenates and whether comparisons are numeric.
    pub fn numeric(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::String(s) => parse_numeric(s),
            _ => None,
        }
    }

    /// Explicit numeric coercion used by arithmetic operators.
    ///
    /// Null (absent) coerces to NaN so that a missing input poisons the result
    /// instead of silently becoming zero.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Bool(true) => 1.0,
            Value::Bool(false) => 0.0,
            Value::String(s) if s.trim().is_empty() => 0.0,
            Value::String(s) => parse_numeric(s).unwrap_or(f64::NAN),
            Value::Null | Value::Array(_) | Value::Record(_) => f64::NAN,
        }
    }

    /// Boolean coercion used by `!`, `&&`, `||` and `if`
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Record(_) => true,
        }
    }

    /// Convert to string (used by concatenation and string functions)
    pub fn as_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(Value::as_string)
                .collect::<Vec<_>>()
                .join(","),
            Value::Record(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Record(map) => Some(map),
            _ => None,
        }
    }

    /// A finite number, or `None`. Non-finite results mean "no value".
    pub fn as_finite(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    /// Whether this value counts as "a value was produced"
    pub fn is_present(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Number(n) => n.is_finite(),
            _ => true,
        }
    }

    /// Look up a single key or index
    pub fn child(&self, segment: &PathSegment) -> Option<&Value> {
        match (self, segment) {
            (Value::Record(map), PathSegment::Key(key)) => map.get(key),
            (Value::Record(map), PathSegment::Index(idx)) => map.get(&idx.to_string()),
            (Value::Array(items), PathSegment::Index(idx)) => items.get(*idx),
            (Value::Array(items), PathSegment::Key(key)) => {
                key.parse::<usize>().ok().and_then(|idx| items.get(idx))
            }
            _ => None,
        }
    }

    /// Walk a parsed path. Returns `None` as soon as a segment is missing.
    pub fn get_path(&self, segments: &[PathSegment]) -> Option<&Value> {
        segments
            .iter()
            .try_fold(self, |current, segment| current.child(segment))
    }

    /// Build a record from key/value pairs
    pub fn record<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Record(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Record(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}
