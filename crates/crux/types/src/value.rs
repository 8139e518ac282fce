//! Value types, typed literals and comparison operators
//!
//! The type system is closed: six declared value types, five runtime
//! value tags (`enum` values are strings), six operators. Type checks are
//! pattern matches on the tag.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Fixed layout every timestamp literal must parse under
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Parse a timestamp literal in [`TIMESTAMP_FORMAT`]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

// ── Value Type ───────────────────────────────────────────────────────

/// Declared type of an attribute in a pattern-schema
///
/// Unrecognised tokens deserialize to [`ValueType::Unknown`] so that the
/// schema verifier, rather than the parser, reports them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ValueType {
    Bool,
    Int,
    Float,
    Str,
    Enum,
    Ts,
    Unknown(String),
}

impl ValueType {
    pub fn as_str(&self) -> &str {
        match self {
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Str => "str",
            ValueType::Enum => "enum",
            ValueType::Ts => "ts",
            ValueType::Unknown(token) => token,
        }
    }

    /// Whether this is one of the six recognised types
    pub fn is_valid(&self) -> bool {
        !matches!(self, ValueType::Unknown(_))
    }
}

impl From<String> for ValueType {
    fn from(token: String) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "bool" => ValueType::Bool,
            "int" => ValueType::Int,
            "float" => ValueType::Float,
            "str" => ValueType::Str,
            "enum" => ValueType::Enum,
            "ts" => ValueType::Ts,
            _ => ValueType::Unknown(token),
        }
    }
}

impl From<ValueType> for String {
    fn from(value_type: ValueType) -> Self {
        value_type.as_str().to_string()
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Operator ─────────────────────────────────────────────────────────

/// Comparison operator of a rule pattern term
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Unknown(String),
}

impl Operator {
    pub fn as_str(&self) -> &str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Lt => "lt",
            Operator::Le => "le",
            Operator::Gt => "gt",
            Operator::Ge => "ge",
            Operator::Unknown(token) => token,
        }
    }

    /// Whether `ordering` (left compared to right) satisfies this operator
    pub fn holds(&self, ordering: Ordering) -> Option<bool> {
        let result = match self {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::Ne => ordering != Ordering::Equal,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Le => ordering != Ordering::Greater,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Ge => ordering != Ordering::Less,
            Operator::Unknown(_) => return None,
        };
        Some(result)
    }
}

impl From<String> for Operator {
    fn from(token: String) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "eq" => Operator::Eq,
            "ne" => Operator::Ne,
            "lt" => Operator::Lt,
            "le" => Operator::Le,
            "gt" => Operator::Gt,
            "ge" => Operator::Ge,
            _ => Operator::Unknown(token),
        }
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `op` is one of the six recognised operators
pub fn is_valid_operator(op: &Operator) -> bool {
    !matches!(op, Operator::Unknown(_))
}

// ── Value ────────────────────────────────────────────────────────────

/// A typed attribute or literal value
///
/// Serialized untagged. Strings always deserialize as [`Value::Str`]; a
/// timestamp arrives as a string and is recognised against the declared
/// type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Timestamp(#[serde(with = "timestamp_format")] DateTime<Utc>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Timestamp(_) => "ts",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Convert an entity value into the declared type
    ///
    /// Values already carrying the right tag pass through, ints widen to
    /// float, and string values are parsed since entities usually arrive as
    /// string maps. Returns
    /// `None` when the value cannot represent the type.
    pub fn convert_to(&self, value_type: &ValueType) -> Option<Value> {
        if validate_literal(self, value_type) {
            return Some(match (value_type, self) {
                (ValueType::Ts, Value::Str(s)) => Value::Timestamp(parse_timestamp(s)?),
                _ => self.clone(),
            });
        }
        if let (ValueType::Float, Value::Int(i)) = (value_type, self) {
            return Some(Value::Float(*i as f64));
        }
        let Value::Str(s) = self else {
            return None;
        };
        let s = s.trim();
        match value_type {
            ValueType::Bool => s.parse().ok().map(Value::Bool),
            ValueType::Int => s.parse().ok().map(Value::Int),
            ValueType::Float => s.parse().ok().map(Value::Float),
            _ => None,
        }
    }

    /// Compare two values of the same tag under `op`
    ///
    /// Bools only support equality. Strings compare lexically. Returns
    /// `None` for mismatched tags or an unsupported operator.
    pub fn compare(&self, op: &Operator, other: &Value) -> Option<bool> {
        let ordering = match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => {
                return match op {
                    Operator::Eq => Some(a == b),
                    Operator::Ne => Some(a != b),
                    _ => None,
                };
            }
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b)?,
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            _ => return None,
        };
        op.holds(ordering)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

/// Whether a literal's runtime tag agrees with the declared type
///
/// `enum` literals are plain strings; membership in the declared value
/// set is not checked here. A `ts` literal is valid if it is a timestamp
/// or a string that parses under [`TIMESTAMP_FORMAT`].
pub fn validate_literal(value: &Value, declared: &ValueType) -> bool {
    match (declared, value) {
        (ValueType::Bool, Value::Bool(_)) => true,
        (ValueType::Int, Value::Int(_)) => true,
        (ValueType::Float, Value::Float(_)) => true,
        (ValueType::Str | ValueType::Enum, Value::Str(_)) => true,
        (ValueType::Ts, Value::Timestamp(_)) => true,
        (ValueType::Ts, Value::Str(s)) => parse_timestamp(s).is_some(),
        _ => false,
    }
}

mod timestamp_format {
    use super::TIMESTAMP_FORMAT;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&ts.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_timestamp(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", s)))
    }
}
