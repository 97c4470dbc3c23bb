//! Scalar values carried by attributes, fields and expressions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::{ModelError, ModelResult};

/// Declared type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Float,
    Boolean,
    Integer,
    Text,
}

impl ValueType {
    pub fn zero(self) -> Scalar {
        match self {
            ValueType::Float => Scalar::Float(0.0),
            ValueType::Boolean => Scalar::Boolean(false),
            ValueType::Integer => Scalar::Integer(0),
            ValueType::Text => Scalar::Text(String::new()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Float => "float",
            ValueType::Boolean => "bool",
            ValueType::Integer => "int",
            ValueType::Text => "str",
        }
    }
}

impl FromStr for ValueType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "float" | "double" | "number" => Ok(ValueType::Float),
            "bool" | "boolean" => Ok(ValueType::Boolean),
            "int" | "integer" => Ok(ValueType::Integer),
            "str" | "string" | "text" => Ok(ValueType::Text),
            other => Err(ModelError::TypeMismatch {
                value: other.to_string(),
                expected: "one of float, bool, int, str".to_string(),
            }),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn value_type(&self) -> ValueType {
        match self {
            Scalar::Float(_) => ValueType::Float,
            Scalar::Boolean(_) => ValueType::Boolean,
            Scalar::Integer(_) => ValueType::Integer,
            Scalar::Text(_) => ValueType::Text,
        }
    }

    /// Cast into `target`. Never falls back to a default on failure.
    pub fn coerce(&self, target: ValueType) -> ModelResult<Scalar> {
        let mismatch = || ModelError::TypeMismatch {
            value: format!("{self:?}"),
            expected: target.to_string(),
        };
        match (target, self) {
            (ValueType::Float, Scalar::Float(v)) => Ok(Scalar::Float(*v)),
            (ValueType::Float, Scalar::Integer(v)) => Ok(Scalar::Float(*v as f64)),
            (ValueType::Float, Scalar::Boolean(v)) => Ok(Scalar::Float(if *v { 1.0 } else { 0.0 })),
            (ValueType::Float, Scalar::Text(s)) => s
                .trim()
                .parse::<f64>()
                .map(Scalar::Float)
                .map_err(|_| mismatch()),

            (ValueType::Integer, Scalar::Integer(v)) => Ok(Scalar::Integer(*v)),
            (ValueType::Integer, Scalar::Float(v)) => {
                float_to_int(*v).map(Scalar::Integer).ok_or_else(mismatch)
            }
            (ValueType::Integer, Scalar::Boolean(v)) => Ok(Scalar::Integer(i64::from(*v))),
            (ValueType::Integer, Scalar::Text(s)) => {
                let s = s.trim();
                if let Ok(v) = s.parse::<i64>() {
                    return Ok(Scalar::Integer(v));
                }
                match s.parse::<f64>() {
                    Ok(v) if v.fract() == 0.0 => float_to_int(v).map(Scalar::Integer).ok_or_else(mismatch),
                    _ => Err(mismatch()),
                }
            }

            (ValueType::Boolean, Scalar::Boolean(v)) => Ok(Scalar::Boolean(*v)),
            (ValueType::Boolean, Scalar::Integer(v)) => Ok(Scalar::Boolean(*v != 0)),
            (ValueType::Boolean, Scalar::Float(v)) => Ok(Scalar::Boolean(*v != 0.0)),
            (ValueType::Boolean, Scalar::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Scalar::Boolean(true)),
                "false" | "no" | "off" | "0" => Ok(Scalar::Boolean(false)),
                _ => Err(mismatch()),
            },

            (ValueType::Text, Scalar::Text(s)) => Ok(Scalar::Text(s.clone())),
            (ValueType::Text, other) => Ok(Scalar::Text(other.to_string())),
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Scalar::Boolean(v) => *v,
            Scalar::Integer(v) => *v != 0,
            Scalar::Float(v) => *v != 0.0,
            Scalar::Text(s) => !s.is_empty(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Float(v) => Some(*v),
            Scalar::Integer(v) => Some(*v as f64),
            Scalar::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            Scalar::Text(_) => None,
        }
    }

    /// Convert a configuration value; only numbers, booleans and strings qualify.
    pub fn from_config(value: &Value) -> Option<Scalar> {
        match value {
            Value::Bool(b) => Some(Scalar::Boolean(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Scalar::Integer(i)),
                None => n.as_f64().map(Scalar::Float),
            },
            Value::String(s) => Some(Scalar::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => {
                write!(f, "{v:.1}")
            }
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Integer(v) => write!(f, "{v}"),
            Scalar::Boolean(v) => write!(f, "{v}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Integer(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Integer(i64::from(v))
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Boolean(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

/// Whether a configuration value counts as empty for the builder's skip rule.
/// Truncate toward zero; `None` for NaN, infinities and anything outside `i64`.
fn float_to_int(v: f64) -> Option<i64> {
    let t = v.trunc();
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    (t.is_finite() && t >= i64::MIN as f64 && t < i64::MAX as f64).then_some(t as i64)
}

pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Text form used when a scalar configuration element names a child.
pub fn config_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
