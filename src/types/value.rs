//! Value coercion layer
//!
//! The simulator exposes a zoo of raw field types: C byte-array strings,
//! fixed-point counters, booleans encoded as integers, and floats that go
//! NaN or infinite mid-transition (e.g. while the car is being teleported
//! to the garage). This module normalizes all of them into one typed scalar
//! representation that the snapshot and the store wire formats share.

use std::collections::BTreeMap;

/// Typed scalar value as stored in a [`Snapshot`](crate::Snapshot).
///
/// The variants mirror the document store's native typed-value encoding
/// (boolean/integer/double/string plus array and map containers).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Render as plain JSON (the Supabase wire format and the test fixtures
    /// both use this shape).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(scrub_f64(*f)),
            Value::Str(s) => serde_json::Value::from(s.as_str()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(entries) => serde_json::Value::Object(
                entries.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(scrub_f64(v))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(scrub_f64(v as f64))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

/// Replace NaN and infinite readings with zero.
///
/// The shared-memory buffers are double-buffered by the game and a read can
/// land mid-swap, yielding garbage floats. Zero is what the original data
/// layer reported for those samples.
pub fn scrub_f64(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

/// Decode a null-terminated C byte-array string from the simulator.
///
/// Stops at the first NUL, tolerates invalid UTF-8 by dropping the bad
/// bytes, and trims trailing whitespace.
pub fn decode_cstr(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).trim_end().to_string()
}
