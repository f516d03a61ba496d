//! Snapshot document assembled once per publish cycle

use std::collections::BTreeMap;

use super::Value;

/// One publish cycle's complete state as a flat field map.
///
/// Constructed fresh each sampling cycle and handed to the publisher by
/// value; the next cycle's snapshot supersedes it atomically in the publish
/// slot. The store applies merge semantics per field, so only the fields
/// present here are touched in the remote document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    fields: BTreeMap<String, Value>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value under the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Remove a field, returning its value if present.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Render the whole document as plain JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
        )
    }
}
