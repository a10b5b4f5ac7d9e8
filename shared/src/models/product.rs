//! Product Model
//!
//! Products come from an external catalog view whose columns vary between
//! deployments, so the record is an open map looked up by field name.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Product row from the catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductRecord(pub Map<String, Value>);

/// Render a scalar JSON value as template text.
///
/// Null, empty strings, arrays and objects count as absent.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl ProductRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    /// Look up a field by name.
    ///
    /// Tries the field itself, then `product_<field>`, then `<field>` inside
    /// a nested `product` object. The first key present wins, even when its
    /// value turns out to be empty.
    pub fn lookup(&self, field: &str) -> Option<String> {
        let raw = self
            .0
            .get(field)
            .or_else(|| self.0.get(&format!("product_{}", field)))
            .or_else(|| self.0.get("product").and_then(|p| p.get(field)));
        raw.and_then(value_text)
    }

    pub fn gtin(&self) -> Option<String> {
        self.lookup("gtin")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
