//! Free-form context maps.
//!
//! Events, messages, patterns and interaction requests all carry an open
//! map of situational attributes. Structured types convert to and from this
//! map only at the external edge.

use serde_json::{Map, Value};

pub type ContextMap = Map<String, Value>;

/// Typed accessors over a [`ContextMap`].
pub trait ContextExt {
    fn f32_field(&self, key: &str) -> Option<f32>;
    fn str_field(&self, key: &str) -> Option<&str>;
    fn map_field(&self, key: &str) -> Option<&ContextMap>;
    fn bool_field(&self, key: &str) -> Option<bool>;
}

impl ContextExt for ContextMap {
    fn f32_field(&self, key: &str) -> Option<f32> {
        self.get(key).and_then(Value::as_f64).map(|v| v as f32)
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn map_field(&self, key: &str) -> Option<&ContextMap> {
        self.get(key).and_then(Value::as_object)
    }

    fn bool_field(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }
}

/// Unwrap a JSON object into a context map; anything else becomes empty.
pub fn to_context(value: Value) -> ContextMap {
    match value {
        Value::Object(map) => map,
        _ => ContextMap::new(),
    }
}
