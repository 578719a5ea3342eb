//! Coarse classification of JSON values.
//!
//! Error messages and error `data` objects name JSON types rather than Rust
//! types, so every validation step reports through [`JsonType`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    Null,
    Bool,
    Number,
    String,
    Object,
    Array,
}

impl JsonType {
    /// Classify a value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => JsonType::Null,
            Value::Bool(_) => JsonType::Bool,
            Value::Number(_) => JsonType::Number,
            Value::String(_) => JsonType::String,
            Value::Object(_) => JsonType::Object,
            Value::Array(_) => JsonType::Array,
        }
    }

    /// Lowercase name as rendered in error messages and error data.
    pub fn name(self) -> &'static str {
        match self {
            JsonType::Null => "null",
            JsonType::Bool => "bool",
            JsonType::Number => "number",
            JsonType::String => "string",
            JsonType::Object => "object",
            JsonType::Array => "array",
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&Value> for JsonType {
    fn from(value: &Value) -> Self {
        JsonType::of(value)
    }
}
