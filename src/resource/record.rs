//! Resource records
//!
//! A record is the serialized state of one remote object. It only exists once
//! the adapter's response has been fully received and checked.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key stamped by augmentation with the kind's declared type
pub const TYPE_KEY: &str = "type";

/// One remote object, as a string-keyed JSON object with an `id` or `name`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct ResourceRecord {
    fields: Map<String, Value>,
}

impl ResourceRecord {
    /// Build a record from a raw adapter object
    pub fn from_raw(raw: Value) -> Result<Self, String> {
        match raw {
            Value::Object(fields) => Self::try_from(fields),
            other => Err(format!("expected a JSON object, got {}", kind_of(&other))),
        }
    }

    pub fn id(&self) -> Option<&str> {
        non_empty_str(self.fields.get("id"))
    }

    pub fn name(&self) -> Option<&str> {
        non_empty_str(self.fields.get("name"))
    }

    /// Unique key of the record: its `id`, falling back to `name`
    pub fn key(&self) -> &str {
        self.id().or_else(|| self.name()).unwrap_or_default()
    }

    pub fn resource_type(&self) -> Option<&str> {
        self.fields.get(TYPE_KEY).and_then(|v| v.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Look up a value by dot-notation path (`properties.provisioningState`, `tags.env`)
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;

        for part in parts {
            current = match part.parse::<usize>() {
                Ok(idx) if current.is_array() => current.get(idx)?,
                _ => current.get(part)?,
            };
        }

        Some(current)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl TryFrom<Map<String, Value>> for ResourceRecord {
    type Error = String;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let record = Self { fields };
        if record.id().is_none() && record.name().is_none() {
            return Err("object has neither an 'id' nor a 'name'".to_string());
        }
        Ok(record)
    }
}

impl From<ResourceRecord> for Map<String, Value> {
    fn from(record: ResourceRecord) -> Self {
        record.fields
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
