//! Parameter schemas for filters and actions
//!
//! Every filter and action declares a static [`ParamSchema`]. Specs coming from
//! a policy are validated against it at construction time, before any network
//! activity, and all problems are reported together.

use crate::error::{GovernanceError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key naming the filter or action inside a policy element
pub const TYPE_FIELD: &str = "type";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Bool,
    Integer,
    Number,
    Array,
    Any,
}

impl ParamType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Bool => value.is_boolean(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Array => value.is_array(),
            Self::Any => true,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Bool => "a boolean",
            Self::Integer => "an integer",
            Self::Number => "a number",
            Self::Array => "an array",
            Self::Any => "any value",
        }
    }
}

/// One declared parameter
#[derive(Debug, Clone, Copy)]
pub struct ParamDef {
    pub name: &'static str,
    pub kind: ParamType,
    pub required: bool,
    /// Allowed string values; empty means unrestricted
    pub choices: &'static [&'static str],
}

impl ParamDef {
    pub const fn optional(name: &'static str, kind: ParamType) -> Self {
        Self {
            name,
            kind,
            required: false,
            choices: &[],
        }
    }

    pub const fn required(name: &'static str, kind: ParamType) -> Self {
        Self {
            name,
            kind,
            required: true,
            choices: &[],
        }
    }

    pub const fn one_of(mut self, choices: &'static [&'static str]) -> Self {
        self.choices = choices;
        self
    }
}

/// Schema of a filter or action; parameters outside `params` are rejected
#[derive(Debug, Clone, Copy)]
pub struct ParamSchema {
    pub type_name: &'static str,
    pub params: &'static [ParamDef],
}

impl ParamSchema {
    pub const fn new(type_name: &'static str, params: &'static [ParamDef]) -> Self {
        Self { type_name, params }
    }

    /// Check `params` and report every invalid, missing or unknown field
    pub fn validate(&self, params: &Map<String, Value>) -> Result<()> {
        self.reject(self.issues(params))
    }

    /// Every problem with `params`, in a stable order
    pub fn issues(&self, params: &Map<String, Value>) -> Vec<String> {
        let mut issues = Vec::new();

        for key in params.keys() {
            if !self.params.iter().any(|p| p.name == key) {
                issues.push(format!("unknown parameter '{}'", key));
            }
        }

        for def in self.params {
            match params.get(def.name) {
                None | Some(Value::Null) if def.required => {
                    issues.push(format!("missing required parameter '{}'", def.name));
                }
                None | Some(Value::Null) => {}
                Some(value) if !def.kind.accepts(value) => {
                    issues.push(format!(
                        "parameter '{}' must be {}",
                        def.name,
                        def.kind.label()
                    ));
                }
                Some(value) => {
                    if !def.choices.is_empty() {
                        let allowed = value.as_str().is_some_and(|s| def.choices.contains(&s));
                        if !allowed {
                            issues.push(format!(
                                "parameter '{}' must be one of: {}",
                                def.name,
                                def.choices.join(", ")
                            ));
                        }
                    }
                }
            }
        }
        issues
    }

    /// `Ok` when there is nothing to report, otherwise one error naming this type
    pub fn reject(&self, issues: Vec<String>) -> Result<()> {
        if issues.is_empty() {
            Ok(())
        } else {
            Err(GovernanceError::SchemaValidation {
                target: self.type_name.to_string(),
                issues,
            })
        }
    }
}

/// A filter or action as declared in a policy: a name plus parameters
///
/// Accepts either a bare name (`- delete`) or a mapping with a `type` key
/// (`- type: value` followed by parameters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct ElementSpec {
    pub name: String,
    pub params: Map<String, Value>,
}

pub type FilterSpec = ElementSpec;
pub type ActionSpec = ElementSpec;

impl ElementSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: Value) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }
}

impl TryFrom<Value> for ElementSpec {
    type Error = String;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        match value {
            Value::String(name) if !name.is_empty() => Ok(Self {
                name,
                params: Map::new(),
            }),
            Value::Object(mut params) => match params.remove(TYPE_FIELD) {
                Some(Value::String(name)) if !name.is_empty() => Ok(Self { name, params }),
                Some(_) => Err(format!("'{}' must be a non-empty string", TYPE_FIELD)),
                None => Err(format!("missing '{}' key", TYPE_FIELD)),
            },
            _ => Err("expected a name or a mapping with a 'type' key".to_string()),
        }
    }
}

impl From<ElementSpec> for Value {
    fn from(spec: ElementSpec) -> Self {
        if spec.params.is_empty() {
            return Value::String(spec.name);
        }
        let mut map = spec.params;
        map.insert(TYPE_FIELD.to_string(), Value::String(spec.name));
        Value::Object(map)
    }
}
