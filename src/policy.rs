//! Policy files
//!
//! A policy names a resource kind plus the filters and actions to run on it.
//! Files are YAML (JSON is accepted as well, being a YAML subset).
//!
//! ```yaml
//! policies:
//!   - name: delete-empty-groups
//!     resource: azure.resourcegroup
//!     filters:
//!       - type: empty-group
//!     actions:
//!       - delete
//! ```

use crate::resource::schema::{ActionSpec, FilterSpec};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Policy {
    pub name: String,
    /// Resource kind, with or without the `azure.` prefix
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyFile {
    #[serde(default)]
    pub policies: Vec<Policy>,
}

impl PolicyFile {
    pub fn parse(content: &str) -> Result<Self> {
        let file: PolicyFile =
            serde_yaml::from_str(content).context("Failed to parse policy file")?;

        let mut seen = std::collections::HashSet::new();
        for policy in &file.policies {
            if !seen.insert(policy.name.as_str()) {
                anyhow::bail!("Duplicate policy name: {}", policy.name);
            }
        }

        Ok(file)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read policy file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid policy file {}", path.display()))
    }

    /// Select policies by name; an empty selection keeps all of them
    pub fn select(self, names: &[String]) -> Result<Vec<Policy>> {
        if names.is_empty() {
            return Ok(self.policies);
        }

        for name in names {
            if !self.policies.iter().any(|p| &p.name == name) {
                anyhow::bail!("No policy named '{}' in file", name);
            }
        }

        Ok(self
            .policies
            .into_iter()
            .filter(|p| names.contains(&p.name))
            .collect())
    }
}
