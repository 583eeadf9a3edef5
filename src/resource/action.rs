//! Actions
//!
//! An action runs against the records that survived filtering. Mutating
//! actions handle each record independently and report a status per record.

use super::manager::ResourceManager;
use super::record::ResourceRecord;
use crate::error::GovernanceError;
use async_trait::async_trait;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &str;

    /// Never fails as a whole; per-record errors are in the result
    async fn process(&self, manager: &ResourceManager, records: &[ResourceRecord])
        -> ActionResult;
}

#[derive(Debug)]
pub enum RecordStatus {
    Succeeded,
    /// Nothing to do, e.g. deleting something that is already gone
    AlreadySatisfied,
    Failed(GovernanceError),
}

impl RecordStatus {
    fn label(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::AlreadySatisfied => "already-satisfied",
            Self::Failed(_) => "failed",
        }
    }
}

#[derive(Debug)]
pub struct RecordOutcome {
    pub id: String,
    pub status: RecordStatus,
}

impl Serialize for RecordOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RecordOutcome", 3)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("status", self.status.label())?;
        match &self.status {
            RecordStatus::Failed(error) => {
                state.serialize_field("error", &Some(error.to_string()))?
            }
            _ => state.serialize_field("error", &None::<String>)?,
        }
        state.end()
    }
}

#[derive(Debug, Serialize)]
pub struct ActionResult {
    pub action: String,
    pub outcomes: Vec<RecordOutcome>,
}

impl ActionResult {
    pub fn new(action: &str) -> Self {
        Self {
            action: action.to_string(),
            outcomes: Vec::new(),
        }
    }

    pub fn push(&mut self, id: &str, status: RecordStatus) {
        self.outcomes.push(RecordOutcome {
            id: id.to_string(),
            status,
        });
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, RecordStatus::Failed(_)))
    }

    /// True when no record failed
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterError;

    #[test]
    fn test_result_tracks_failures() {
        let mut result = ActionResult::new("delete");
        result.push("rg-a", RecordStatus::Succeeded);
        assert!(result.is_success());

        result.push(
            "rg-b",
            RecordStatus::Failed(GovernanceError::from_adapter(
                "delete",
                AdapterError::status(429, "throttled"),
            )),
        );
        assert!(!result.is_success());
        assert_eq!(result.failures().count(), 1);
    }

    #[test]
    fn test_outcome_serialization() {
        let mut result = ActionResult::new("delete");
        result.push("rg-a", RecordStatus::AlreadySatisfied);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["action"], "delete");
        assert_eq!(value["outcomes"][0]["status"], "already-satisfied");
        assert!(value["outcomes"][0]["error"].is_null());
    }
}
