//! Filters
//!
//! A filter narrows a set of records. It is either a per-record predicate or a
//! set-level filter that may issue secondary calls; both are wrapped in
//! [`Filter`] so the pipeline treats them uniformly.

use super::manager::ResourceManager;
use super::record::ResourceRecord;
use crate::error::GovernanceError;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::future::Future;

/// Predicate evaluated against one record, without I/O
pub trait RecordFilter: Send + Sync {
    fn evaluate(&self, record: &ResourceRecord) -> bool;
}

/// Filter evaluated against the whole set
#[async_trait]
pub trait SetFilter: Send + Sync {
    /// Per-record failures go into the outcome; nothing is thrown
    async fn evaluate(
        &self,
        manager: &ResourceManager,
        records: Vec<ResourceRecord>,
    ) -> FilterOutcome;
}

/// A constructed filter, ready to run
pub enum Filter {
    Record(Box<dyn RecordFilter>),
    Set(Box<dyn SetFilter>),
}

impl Filter {
    /// Apply the filter; an empty input returns immediately without any calls
    pub async fn apply(
        &self,
        manager: &ResourceManager,
        records: Vec<ResourceRecord>,
    ) -> FilterOutcome {
        if records.is_empty() {
            return FilterOutcome::default();
        }

        match self {
            Filter::Record(predicate) => FilterOutcome {
                matched: records
                    .into_iter()
                    .filter(|record| predicate.evaluate(record))
                    .collect(),
                failures: Vec::new(),
            },
            Filter::Set(filter) => filter.evaluate(manager, records).await,
        }
    }
}

/// A record that could not be evaluated or acted on
#[derive(Debug)]
pub struct RecordFailure {
    pub id: String,
    pub error: GovernanceError,
}

impl RecordFailure {
    pub fn new(record: &ResourceRecord, error: GovernanceError) -> Self {
        Self {
            id: record.key().to_string(),
            error,
        }
    }
}

impl Serialize for RecordFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RecordFailure", 3)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("error", &self.error.to_string())?;
        state.serialize_field("transient", &self.error.is_transient())?;
        state.end()
    }
}

/// Records kept by a filter plus the ones that failed evaluation
#[derive(Debug, Default)]
pub struct FilterOutcome {
    pub matched: Vec<ResourceRecord>,
    pub failures: Vec<RecordFailure>,
}

/// Evaluate an async per-record check through the bounded worker pool
///
/// Checks run with at most `manager.settings().pool_size()` in flight.
/// A failing check excludes its record and is recorded; siblings keep running.
/// Matched records keep their input order.
pub async fn evaluate_each<'a, F, Fut>(
    manager: &'a ResourceManager,
    records: Vec<ResourceRecord>,
    check: F,
) -> FilterOutcome
where
    F: Fn(&'a ResourceManager, ResourceRecord) -> Fut,
    Fut: Future<Output = (ResourceRecord, Result<bool, GovernanceError>)>,
{
    let verdicts: Vec<_> = stream::iter(records)
        .map(|record| check(manager, record))
        .buffered(manager.settings().pool_size())
        .collect()
        .await;

    let mut outcome = FilterOutcome::default();
    for (record, verdict) in verdicts {
        match verdict {
            Ok(true) => outcome.matched.push(record),
            Ok(false) => {}
            Err(error) => {
                tracing::warn!(resource = %record.key(), error = %error, "Filter check failed");
                outcome.failures.push(RecordFailure::new(&record, error));
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_serializes_error_text() {
        let record = ResourceRecord::from_raw(serde_json::json!({"name": "rg-a"})).unwrap();
        let failure = RecordFailure::new(
            &record,
            GovernanceError::NotFound {
                id: "rg-a".into(),
                source: None,
            },
        );
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value["id"], "rg-a");
        assert_eq!(value["transient"], false);
        assert_eq!(value["error"], "resource 'rg-a' not found");
    }
}
