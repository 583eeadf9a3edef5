//! Policy pipeline
//!
//! Resolves a policy against the registry, builds every filter and action up
//! front (so bad parameters fail before any network call), then runs
//! enumerate → augment → filter → act and reports what happened.

use super::action::{Action, ActionResult};
use super::client::ResourceClient;
use super::filter::{Filter, RecordFailure};
use super::manager::ResourceManager;
use super::registry::{ResourceDefinition, ResourceRegistry};
use super::settings::ManagerSettings;
use crate::error::{GovernanceError, Result};
use crate::policy::Policy;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Per-run switches
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Evaluate filters but skip actions
    pub dry_run: bool,
    /// Stop enumeration after this long and continue with what was collected
    pub deadline: Option<Duration>,
}

/// A policy whose filters and actions have been validated and built
pub struct CompiledPolicy<'r> {
    pub policy: Policy,
    pub definition: &'r ResourceDefinition,
    pub filters: Vec<(String, Filter)>,
    pub actions: Vec<Box<dyn Action>>,
}

impl CompiledPolicy<'_> {
    pub fn filter_names(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().map(|(name, _)| name.as_str())
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(|action| action.name())
    }
}

/// Filter failure attributed to the filter that produced it
#[derive(Debug, Serialize)]
pub struct FilterFailure {
    pub filter: String,
    #[serde(flatten)]
    pub failure: RecordFailure,
}

#[derive(Debug, Serialize)]
pub struct PolicyReport {
    pub run_id: Uuid,
    pub policy: String,
    pub resource: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub enumerated: usize,
    pub matched: usize,
    pub deadline_exceeded: bool,
    pub filter_failures: Vec<FilterFailure>,
    pub action_results: Vec<ActionResult>,
}

impl PolicyReport {
    /// True when enumeration completed and no filter check or action failed
    pub fn is_clean(&self) -> bool {
        !self.deadline_exceeded
            && self.filter_failures.is_empty()
            && self.action_results.iter().all(|r| r.is_success())
    }
}

/// Resolve and validate a policy without touching the network
///
/// Every unknown name and every invalid parameter is collected and reported
/// in a single error.
pub fn compile<'r>(registry: &'r ResourceRegistry, policy: &Policy) -> Result<CompiledPolicy<'r>> {
    let definition = registry.resolve(&policy.resource)?;
    let mut errors = Vec::new();

    let mut filters = Vec::with_capacity(policy.filters.len());
    for spec in &policy.filters {
        match definition.filters.build(&spec.name, &spec.params) {
            Ok(filter) => filters.push((spec.name.clone(), filter)),
            Err(e) => errors.push(e),
        }
    }

    let mut actions = Vec::with_capacity(policy.actions.len());
    for spec in &policy.actions {
        match definition.actions.build(&spec.name, &spec.params) {
            Ok(action) => actions.push(action),
            Err(e) => errors.push(e),
        }
    }

    if let Some(err) = GovernanceError::combine(format!("policy '{}'", policy.name), errors) {
        return Err(err);
    }

    Ok(CompiledPolicy {
        policy: policy.clone(),
        definition,
        filters,
        actions,
    })
}

/// Compile and run a policy against `client`
pub async fn run_policy(
    registry: &ResourceRegistry,
    policy: &Policy,
    client: Arc<dyn ResourceClient>,
    settings: ManagerSettings,
    options: RunOptions,
) -> Result<PolicyReport> {
    let compiled = compile(registry, policy)?;
    execute(&compiled, client, settings, options).await
}

/// Run an already compiled policy
pub async fn execute(
    compiled: &CompiledPolicy<'_>,
    client: Arc<dyn ResourceClient>,
    settings: ManagerSettings,
    options: RunOptions,
) -> Result<PolicyReport> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let policy = &compiled.policy;
    let manager = ResourceManager::new(compiled.definition.descriptor, client, settings);

    tracing::info!(
        run_id = %run_id,
        policy = %policy.name,
        resource = %policy.resource,
        dry_run = options.dry_run,
        "Running policy"
    );

    let deadline = options
        .deadline
        .map(|limit| tokio::time::Instant::now() + limit);
    let enumeration = manager.enumerate_until(deadline).await?;
    let enumerated = enumeration.records.len();

    let mut records = enumeration.records;
    let mut filter_failures = Vec::new();
    for (name, filter) in &compiled.filters {
        let outcome = filter.apply(&manager, records).await;
        tracing::debug!(
            filter = %name,
            matched = outcome.matched.len(),
            failed = outcome.failures.len(),
            "Filter applied"
        );
        filter_failures.extend(outcome.failures.into_iter().map(|failure| FilterFailure {
            filter: name.clone(),
            failure,
        }));
        records = outcome.matched;
    }

    let mut action_results = Vec::new();
    if options.dry_run {
        tracing::info!(matched = records.len(), "Dry run, skipping actions");
    } else if !records.is_empty() {
        for action in &compiled.actions {
            let result = action.process(&manager, &records).await;
            tracing::info!(
                action = %action.name(),
                total = result.outcomes.len(),
                failed = result.failures().count(),
                "Action processed"
            );
            action_results.push(result);
        }
    }

    Ok(PolicyReport {
        run_id,
        policy: policy.name.clone(),
        resource: policy.resource.clone(),
        started_at,
        finished_at: Utc::now(),
        dry_run: options.dry_run,
        enumerated,
        matched: records.len(),
        deadline_exceeded: enumeration.deadline_exceeded.is_some(),
        filter_failures,
        action_results,
    })
}
