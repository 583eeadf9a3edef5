//! Resource governance core
//!
//! This module provides the registry + enumeration + filter + action pipeline
//! that every resource kind plugs into.
//!
//! # Architecture
//!
//! - [`client`] - Adapter boundary the core calls to list, get and delete objects
//! - [`descriptor`] - Static metadata describing how to reach a resource kind
//! - [`manager`] - Enumeration, lookup by id, augmentation, lazy secondary listings
//! - [`filter`] / [`action`] - Filter and action contracts
//! - [`registry`] - Name → constructor maps per kind, plus the process-wide registry
//! - [`pipeline`] - Validates and runs a policy
//!
//! # Example
//!
//! ```ignore
//! use azgov::resource::{get_registry, run_policy, ManagerSettings, RunOptions};
//!
//! async fn run(policy: &azgov::policy::Policy, client: Arc<dyn ResourceClient>) -> anyhow::Result<()> {
//!     let report = run_policy(get_registry(), policy, client, ManagerSettings::default(), RunOptions::default()).await?;
//!     println!("{} matched", report.matched);
//!     Ok(())
//! }
//! ```

pub mod action;
pub mod client;
pub mod descriptor;
pub mod filter;
pub mod manager;
pub mod pipeline;
pub mod record;
pub mod registry;
pub mod resourcegroup;
pub mod schema;
pub mod settings;
pub mod value;

pub use action::{Action, ActionResult, RecordOutcome, RecordStatus};
pub use client::{Page, ResourceClient, ResourceKind};
pub use descriptor::{EnumSpec, ResourceTypeDescriptor};
pub use filter::{Filter, FilterOutcome, RecordFailure, RecordFilter, SetFilter};
pub use manager::{Deletion, Enumeration, Lookup, ResourceManager};
pub use pipeline::{compile, execute, run_policy, PolicyReport, RunOptions};
pub use record::ResourceRecord;
pub use registry::{get_registry, ResourceDefinition, ResourceRegistry};
pub use schema::{ActionSpec, ElementSpec, FilterSpec};
pub use settings::{LookupFailurePolicy, ManagerSettings, RetryPolicy};
