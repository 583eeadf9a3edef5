//! Configuration Management
//!
//! Handles persistent configuration storage for azgov.

use crate::resource::settings::{
    LookupFailurePolicy, ManagerSettings, RetryPolicy, DEFAULT_CALL_TIMEOUT, DEFAULT_CONCURRENCY,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// User configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Subscription to govern when no `--subscription` flag is given
    pub subscription_id: Option<String>,
    /// Maximum concurrent per-resource calls
    pub concurrency: usize,
    /// Timeout for a single API call
    pub call_timeout_secs: u64,
    pub retry: RetryPolicy,
    /// What to do when a looked-up id does not exist
    pub lookup_failure: LookupFailurePolicy,
    /// Retry deletes on transient failures
    pub retry_destructive: bool,
    /// Stop enumerating after this many seconds and keep what was collected
    pub deadline_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            subscription_id: None,
            concurrency: DEFAULT_CONCURRENCY,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT.as_secs(),
            retry: RetryPolicy::default(),
            lookup_failure: LookupFailurePolicy::default(),
            retry_destructive: false,
            deadline_secs: None,
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("azgov").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from a specific file, falling back to defaults when absent or malformed
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(())
    }

    /// Get effective subscription (config > AZURE_SUBSCRIPTION_ID > az default)
    pub fn effective_subscription(&self) -> Option<String> {
        self.subscription_id
            .clone()
            .filter(|s| !s.trim().is_empty())
            .or_else(crate::azure::auth::get_default_subscription)
    }

    pub fn manager_settings(&self) -> ManagerSettings {
        ManagerSettings {
            concurrency: self.concurrency,
            call_timeout: Duration::from_secs(self.call_timeout_secs.max(1)),
            retry: self.retry,
            lookup_failure: self.lookup_failure,
            retry_destructive: self.retry_destructive,
        }
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}
