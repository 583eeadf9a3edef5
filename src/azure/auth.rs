//! Azure Authentication
//!
//! Bearer tokens for Azure Resource Manager, taken from `AZURE_ACCESS_TOKEN`
//! or from the Azure CLI (`az account get-access-token`).

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Audience for Azure Resource Manager tokens
pub const ARM_RESOURCE: &str = "https://management.azure.com/";

/// Token expiry buffer - refresh tokens this much before they actually expire
/// This prevents using tokens that are about to expire during a request
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if we can't determine expiry (conservative: 30 minutes)
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Where tokens come from
#[derive(Debug, Clone)]
enum TokenSource {
    /// A fixed token, from the environment or supplied by the caller
    Static(String),
    /// `az account get-access-token`
    AzureCli,
}

/// Azure credentials holder with token caching
#[derive(Clone)]
pub struct AzureCredentials {
    source: TokenSource,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    /// Check if this cached token is still valid
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Output of `az account get-access-token --output json`
#[derive(Debug, Deserialize)]
struct CliToken {
    #[serde(rename = "accessToken")]
    access_token: String,
    /// Unix timestamp, present in recent CLI versions
    #[serde(default)]
    expires_on: Option<i64>,
}

impl AzureCredentials {
    /// Use `AZURE_ACCESS_TOKEN` when set, the Azure CLI otherwise
    pub fn from_env() -> Self {
        match std::env::var("AZURE_ACCESS_TOKEN") {
            Ok(token) if !token.trim().is_empty() => Self::with_token(token.trim()),
            _ => Self::with_source(TokenSource::AzureCli),
        }
    }

    /// Credentials that always hand out `token`
    pub fn with_token(token: &str) -> Self {
        Self::with_source(TokenSource::Static(token.to_string()))
    }

    fn with_source(source: TokenSource) -> Self {
        Self {
            source,
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Get an access token for API calls
    /// Security: Checks token expiry before returning cached token
    pub async fn get_token(&self) -> Result<String> {
        if let TokenSource::Static(token) = &self.source {
            return Ok(token.clone());
        }

        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        tracing::debug!("Fetching access token from Azure CLI");
        let cli_token = fetch_cli_token().await?;
        let ttl = cli_token
            .expires_on
            .and_then(|expires_on| u64::try_from(expires_on - Utc::now().timestamp()).ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_TTL);
        let expires_at = Instant::now() + ttl.saturating_sub(TOKEN_EXPIRY_BUFFER);

        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: cli_token.access_token.clone(),
                expires_at,
            });
        }

        tracing::debug!(
            "New token cached, expires in ~{} minutes",
            ttl.saturating_sub(TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(cli_token.access_token)
    }

    /// Force refresh the token
    pub async fn refresh_token(&self) -> Result<String> {
        {
            let mut cache = self.token_cache.write().await;
            *cache = None;
        }

        self.get_token().await
    }
}

async fn fetch_cli_token() -> Result<CliToken> {
    let output = tokio::process::Command::new("az")
        .args([
            "account",
            "get-access-token",
            "--resource",
            ARM_RESOURCE,
            "--output",
            "json",
        ])
        .output()
        .await
        .context("Failed to run 'az'. Install the Azure CLI or set AZURE_ACCESS_TOKEN")?;

    if !output.status.success() {
        anyhow::bail!(
            "'az account get-access-token' failed ({}). Run 'az login'",
            output.status
        );
    }

    serde_json::from_slice(&output.stdout).context("Failed to parse Azure CLI token output")
}

/// Validate an Azure subscription id (a GUID)
fn validate_subscription_id(subscription: &str) -> bool {
    Uuid::parse_str(subscription).is_ok()
}

/// Read the default subscription
/// Security: Validates subscription id format before returning
pub fn get_default_subscription() -> Option<String> {
    if let Ok(subscription) = std::env::var("AZURE_SUBSCRIPTION_ID") {
        let subscription = subscription.trim().to_string();
        if validate_subscription_id(&subscription) {
            return Some(subscription);
        }
        tracing::warn!("Invalid subscription id format in AZURE_SUBSCRIPTION_ID");
    }

    let output = std::process::Command::new("az")
        .args(["account", "show", "--query", "id", "--output", "tsv"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }

    let subscription = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if validate_subscription_id(&subscription) {
        Some(subscription)
    } else {
        tracing::warn!("Azure CLI returned an invalid subscription id");
        None
    }
}
