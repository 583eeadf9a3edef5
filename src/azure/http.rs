//! HTTP utilities for Azure Resource Manager REST calls

use crate::error::AdapterError;
use anyhow::Context;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Map a transport failure onto the adapter taxonomy
fn transport_error(err: reqwest::Error) -> AdapterError {
    if err.is_timeout() {
        AdapterError::Timeout(err.to_string())
    } else if err.is_connect() {
        AdapterError::Connection(err.to_string())
    } else {
        AdapterError::Other(anyhow::Error::new(err).context("Failed to send request"))
    }
}

/// Build a status error from an ARM error body (`{"error": {"code", "message"}}`)
fn status_error(status: StatusCode, body: &str) -> AdapterError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));
    let code = error
        .and_then(|e| e.get("code"))
        .and_then(|c| c.as_str())
        .map(str::to_string);
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_string()
        });

    AdapterError::Status {
        status: status.as_u16(),
        code,
        message,
    }
}

/// HTTP client wrapper for ARM calls
#[derive(Clone)]
pub struct ArmHttpClient {
    client: Client,
}

impl ArmHttpClient {
    /// Create a new HTTP client
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("azgov/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Make a GET request
    pub async fn get(&self, url: &str, token: &str) -> Result<Value, AdapterError> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;

        Self::read_json(response).await
    }

    /// Make a DELETE request
    ///
    /// ARM answers 200/202 for accepted deletes and 204 when there was
    /// nothing to delete; all of them count as success.
    pub async fn delete(&self, url: &str, token: &str) -> Result<Value, AdapterError> {
        tracing::debug!("DELETE {}", url);

        let response = self
            .client
            .delete(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;

        Self::read_json(response).await
    }

    async fn read_json(response: Response) -> Result<Value, AdapterError> {
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::debug!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(status_error(status, &body));
        }

        // Handle empty response
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body)
            .context("Failed to parse response JSON")
            .map_err(AdapterError::Other)
    }
}

/// Format an adapter error for display
/// Security: Generic messages avoid echoing raw API responses to the terminal
pub fn format_api_error(error: &AdapterError) -> String {
    match error {
        AdapterError::Status { status: 401, .. } => {
            "Authentication failed. Run 'az login' or set AZURE_ACCESS_TOKEN.".to_string()
        }
        AdapterError::Status { status: 403, .. } => {
            "Permission denied. Check your Azure RBAC role assignments.".to_string()
        }
        AdapterError::Status { status: 404, .. } => "Resource not found.".to_string(),
        AdapterError::Status { status: 409, .. } => {
            "Resource conflict. The resource may be locked or in use.".to_string()
        }
        AdapterError::Status { status: 429, .. } => {
            "Rate limit exceeded. Please try again later.".to_string()
        }
        AdapterError::Status { status, .. } if *status >= 500 => {
            "Azure service temporarily unavailable. Please try again.".to_string()
        }
        AdapterError::Status { code: Some(code), .. } => format!("Request rejected: {}", code),
        AdapterError::Status { .. } => "Invalid request. Check your parameters.".to_string(),
        AdapterError::Timeout(_) => "Request timed out.".to_string(),
        AdapterError::Connection(_) => {
            "Request failed. Check your network connection and try again.".to_string()
        }
        AdapterError::Other(e) => {
            let text = e.to_string();
            let sanitized: String = text
                .chars()
                .filter(|c| c.is_ascii_graphic() || *c == ' ')
                .take(80)
                .collect();
            if sanitized.len() < text.len() {
                format!("{}...", sanitized)
            } else {
                sanitized
            }
        }
    }
}
