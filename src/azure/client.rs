//! Azure Client
//!
//! Resource Manager client combining authentication and HTTP, exposed to the
//! governance core as a [`ResourceClient`].

use super::auth::AzureCredentials;
use super::http::ArmHttpClient;
use crate::error::AdapterError;
use crate::resource::resourcegroup::{GROUP_RESOURCES, RESOURCE_GROUPS};
use crate::resource::{Page, ResourceClient, ResourceKind};
use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

/// Public Azure Resource Manager endpoint
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

/// API version for the Microsoft.Resources provider
pub const RESOURCES_API_VERSION: &str = "2021-04-01";

/// Main Azure client
#[derive(Clone)]
pub struct AzureClient {
    pub credentials: AzureCredentials,
    pub http: ArmHttpClient,
    pub subscription_id: String,
    endpoint: Url,
}

impl AzureClient {
    /// Create a client for the public cloud using environment or CLI credentials
    pub fn new(subscription_id: &str) -> anyhow::Result<Self> {
        Self::with_endpoint(DEFAULT_ENDPOINT, subscription_id, AzureCredentials::from_env())
    }

    /// Create a client against a specific endpoint (sovereign clouds, tests)
    pub fn with_endpoint(
        endpoint: &str,
        subscription_id: &str,
        credentials: AzureCredentials,
    ) -> anyhow::Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("Invalid Resource Manager endpoint: {}", endpoint))?;
        let http = ArmHttpClient::new()?;

        Ok(Self {
            credentials,
            http,
            subscription_id: subscription_id.to_string(),
            endpoint,
        })
    }

    /// Make a GET request, refreshing the token once on 401
    pub async fn get(&self, url: &str) -> Result<Value, AdapterError> {
        let token = self.token().await?;
        match self.http.get(url, &token).await {
            Err(AdapterError::Status { status: 401, .. }) => {
                let token = self.refreshed_token().await?;
                self.http.get(url, &token).await
            }
            other => other,
        }
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: &str) -> Result<Value, AdapterError> {
        let token = self.token().await?;
        self.http.delete(url, &token).await
    }

    async fn token(&self) -> Result<String, AdapterError> {
        self.credentials.get_token().await.map_err(AdapterError::Other)
    }

    async fn refreshed_token(&self) -> Result<String, AdapterError> {
        self.credentials.refresh_token().await.map_err(AdapterError::Other)
    }

    // =========================================================================
    // Resource Manager URL helpers
    // =========================================================================

    /// Build a subscription-scoped URL with the api-version query
    pub fn subscription_url(&self, path: &str) -> String {
        format!(
            "{}/subscriptions/{}/{}?api-version={}",
            self.endpoint.as_str().trim_end_matches('/'),
            urlencoding::encode(&self.subscription_id),
            path,
            RESOURCES_API_VERSION
        )
    }

    /// Build resource groups list URL
    pub fn resource_groups_url(&self) -> String {
        self.subscription_url("resourcegroups")
    }

    /// Build single resource group URL
    pub fn resource_group_url(&self, name: &str) -> String {
        self.subscription_url(&format!("resourcegroups/{}", urlencoding::encode(name)))
    }

    /// Build URL listing the resources inside a group
    pub fn group_resources_url(&self, group: &str) -> String {
        self.subscription_url(&format!(
            "resourceGroups/{}/resources",
            urlencoding::encode(group)
        ))
    }

    /// Accept a `nextLink` only when it points at our endpoint
    /// Security: the bearer token must never be sent to another host
    fn checked_next_link(&self, link: &str) -> Result<String, AdapterError> {
        let url = Url::parse(link)
            .with_context(|| format!("Invalid nextLink: {}", link))
            .map_err(AdapterError::Other)?;

        if url.scheme() != self.endpoint.scheme()
            || url.host_str() != self.endpoint.host_str()
            || url.port_or_known_default() != self.endpoint.port_or_known_default()
        {
            return Err(AdapterError::Other(anyhow::anyhow!(
                "nextLink points outside {}: {}",
                self.endpoint,
                url.host_str().unwrap_or("-")
            )));
        }

        Ok(url.into())
    }

    fn list_url(&self, kind: &ResourceKind) -> Result<String, AdapterError> {
        match (kind.collection.as_str(), kind.scope.as_deref()) {
            (RESOURCE_GROUPS, None) => Ok(self.resource_groups_url()),
            (GROUP_RESOURCES, Some(group)) => Ok(self.group_resources_url(group)),
            _ => Err(unsupported("list", kind)),
        }
    }
}

fn unsupported(operation: &str, kind: &ResourceKind) -> AdapterError {
    AdapterError::Other(anyhow::anyhow!("Unsupported {} for {}", operation, kind))
}

/// Extract items and the continuation link from an ARM list response
fn parse_page(response: Value) -> Page {
    let next_token = response
        .get("nextLink")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let items = match response {
        Value::Object(mut map) => match map.remove("value") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    Page { items, next_token }
}

#[async_trait]
impl ResourceClient for AzureClient {
    async fn list_page(
        &self,
        kind: &ResourceKind,
        page_token: Option<&str>,
    ) -> Result<Page, AdapterError> {
        let url = match page_token {
            Some(link) => self.checked_next_link(link)?,
            None => self.list_url(kind)?,
        };
        tracing::debug!(kind = %kind, "Listing page");
        Ok(parse_page(self.get(&url).await?))
    }

    async fn get(&self, kind: &ResourceKind, identifier: &str) -> Result<Value, AdapterError> {
        match (kind.collection.as_str(), kind.scope.as_deref()) {
            (RESOURCE_GROUPS, None) => AzureClient::get(self, &self.resource_group_url(identifier)).await,
            _ => Err(unsupported("get", kind)),
        }
    }

    async fn delete(&self, kind: &ResourceKind, identifier: &str) -> Result<(), AdapterError> {
        match (kind.collection.as_str(), kind.scope.as_deref()) {
            (RESOURCE_GROUPS, None) => {
                AzureClient::delete(self, &self.resource_group_url(identifier)).await?;
                Ok(())
            }
            _ => Err(unsupported("delete", kind)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> AzureClient {
        AzureClient::with_endpoint(
            "https://management.azure.com",
            "00000000-0000-0000-0000-000000000000",
            AzureCredentials::with_token("t"),
        )
        .unwrap()
    }

    #[test]
    fn test_resource_group_urls() {
        let client = client();
        assert_eq!(
            client.resource_group_url("rg a"),
            "https://management.azure.com/subscriptions/00000000-0000-0000-0000-000000000000/resourcegroups/rg%20a?api-version=2021-04-01"
        );
        assert!(client
            .group_resources_url("rg-a")
            .contains("/resourceGroups/rg-a/resources?api-version="));
    }

    #[test]
    fn test_next_link_must_stay_on_endpoint() {
        let client = client();
        assert!(client
            .checked_next_link("https://management.azure.com/subscriptions/x/resourcegroups?$skiptoken=abc")
            .is_ok());
        assert!(client
            .checked_next_link("https://evil.example.com/subscriptions/x")
            .is_err());
        assert!(client.checked_next_link("not a url").is_err());
    }

    #[test]
    fn test_parse_page() {
        let page = parse_page(json!({
            "value": [{"name": "rg-a"}, {"name": "rg-b"}],
            "nextLink": "https://management.azure.com/next"
        }));
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next_token.as_deref(), Some("https://management.azure.com/next"));

        let page = parse_page(json!({"value": [], "nextLink": ""}));
        assert!(page.items.is_empty());
        assert!(page.next_token.is_none());
    }

    #[test]
    fn test_unsupported_kinds() {
        let client = client();
        let kind = ResourceKind::new(GROUP_RESOURCES);
        assert!(client.list_url(&kind).is_err());
        assert!(client.list_url(&ResourceKind::new(RESOURCE_GROUPS)).is_ok());
    }
}
