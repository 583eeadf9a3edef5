//! In-memory resource client shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use azgov::error::AdapterError;
use azgov::resource::resourcegroup::{GROUP_RESOURCES, RESOURCE_GROUPS};
use azgov::resource::{Page, ResourceClient, ResourceKind};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

pub const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";

pub fn group(name: &str) -> Value {
    json!({
        "id": format!("/subscriptions/{}/resourceGroups/{}", SUBSCRIPTION, name),
        "name": name,
        "location": "westeurope",
        "type": "Microsoft.Resources/resourceGroups",
        "properties": {"provisioningState": "Succeeded"}
    })
}

fn child(group: &str, index: usize) -> Value {
    json!({
        "id": format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Storage/storageAccounts/sa{}",
            SUBSCRIPTION, group, index
        ),
        "name": format!("sa{}", index),
        "type": "Microsoft.Storage/storageAccounts"
    })
}

fn not_found(name: &str) -> AdapterError {
    AdapterError::Status {
        status: 404,
        code: Some("ResourceGroupNotFound".to_string()),
        message: format!("Resource group '{}' could not be found.", name),
    }
}

/// Fake subscription holding resource groups and their resources
///
/// Every call is recorded as `op:target` (`list:resourceGroups`,
/// `list:rg-a`, `get:rg-a`, `delete:rg-a`).
pub struct FakeClient {
    groups: Mutex<Vec<Value>>,
    children: HashMap<String, Vec<Value>>,
    page_size: usize,
    page_delay: Option<Duration>,
    faults: Mutex<HashMap<String, VecDeque<AdapterError>>>,
    calls: Mutex<Vec<String>>,
}

impl Default for FakeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeClient {
    pub fn new() -> Self {
        Self {
            groups: Mutex::new(Vec::new()),
            children: HashMap::new(),
            page_size: 100,
            page_delay: None,
            faults: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Add a group holding `resources` child resources
    pub fn with_group(mut self, name: &str, resources: usize) -> Self {
        self.groups.get_mut().unwrap().push(group(name));
        self.children.insert(
            name.to_string(),
            (0..resources).map(|i| child(name, i)).collect(),
        );
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Sleep before answering every list call
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = Some(delay);
        self
    }

    /// Make the next `op:target` call fail with `error`
    pub fn fail_next(self, call: &str, error: AdapterError) -> Self {
        self.faults
            .lock()
            .unwrap()
            .entry(call.to_string())
            .or_default()
            .push_back(error);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn group_names(&self) -> Vec<String> {
        self.groups
            .lock()
            .unwrap()
            .iter()
            .filter_map(|g| g["name"].as_str().map(str::to_string))
            .collect()
    }

    fn record(&self, call: String) -> Result<(), AdapterError> {
        let fault = self
            .faults
            .lock()
            .unwrap()
            .get_mut(&call)
            .and_then(|queue| queue.pop_front());
        self.calls.lock().unwrap().push(call);
        match fault {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn page(&self, items: &[Value], token: Option<&str>) -> Page {
        let start: usize = token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let end = (start + self.page_size).min(items.len());
        Page {
            items: items.get(start..end).unwrap_or_default().to_vec(),
            next_token: (end < items.len()).then(|| end.to_string()),
        }
    }
}

#[async_trait]
impl ResourceClient for FakeClient {
    async fn list_page(
        &self,
        kind: &ResourceKind,
        page_token: Option<&str>,
    ) -> Result<Page, AdapterError> {
        if let Some(delay) = self.page_delay {
            tokio::time::sleep(delay).await;
        }

        match (kind.collection.as_str(), kind.scope.as_deref()) {
            (RESOURCE_GROUPS, None) => {
                self.record(format!("list:{}", RESOURCE_GROUPS))?;
                let groups = self.groups.lock().unwrap().clone();
                Ok(self.page(&groups, page_token))
            }
            (GROUP_RESOURCES, Some(group)) => {
                self.record(format!("list:{}", group))?;
                let exists = self.group_names().iter().any(|g| g == group);
                match self.children.get(group) {
                    Some(children) if exists => Ok(self.page(children, page_token)),
                    _ => Err(not_found(group)),
                }
            }
            _ => Err(AdapterError::status(400, format!("unsupported kind {}", kind))),
        }
    }

    async fn get(&self, _kind: &ResourceKind, identifier: &str) -> Result<Value, AdapterError> {
        self.record(format!("get:{}", identifier))?;
        self.groups
            .lock()
            .unwrap()
            .iter()
            .find(|g| g["name"].as_str() == Some(identifier))
            .cloned()
            .ok_or_else(|| not_found(identifier))
    }

    async fn delete(&self, _kind: &ResourceKind, identifier: &str) -> Result<(), AdapterError> {
        self.record(format!("delete:{}", identifier))?;
        let mut groups = self.groups.lock().unwrap();
        let before = groups.len();
        groups.retain(|g| g["name"].as_str() != Some(identifier));
        if groups.len() == before {
            return Err(not_found(identifier));
        }
        Ok(())
    }
}
