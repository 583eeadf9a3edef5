//! Adapter boundary
//!
//! The core never talks to a cloud SDK directly. It calls a [`ResourceClient`],
//! which lists, gets and deletes raw objects and reports provider-native
//! [`AdapterError`]s.

use crate::error::AdapterError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Addressable collection of remote objects, optionally scoped to a parent
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKind {
    /// Collection name understood by the adapter, e.g. `resourceGroups`
    pub collection: String,
    /// Parent scope, e.g. the resource group owning a `resources` listing
    pub scope: Option<String>,
}

impl ResourceKind {
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            scope: None,
        }
    }

    pub fn within(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{}[{}]", self.collection, scope),
            None => f.write_str(&self.collection),
        }
    }
}

/// One page of a listing
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Value>,
    pub next_token: Option<String>,
}

/// Capability the core uses to reach remote objects
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Fetch one page of `kind`; `page_token` is the previous page's `next_token`
    async fn list_page(&self, kind: &ResourceKind, page_token: Option<&str>)
        -> Result<Page, AdapterError>;

    /// Fetch a single object by its addressable identifier
    async fn get(&self, kind: &ResourceKind, identifier: &str) -> Result<Value, AdapterError>;

    /// Delete a single object by its addressable identifier
    async fn delete(&self, kind: &ResourceKind, identifier: &str) -> Result<(), AdapterError>;
}
