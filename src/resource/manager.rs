//! Resource Manager
//!
//! Enumerates one resource kind through the adapter, looks resources up by
//! id and augments every emitted record.

use super::client::{ResourceClient, ResourceKind};
use super::descriptor::ResourceTypeDescriptor;
use super::record::ResourceRecord;
use super::settings::{LookupFailurePolicy, ManagerSettings};
use crate::error::{GovernanceError, Result};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde_json::Value;
use std::sync::Arc;
use tokio::time::Instant;

/// Records produced by an enumeration
#[derive(Debug)]
pub struct Enumeration {
    pub records: Vec<ResourceRecord>,
    /// Set when a deadline stopped the listing early; `records` holds what was collected
    pub deadline_exceeded: Option<GovernanceError>,
}

/// Records produced by `get_by_ids`
#[derive(Debug, Default)]
pub struct Lookup {
    /// Resolved records, in input order
    pub records: Vec<ResourceRecord>,
    /// Ids skipped under [`LookupFailurePolicy::Skip`]
    pub missing: Vec<GovernanceError>,
    /// Failure that stopped the batch; `records` holds the lookups completed before it
    pub aborted: Option<GovernanceError>,
}

impl Lookup {
    /// The resolved records, or the failure that stopped the batch
    pub fn into_records(self) -> Result<Vec<ResourceRecord>> {
        match self.aborted {
            Some(err) => Err(err),
            None => Ok(self.records),
        }
    }
}

/// Outcome of a delete call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    Deleted,
    /// The object was already gone
    AlreadyAbsent,
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

pub struct ResourceManager {
    descriptor: &'static ResourceTypeDescriptor,
    client: Arc<dyn ResourceClient>,
    settings: ManagerSettings,
}

impl ResourceManager {
    pub fn new(
        descriptor: &'static ResourceTypeDescriptor,
        client: Arc<dyn ResourceClient>,
        settings: ManagerSettings,
    ) -> Self {
        Self {
            descriptor,
            client,
            settings,
        }
    }

    pub fn descriptor(&self) -> &'static ResourceTypeDescriptor {
        self.descriptor
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// List every page of the kind and augment the full set
    pub async fn enumerate(&self) -> Result<Vec<ResourceRecord>> {
        Ok(self.enumerate_until(None).await?.records)
    }

    /// Like [`enumerate`](Self::enumerate), stopping cleanly at `deadline`
    pub async fn enumerate_until(&self, deadline: Option<Instant>) -> Result<Enumeration> {
        let kind = self.descriptor.kind();
        let operation = format!("{}.{}", kind, self.descriptor.enum_spec.method);
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;
        let mut page_count = 0u32;
        let mut deadline_exceeded = false;

        loop {
            if deadline.is_some_and(|at| Instant::now() >= at) {
                deadline_exceeded = true;
                break;
            }

            let token = page_token.as_deref();
            let fetch = self.settings.read(&operation, || self.client.list_page(&kind, token));
            let page = match deadline {
                Some(at) => match tokio::time::timeout_at(at, fetch).await {
                    Ok(page) => page,
                    Err(_) => {
                        deadline_exceeded = true;
                        break;
                    }
                },
                None => fetch.await,
            }
            .map_err(|e| GovernanceError::from_adapter(operation.as_str(), e))?;

            for raw in page.items {
                records.push(self.serialize(&operation, raw)?);
            }
            page_count += 1;

            match page.next_token {
                Some(token) if !token.is_empty() => {
                    tracing::debug!(
                        kind = %kind,
                        page = page_count,
                        total_so_far = records.len(),
                        "Fetched page, continuing"
                    );
                    page_token = Some(token);
                }
                _ => break,
            }
        }

        let deadline_exceeded = deadline_exceeded.then(|| {
            tracing::warn!(
                kind = %kind,
                pages = page_count,
                collected = records.len(),
                "Deadline exceeded, returning partial enumeration"
            );
            GovernanceError::DeadlineExceeded {
                collected: records.len(),
            }
        });

        Ok(Enumeration {
            records: self.augment(records),
            deadline_exceeded,
        })
    }

    /// Fetch resources one by one, keeping input order
    ///
    /// A failed id never discards the lookups completed before it. Under
    /// [`LookupFailurePolicy::Abort`] the batch stops and the failure is
    /// returned in [`Lookup::aborted`]; under `Skip` a not-found id is
    /// recorded in [`Lookup::missing`] and the batch continues.
    pub async fn get_by_ids<S: AsRef<str>>(&self, ids: &[S]) -> Lookup {
        let kind = self.descriptor.kind();
        let operation = format!("{}.get", kind);
        let mut lookup = Lookup::default();

        for id in ids {
            let id = id.as_ref();
            let result = match self.descriptor.parse_id(id) {
                Some(target) => {
                    let target = target.as_str();
                    self.settings
                        .read(&operation, || self.client.get(&kind, target))
                        .await
                        .map_err(|e| {
                            if e.is_not_found() {
                                GovernanceError::NotFound {
                                    id: id.to_string(),
                                    source: Some(e),
                                }
                            } else {
                                GovernanceError::from_adapter(operation.as_str(), e)
                            }
                        })
                }
                None => Err(GovernanceError::NotFound {
                    id: id.to_string(),
                    source: None,
                }),
            };

            match result.and_then(|raw| self.serialize(&operation, raw)) {
                Ok(record) => lookup.records.push(record),
                Err(err @ GovernanceError::NotFound { .. })
                    if self.settings.lookup_failure == LookupFailurePolicy::Skip =>
                {
                    tracing::warn!(id = %id, "Lookup failed, skipping");
                    lookup.missing.push(err);
                }
                Err(err) => {
                    tracing::warn!(
                        id = %id,
                        completed = lookup.records.len(),
                        error = %err,
                        "Lookup failed, stopping batch"
                    );
                    lookup.aborted = Some(err);
                    break;
                }
            }
        }

        lookup.records = self.augment(lookup.records);
        lookup
    }

    /// Enrich records in place; idempotent and free of I/O
    pub fn augment(&self, mut records: Vec<ResourceRecord>) -> Vec<ResourceRecord> {
        for record in &mut records {
            self.descriptor.augment(record);
        }
        records
    }

    /// Lazily page through a secondary listing
    ///
    /// Pages are requested only as the stream is polled, so a consumer that
    /// stops at the first item never fetches more than one non-empty page.
    /// Each call starts a fresh listing.
    pub fn list_lazy(&self, kind: ResourceKind) -> BoxStream<'_, Result<Value>> {
        stream::try_unfold(Cursor::Start, move |cursor| {
            let kind = kind.clone();
            async move {
                let token = match cursor {
                    Cursor::Start => None,
                    Cursor::Next(token) => Some(token),
                    Cursor::Done => return Ok(None),
                };
                let operation = format!("{}.list", kind);
                let page = self
                    .settings
                    .read(&operation, || self.client.list_page(&kind, token.as_deref()))
                    .await
                    .map_err(|e| GovernanceError::from_adapter(operation.as_str(), e))?;

                let next = match page.next_token {
                    Some(token) if !token.is_empty() => Cursor::Next(token),
                    _ => Cursor::Done,
                };
                let items = stream::iter(page.items.into_iter().map(Ok::<_, GovernanceError>));
                Ok::<_, GovernanceError>(Some((items, next)))
            }
        })
        .try_flatten()
        .boxed()
    }

    /// Delete one object; not-found counts as already satisfied
    pub async fn delete(&self, identifier: &str) -> Result<Deletion> {
        let kind = self.descriptor.kind();
        let operation = format!("{}.delete", kind);

        match self
            .settings
            .mutate(&operation, || self.client.delete(&kind, identifier))
            .await
        {
            Ok(()) => Ok(Deletion::Deleted),
            Err(e) if e.is_not_found() => {
                tracing::info!(resource = %identifier, "Already deleted");
                Ok(Deletion::AlreadyAbsent)
            }
            Err(e) => Err(GovernanceError::from_adapter(operation.as_str(), e)),
        }
    }

    fn serialize(&self, operation: &str, raw: Value) -> Result<ResourceRecord> {
        ResourceRecord::from_raw(raw).map_err(|reason| GovernanceError::InvalidRecord {
            operation: operation.to_string(),
            reason,
        })
    }
}
