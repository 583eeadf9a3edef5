//! Resource type descriptors
//!
//! Static, immutable metadata describing how to reach one resource kind
//! through the adapter.

use super::client::ResourceKind;
use super::record::{ResourceRecord, TYPE_KEY};
use serde_json::Value;

/// Enumeration call for a kind: adapter collection plus the listing method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumSpec {
    pub collection: &'static str,
    pub method: &'static str,
}

/// Turns an external identifier into the adapter's addressable component
pub type IdParser = fn(&str) -> Option<String>;

/// Post-enumeration enrichment; must be idempotent and must not do I/O
pub type Augmenter = fn(&ResourceTypeDescriptor, &mut ResourceRecord);

#[derive(Debug, Clone, Copy)]
pub struct ResourceTypeDescriptor {
    /// Provider service identifier, e.g. `azure.mgmt.resource`
    pub service: &'static str,
    /// Client kind within the service, e.g. `ResourceManagementClient`
    pub client: &'static str,
    pub enum_spec: EnumSpec,
    /// Declared `type` stamped onto every emitted record
    pub resource_type: &'static str,
    pub id_parser: IdParser,
    pub augment: Augmenter,
}

impl ResourceTypeDescriptor {
    pub fn kind(&self) -> ResourceKind {
        ResourceKind::new(self.enum_spec.collection)
    }

    pub fn parse_id(&self, id: &str) -> Option<String> {
        (self.id_parser)(id)
    }

    pub fn augment(&self, record: &mut ResourceRecord) {
        (self.augment)(self, record)
    }
}

/// Default augmentation: stamp the declared type
pub fn stamp_type(descriptor: &ResourceTypeDescriptor, record: &mut ResourceRecord) {
    record.insert(
        TYPE_KEY,
        Value::String(descriptor.resource_type.to_string()),
    );
}

/// Extract the resource group from an ARM id
///
/// `/subscriptions/{sub}/resourceGroups/{rg}/providers/...` yields `{rg}`.
/// A bare name (no `/`) is returned as is.
pub fn parse_resource_group(id: &str) -> Option<String> {
    let id = id.trim();
    if id.is_empty() {
        return None;
    }
    if !id.contains('/') {
        return Some(id.to_string());
    }

    let mut segments = id.split('/').filter(|s| !s.is_empty());
    while let Some(segment) = segments.next() {
        if segment.eq_ignore_ascii_case("resourcegroups") {
            return segments.next().map(str::to_string);
        }
    }
    None
}
