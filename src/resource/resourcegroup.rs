//! Azure resource groups
//!
//! ```yaml
//! policies:
//!   - name: delete-empty-groups
//!     resource: azure.resourcegroup
//!     filters:
//!       - type: empty-group
//!     actions:
//!       - type: delete
//! ```

use super::action::{Action, ActionResult, RecordStatus};
use super::client::ResourceKind;
use super::descriptor::{parse_resource_group, stamp_type, EnumSpec, ResourceTypeDescriptor};
use super::filter::{evaluate_each, Filter, FilterOutcome, SetFilter};
use super::manager::{Deletion, ResourceManager};
use super::record::ResourceRecord;
use super::registry::{ActionType, FilterType, ResourceDefinition, ResourceType};
use super::schema::ParamSchema;
use crate::error::{GovernanceError, Result};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::{Map, Value};

/// Adapter collection holding resource groups
pub const RESOURCE_GROUPS: &str = "resourceGroups";

/// Adapter collection holding the resources inside a group
pub const GROUP_RESOURCES: &str = "resources";

pub const DESCRIPTOR: ResourceTypeDescriptor = ResourceTypeDescriptor {
    service: "azure.mgmt.resource",
    client: "ResourceManagementClient",
    enum_spec: EnumSpec {
        collection: RESOURCE_GROUPS,
        method: "list",
    },
    resource_type: "Microsoft.Resources/subscriptions/resourceGroups",
    id_parser: parse_resource_group,
    augment: stamp_type,
};

/// The `resourcegroup` kind
pub struct ResourceGroup;

impl ResourceType for ResourceGroup {
    const DESCRIPTOR: &'static ResourceTypeDescriptor = &DESCRIPTOR;

    fn install(definition: &mut ResourceDefinition) -> Result<()> {
        definition.filters.register_filter::<EmptyGroup>("empty-group")?;
        definition.actions.register_action::<DeleteResourceGroup>("delete")?;
        Ok(())
    }
}

/// Name used to address a group in adapter calls
fn group_name(group: &ResourceRecord) -> Option<String> {
    group
        .name()
        .map(str::to_string)
        .or_else(|| group.id().and_then(parse_resource_group))
}

/// Matches resource groups that contain no resources
pub struct EmptyGroup;

impl FilterType for EmptyGroup {
    const SCHEMA: ParamSchema = ParamSchema::new("empty-group", &[]);

    fn build(_params: &Map<String, Value>) -> Result<Filter> {
        Ok(Filter::Set(Box::new(Self)))
    }
}

async fn is_empty_group(manager: &ResourceManager, group: &ResourceRecord) -> Result<bool> {
    let Some(name) = group_name(group) else {
        return Err(GovernanceError::InvalidRecord {
            operation: "empty-group".to_string(),
            reason: format!("resource group '{}' has no name", group.key()),
        });
    };

    let mut children = manager.list_lazy(ResourceKind::new(GROUP_RESOURCES).within(&name));
    Ok(children.try_next().await?.is_none())
}

#[async_trait]
impl SetFilter for EmptyGroup {
    async fn evaluate(
        &self,
        manager: &ResourceManager,
        records: Vec<ResourceRecord>,
    ) -> FilterOutcome {
        evaluate_each(manager, records, |manager, group| async move {
            let verdict = is_empty_group(manager, &group).await;
            (group, verdict)
        })
        .await
    }
}

/// Deletes resource groups, one call per group
pub struct DeleteResourceGroup;

impl ActionType for DeleteResourceGroup {
    const SCHEMA: ParamSchema = ParamSchema::new("delete", &[]);

    fn build(_params: &Map<String, Value>) -> Result<Box<dyn Action>> {
        Ok(Box::new(Self))
    }
}

async fn delete_group(manager: &ResourceManager, group: &ResourceRecord) -> RecordStatus {
    let Some(name) = group_name(group) else {
        return RecordStatus::Failed(GovernanceError::InvalidRecord {
            operation: "delete".to_string(),
            reason: format!("resource group '{}' has no name", group.key()),
        });
    };

    tracing::info!(resource_group = %name, "Removing resource group");
    match manager.delete(&name).await {
        Ok(Deletion::Deleted) => RecordStatus::Succeeded,
        Ok(Deletion::AlreadyAbsent) => RecordStatus::AlreadySatisfied,
        Err(e) => {
            tracing::warn!(resource_group = %name, error = %e, "Failed to remove resource group");
            RecordStatus::Failed(e)
        }
    }
}

#[async_trait]
impl Action for DeleteResourceGroup {
    fn name(&self) -> &str {
        "delete"
    }

    async fn process(&self, manager: &ResourceManager, groups: &[ResourceRecord]) -> ActionResult {
        // Boxed up front so the stream is not generic over a borrowing closure
        let pending: Vec<BoxFuture<'_, (&str, RecordStatus)>> = groups
            .iter()
            .map(|group| async move { (group.key(), delete_group(manager, group).await) }.boxed())
            .collect();
        let statuses: Vec<_> = stream::iter(pending)
            .buffered(manager.settings().pool_size())
            .collect()
            .await;

        let mut result = ActionResult::new(self.name());
        for (id, status) in statuses {
            result.push(id, status);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_augment_stamps_type() {
        let mut record = ResourceRecord::from_raw(json!({"name": "rg-a"})).unwrap();
        DESCRIPTOR.augment(&mut record);
        assert_eq!(
            record.resource_type(),
            Some("Microsoft.Resources/subscriptions/resourceGroups")
        );
    }

    #[test]
    fn test_augment_overwrites_provider_type() {
        let mut record = ResourceRecord::from_raw(json!({
            "name": "rg-a",
            "type": "Microsoft.Resources/resourceGroups"
        }))
        .unwrap();
        let descriptor: &ResourceTypeDescriptor = &DESCRIPTOR;
        descriptor.augment(&mut record);
        descriptor.augment(&mut record);
        assert_eq!(
            record.resource_type(),
            Some("Microsoft.Resources/subscriptions/resourceGroups")
        );
    }

    #[test]
    fn test_group_name_falls_back_to_id() {
        let record = ResourceRecord::from_raw(json!({
            "id": "/subscriptions/0000/resourceGroups/rg-b"
        }))
        .unwrap();
        assert_eq!(group_name(&record).as_deref(), Some("rg-b"));
    }

    #[test]
    fn test_delete_schema_takes_no_params() {
        let mut params = Map::new();
        params.insert("force".into(), json!(true));
        assert!(DeleteResourceGroup::SCHEMA.validate(&params).is_err());
    }
}
