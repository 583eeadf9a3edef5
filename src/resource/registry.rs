//! Resource Registry - resolve resource kinds, filters and actions by name
//!
//! Each resource kind owns two name → constructor maps, one for filters and
//! one for actions. Registration happens before any policy runs; resolution
//! is deterministic and side-effect free.

use super::action::Action;
use super::descriptor::ResourceTypeDescriptor;
use super::filter::Filter;
use super::resourcegroup::ResourceGroup;
use super::schema::ParamSchema;
use super::value::ValueFilter;
use crate::error::{GovernanceError, Result};
use serde_json::{Map, Value};
use std::any::TypeId;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Builds a filter from validated parameters
pub type FilterConstructor = fn(&Map<String, Value>) -> Result<Filter>;

/// Builds an action from validated parameters
pub type ActionConstructor = fn(&Map<String, Value>) -> Result<Box<dyn Action>>;

/// Provider prefix accepted in front of resource kind names
const PROVIDER_PREFIX: &str = "azure.";

/// A filter implementation that can be registered by type
pub trait FilterType: 'static {
    const SCHEMA: ParamSchema;

    /// Problems `SCHEMA` cannot express, such as one parameter depending on another
    fn check(_params: &Map<String, Value>) -> Vec<String> {
        Vec::new()
    }

    /// Build from parameters already checked against `SCHEMA` and `check`
    fn build(params: &Map<String, Value>) -> Result<Filter>;
}

/// An action implementation that can be registered by type
pub trait ActionType: 'static {
    const SCHEMA: ParamSchema;

    fn check(_params: &Map<String, Value>) -> Vec<String> {
        Vec::new()
    }

    /// Build from parameters already checked against `SCHEMA` and `check`
    fn build(params: &Map<String, Value>) -> Result<Box<dyn Action>>;
}

/// A resource kind that can be registered by type
pub trait ResourceType: 'static {
    const DESCRIPTOR: &'static ResourceTypeDescriptor;

    /// Register the kind's own filters and actions
    fn install(definition: &mut ResourceDefinition) -> Result<()>;
}

/// Schema and type-specific issues are reported together in one error
fn construct_filter<F: FilterType>(params: &Map<String, Value>) -> Result<Filter> {
    let mut issues = F::SCHEMA.issues(params);
    issues.extend(F::check(params));
    F::SCHEMA.reject(issues)?;
    F::build(params)
}

fn construct_action<A: ActionType>(params: &Map<String, Value>) -> Result<Box<dyn Action>> {
    let mut issues = A::SCHEMA.issues(params);
    issues.extend(A::check(params));
    A::SCHEMA.reject(issues)?;
    A::build(params)
}

struct Entry<T> {
    implementation: TypeId,
    value: T,
}

/// Name → implementation map with duplicate detection
pub struct Registry<T> {
    label: &'static str,
    entries: BTreeMap<String, Entry<T>>,
}

impl<T> Registry<T> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            entries: BTreeMap::new(),
        }
    }

    /// Bind `name`; re-binding the same implementation is a no-op
    pub fn register(&mut self, name: &str, implementation: TypeId, value: T) -> Result<()> {
        match self.entries.get(name) {
            Some(existing) if existing.implementation == implementation => Ok(()),
            Some(_) => Err(GovernanceError::DuplicateRegistration {
                registry: self.label.to_string(),
                name: name.to_string(),
            }),
            None => {
                self.entries.insert(
                    name.to_string(),
                    Entry {
                        implementation,
                        value,
                    },
                );
                Ok(())
            }
        }
    }

    pub fn resolve(&self, name: &str) -> Result<&T> {
        self.entries
            .get(name)
            .map(|entry| &entry.value)
            .ok_or_else(|| self.unknown(name))
    }

    pub fn resolve_mut(&mut self, name: &str) -> Result<&mut T> {
        let label = self.label;
        self.entries
            .get_mut(name)
            .map(|entry| &mut entry.value)
            .ok_or_else(|| GovernanceError::UnknownName {
                registry: label.to_string(),
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    fn unknown(&self, name: &str) -> GovernanceError {
        GovernanceError::UnknownName {
            registry: self.label.to_string(),
            name: name.to_string(),
        }
    }
}

impl Registry<FilterConstructor> {
    pub fn register_filter<F: FilterType>(&mut self, name: &str) -> Result<()> {
        self.register(name, TypeId::of::<F>(), construct_filter::<F>)
    }

    /// Resolve `name` and build it from `params`
    pub fn build(&self, name: &str, params: &Map<String, Value>) -> Result<Filter> {
        (self.resolve(name)?)(params)
    }
}

impl Registry<ActionConstructor> {
    pub fn register_action<A: ActionType>(&mut self, name: &str) -> Result<()> {
        self.register(name, TypeId::of::<A>(), construct_action::<A>)
    }

    /// Resolve `name` and build it from `params`
    pub fn build(&self, name: &str, params: &Map<String, Value>) -> Result<Box<dyn Action>> {
        (self.resolve(name)?)(params)
    }
}

/// Everything known about one resource kind
pub struct ResourceDefinition {
    pub descriptor: &'static ResourceTypeDescriptor,
    pub filters: Registry<FilterConstructor>,
    pub actions: Registry<ActionConstructor>,
}

impl ResourceDefinition {
    /// A definition carrying the filters every kind supports
    pub fn new(descriptor: &'static ResourceTypeDescriptor) -> Result<Self> {
        let mut definition = Self {
            descriptor,
            filters: Registry::new("filter"),
            actions: Registry::new("action"),
        };
        definition.filters.register_filter::<ValueFilter>("value")?;
        Ok(definition)
    }
}

/// Registry of resource kinds
pub struct ResourceRegistry {
    kinds: Registry<ResourceDefinition>,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            kinds: Registry::new("resource"),
        }
    }

    /// A registry with every built-in kind
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::new();
        registry.register_kind::<ResourceGroup>("resourcegroup")?;
        Ok(registry)
    }

    /// Register a kind with its own filters and actions
    pub fn register_kind<K: ResourceType>(&mut self, name: &str) -> Result<()> {
        let mut definition = ResourceDefinition::new(K::DESCRIPTOR)?;
        K::install(&mut definition)?;
        self.kinds.register(name, TypeId::of::<K>(), definition)
    }

    /// Resolve a kind; `azure.resourcegroup` and `resourcegroup` are equivalent
    pub fn resolve(&self, name: &str) -> Result<&ResourceDefinition> {
        self.kinds.resolve(strip_provider(name))
    }

    /// Mutable access, for registering extra filters or actions on a kind
    pub fn resolve_mut(&mut self, name: &str) -> Result<&mut ResourceDefinition> {
        self.kinds.resolve_mut(strip_provider(name))
    }

    /// Registered kind names, sorted
    pub fn kind_names(&self) -> Vec<&str> {
        self.kinds.names()
    }
}

fn strip_provider(name: &str) -> &str {
    name.strip_prefix(PROVIDER_PREFIX).unwrap_or(name)
}

/// Process-wide registry with the built-in kinds
static REGISTRY: OnceLock<ResourceRegistry> = OnceLock::new();

/// Get the process-wide registry (built on first access)
pub fn get_registry() -> &'static ResourceRegistry {
    REGISTRY.get_or_init(|| {
        ResourceRegistry::with_builtins()
            .unwrap_or_else(|e| panic!("Failed to register built-in resources: {}", e))
    })
}
