use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix every module-scoped resource address starts with.
pub const MODULE_PREFIX: &str = "module.";

/// Prefix of a stack component address.
pub const COMPONENT_PREFIX: &str = "component.";

/// What the keys of an [`AddressMap`] name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingRegime {
    /// Keys are absolute resource addresses (workspace not fully modular).
    ResourceAddresses,
    /// Keys are top-level module names (workspace fully modular).
    ModuleNames,
}

/// Workspace address to stack address correspondence for one migration run.
///
/// Keys are either all resource addresses or all module names, as recorded by
/// [`MappingRegime`]. The map is built once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressMap {
    regime: MappingRegime,
    entries: BTreeMap<String, String>,
}

impl AddressMap {
    pub(crate) fn new(regime: MappingRegime, entries: BTreeMap<String, String>) -> Self {
        Self { regime, entries }
    }

    pub fn regime(&self) -> MappingRegime {
        self.regime
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries destined for the engine's absolute resource address slot.
    pub fn resource_addresses(&self) -> Option<&BTreeMap<String, String>> {
        match self.regime {
            MappingRegime::ResourceAddresses => Some(&self.entries),
            MappingRegime::ModuleNames => None,
        }
    }

    /// Entries destined for the engine's module address slot.
    pub fn module_names(&self) -> Option<&BTreeMap<String, String>> {
        match self.regime {
            MappingRegime::ModuleNames => Some(&self.entries),
            MappingRegime::ResourceAddresses => None,
        }
    }

    pub fn into_entries(self) -> BTreeMap<String, String> {
        self.entries
    }
}
