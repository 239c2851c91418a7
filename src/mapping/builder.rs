//! Workspace to stack address reconciliation.
//!
//! A workspace that is not fully modular has no structure to split across
//! components, so every resource goes to the single declared component. A
//! fully modular workspace maps each top-level module to the component of the
//! same name; addresses below the module boundary are left to the engine.

use crate::error::{MigrateError, Result};
use crate::types::{AddressMap, MappingRegime, COMPONENT_PREFIX};
use crate::workspace::top_level_modules;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Build the address map for `resources` given the classifier verdict.
///
/// All preconditions are checked before any entry is produced.
pub fn build_address_map(
    resources: &[String],
    components: &BTreeSet<String>,
    fully_modular: bool,
) -> Result<AddressMap> {
    if resources.is_empty() {
        return Err(MigrateError::input("no resource addresses to map"));
    }

    if fully_modular {
        let modules = top_level_modules(resources)?;
        map_modules(&modules, components)
    } else {
        map_resources(resources, components)
    }
}

/// Every resource address to `component.<name>` of the one declared component.
pub fn map_resources(resources: &[String], components: &BTreeSet<String>) -> Result<AddressMap> {
    let component = match (components.len(), components.iter().next()) {
        (1, Some(component)) => component,
        (found, _) => return Err(MigrateError::AmbiguousComponent { found }),
    };

    let stack_address = format!("{COMPONENT_PREFIX}{component}");
    let entries: BTreeMap<String, String> = resources
        .iter()
        .map(|resource| (resource.clone(), stack_address.clone()))
        .collect();

    debug!(
        "Mapped {} resources to {}",
        entries.len(),
        stack_address
    );
    Ok(AddressMap::new(MappingRegime::ResourceAddresses, entries))
}

/// Identity map over module names, which must equal the component names.
pub fn map_modules(
    modules: &BTreeSet<String>,
    components: &BTreeSet<String>,
) -> Result<AddressMap> {
    if modules.symmetric_difference(components).next().is_some() {
        return Err(MigrateError::AddressMismatch {
            modules: modules.clone(),
            components: components.clone(),
        });
    }

    let entries: BTreeMap<String, String> = modules
        .iter()
        .map(|module| (module.clone(), module.clone()))
        .collect();

    debug!("Mapped {} top-level modules to components", entries.len());
    Ok(AddressMap::new(MappingRegime::ModuleNames, entries))
}
