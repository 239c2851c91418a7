//! Component declarations read from stack configuration files.
//!
//! Files are parsed as full HCL; only top-level `component` blocks are
//! inspected; the first label of each is the component name.

use crate::error::{MigrateError, Result};
use crate::stack::components::ComponentExtractor;
use hcl::Body;
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

/// Block type that declares a stack component.
pub const COMPONENT_BLOCK: &str = "component";

#[derive(Debug, Error)]
pub enum ComponentParseError {
    #[error(transparent)]
    Syntax(#[from] hcl::Error),

    #[error("component block #{index} has no name label")]
    MissingLabel { index: usize },
}

/// Reads component names from `.tfcomponent.hcl` files.
#[derive(Debug, Default, Clone)]
pub struct HclComponentExtractor;

impl HclComponentExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ComponentExtractor for HclComponentExtractor {
    fn extract_components(&self, path: &Path) -> Result<BTreeSet<String>> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            MigrateError::config(format!("failed to read stack file {}: {e}", path.display()))
        })?;

        let labels = parse_component_labels(&source).map_err(|e| {
            MigrateError::config(format!("failed to parse HCL file {}: {e}", path.display()))
        })?;

        Ok(labels.into_iter().collect())
    }
}

/// Names of every top-level `component` block, in source order.
pub fn parse_component_labels(source: &str) -> std::result::Result<Vec<String>, ComponentParseError> {
    let body: Body = hcl::parse(source)?;

    body.blocks()
        .filter(|block| block.identifier.as_str() == COMPONENT_BLOCK)
        .enumerate()
        .map(|(index, block)| {
            block
                .labels
                .first()
                .map(|label| label.as_str().to_string())
                .ok_or(ComponentParseError::MissingLabel { index: index + 1 })
        })
        .collect()
}
