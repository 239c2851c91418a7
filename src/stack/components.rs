//! Collecting component names across a stack bundle.

use crate::error::{MigrateError, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Parses one stack configuration file and returns the component names it
/// declares. A file declaring nothing yields an empty set.
pub trait ComponentExtractor: Send + Sync {
    fn extract_components(&self, path: &Path) -> Result<BTreeSet<String>>;
}

/// Union of the components declared across `paths`.
///
/// Fails on the first file that cannot be parsed, and when no file declares
/// any component at all.
pub fn aggregate_components<E>(extractor: &E, paths: &[PathBuf]) -> Result<BTreeSet<String>>
where
    E: ComponentExtractor + ?Sized,
{
    let mut components = BTreeSet::new();

    for path in paths {
        let declared = extractor.extract_components(path)?;
        debug!(
            "Found {} components in {}: {:?}",
            declared.len(),
            path.display(),
            declared
        );
        components.extend(declared);
    }

    if components.is_empty() {
        return Err(MigrateError::config("no components found in the stack files"));
    }

    Ok(components)
}
