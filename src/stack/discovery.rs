use crate::error::{MigrateError, Result};
use crate::terraform::TerraformCli;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

/// File suffix of stack component configuration files.
pub const STACK_COMPONENT_FILE_SUFFIX: &str = ".tfcomponent.hcl";

fn ensure_bundle_dir(bundle_dir: &Path) -> Result<()> {
    if !bundle_dir.exists() {
        return Err(MigrateError::input(format!(
            "path {} does not exist",
            bundle_dir.display()
        )));
    }
    if !bundle_dir.is_dir() {
        return Err(MigrateError::input(format!(
            "path {} is not a directory",
            bundle_dir.display()
        )));
    }
    Ok(())
}

/// Component files directly inside `bundle_dir`, sorted by path.
pub fn find_stack_files(bundle_dir: &Path) -> Result<Vec<PathBuf>> {
    ensure_bundle_dir(bundle_dir)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(bundle_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            MigrateError::input(format!(
                "error while reading stack files from {}: {e}",
                bundle_dir.display()
            ))
        })?;

        let is_component_file = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(STACK_COMPONENT_FILE_SUFFIX));
        if entry.file_type().is_file() && is_component_file {
            files.push(entry.into_path());
        }
    }

    if files.is_empty() {
        return Err(MigrateError::config(format!(
            "no stack files found in the directory {}",
            bundle_dir.display()
        )));
    }

    files.sort();
    Ok(files)
}

/// Run `terraform stacks validate` against the bundle.
pub async fn validate_stack_bundle(terraform: &TerraformCli, bundle_dir: &Path) -> Result<()> {
    ensure_bundle_dir(bundle_dir)?;

    terraform
        .run(bundle_dir, &["stacks", "validate"])
        .await
        .map_err(|e| MigrateError::config(format!("failed to validate stacks: {e}")))?;

    info!("Stack configuration in {} is valid", bundle_dir.display());
    Ok(())
}
