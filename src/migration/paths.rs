use crate::error::{MigrateError, Result};
use std::path::{Component, Path, PathBuf};

/// Directory holding the stack bundle's installed module sources.
pub const MODULE_CACHE_SUBDIR: &str = ".terraform/modules";

/// Directory holding the workspace's installed providers.
pub const PROVIDER_CACHE_SUBDIR: &str = ".terraform/providers";

/// Dependency lock file name inside the workspace directory.
pub const LOCK_FILE_NAME: &str = ".terraform.lock.hcl";

/// Filesystem locations the migration engine needs for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    pub module_cache_dir: PathBuf,
    pub provider_cache_dir: PathBuf,
    /// Stack configuration directory, relative to the working directory.
    pub stack_config: String,
    /// Dependency lock file, relative to the working directory.
    pub lock_file: String,
}

impl SessionPaths {
    /// Lay out the session's paths. Cache directories are absolute; the
    /// stack configuration and lock file are relative to `working_dir`
    /// because the engine resolves them inside its source bundle.
    pub fn resolve(working_dir: &Path, workspace_dir: &Path, stack_bundle_dir: &Path) -> Result<Self> {
        let workspace_dir = absolutize(working_dir, workspace_dir);
        let stack_bundle_dir = absolutize(working_dir, stack_bundle_dir);

        Ok(Self {
            module_cache_dir: stack_bundle_dir.join(MODULE_CACHE_SUBDIR),
            provider_cache_dir: workspace_dir.join(PROVIDER_CACHE_SUBDIR),
            stack_config: engine_relative_path(working_dir, &stack_bundle_dir)?,
            lock_file: engine_relative_path(working_dir, &workspace_dir.join(LOCK_FILE_NAME))?,
        })
    }
}

fn absolutize(working_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_dir.join(path)
    }
}

/// Path of `target` relative to `base`, both absolute and lexically normal.
pub fn relative_path(base: &Path, target: &Path) -> Option<PathBuf> {
    if !base.is_absolute() || !target.is_absolute() {
        return None;
    }

    let base = normalize(base);
    let target = normalize(target);
    let base: Vec<Component> = base.components().collect();
    let target: Vec<Component> = target.components().collect();

    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base.len() {
        relative.push("..");
    }
    for component in &target[common..] {
        relative.push(component.as_os_str());
    }

    if relative.as_os_str().is_empty() {
        relative.push(".");
    }
    Some(relative)
}

fn normalize(path: &Path) -> PathBuf {
    let mut normal = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normal.pop();
            }
            other => normal.push(other.as_os_str()),
        }
    }
    normal
}

/// Relative path in the form the engine expects: `./` prefixed unless it
/// already climbs out with `../`, and `.` spelled `./`.
pub fn engine_relative_path(working_dir: &Path, target: &Path) -> Result<String> {
    let relative = relative_path(working_dir, target).ok_or_else(|| {
        MigrateError::input(format!(
            "cannot express {} relative to {}",
            target.display(),
            working_dir.display()
        ))
    })?;

    let relative = relative.to_string_lossy().replace('\\', "/");
    Ok(if relative == "." {
        "./".to_string()
    } else if relative.starts_with("../") || relative == ".." {
        relative
    } else {
        format!("./{relative}")
    })
}
