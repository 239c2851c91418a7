use crate::error::{MigrateError, Result};
use crate::migration::DuplicateKeyPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_OUTPUT_FILE_NAME: &str = "stack_state.tfstackstate";

/// Settings for one workspace-to-stack migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateConfig {
    /// Terraform configuration directory of the workspace.
    pub workspace_dir: PathBuf,
    /// Raw workspace state; defaults to `<workspace_dir>/terraform.tfstate`.
    pub state_file: Option<PathBuf>,
    /// Generated stack configuration directory.
    pub stack_bundle_dir: PathBuf,
    pub output_dir: PathBuf,
    pub output_file_name: String,
    pub terraform_binary: PathBuf,
    /// Run `terraform stacks validate` before reading components.
    pub validate_stack: bool,
    pub duplicate_keys: DuplicateKeyPolicy,
    pub stream_timeout_secs: Option<u64>,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::from("."),
            state_file: None,
            stack_bundle_dir: PathBuf::from("_stacks_generated"),
            output_dir: PathBuf::from("stack_state"),
            output_file_name: DEFAULT_OUTPUT_FILE_NAME.to_string(),
            terraform_binary: PathBuf::from("terraform"),
            validate_stack: false,
            duplicate_keys: DuplicateKeyPolicy::Overwrite,
            stream_timeout_secs: None,
        }
    }
}

impl MigrateConfig {
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| MigrateError::input(format!("invalid configuration: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrateError::input(format!(
                "failed to read configuration {}: {e}",
                path.display()
            ))
        })?;
        Self::from_yaml(&content)
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| self.workspace_dir.join("terraform.tfstate"))
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_file_name)
    }

    pub fn stream_timeout(&self) -> Option<Duration> {
        self.stream_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.output_file_name.trim().is_empty() {
            return Err(MigrateError::input("output_file_name must not be empty"));
        }
        if self.stream_timeout_secs == Some(0) {
            return Err(MigrateError::input("stream_timeout_secs must be positive"));
        }
        Ok(())
    }
}
