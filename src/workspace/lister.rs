use crate::error::{MigrateError, Result};
use crate::terraform::TerraformCli;
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

/// Source of the resource addresses recorded in a workspace's state.
#[async_trait]
pub trait ResourceLister: Send + Sync {
    /// All resource addresses for the workspace at `location`.
    ///
    /// Never returns an empty list: an empty state is an error.
    async fn list_resources(&self, location: &Path) -> Result<Vec<String>>;
}

/// Lists resources with `terraform state list`.
pub struct TerraformStateLister {
    terraform: TerraformCli,
}

impl TerraformStateLister {
    pub fn new(terraform: TerraformCli) -> Self {
        Self { terraform }
    }

    /// The wrapper `terraform state list` runs through.
    pub fn terraform(&self) -> &TerraformCli {
        &self.terraform
    }
}

#[async_trait]
impl ResourceLister for TerraformStateLister {
    async fn list_resources(&self, location: &Path) -> Result<Vec<String>> {
        if !location.is_dir() {
            return Err(MigrateError::input(format!(
                "workspace directory {} does not exist",
                location.display()
            )));
        }

        let stdout = self
            .terraform
            .run(location, &["state", "list"])
            .await
            .map_err(|e| MigrateError::input(format!("failed to run terraform state list: {e}")))?;

        let resources = parse_state_list(&stdout)?;
        info!(
            "Found {} resources in workspace state at {}",
            resources.len(),
            location.display()
        );
        Ok(resources)
    }
}

/// Split `terraform state list` output into addresses, one per line.
pub fn parse_state_list(output: &str) -> Result<Vec<String>> {
    let resources: Vec<String> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if resources.is_empty() {
        return Err(MigrateError::input("no resources found in the Terraform state"));
    }

    Ok(resources)
}
