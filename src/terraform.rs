//! Thin wrapper around the `terraform` executable.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Variables that change Terraform's output or config lookup and must not
/// leak into child invocations.
const SCRUBBED_ENV: [&str; 2] = ["TF_LOG", "TF_CLI_CONFIG_FILE"];

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to start {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", nonzero_exit_message(*.status, .stderr))]
    NonZeroExit { status: Option<i32>, stderr: String },
}

fn nonzero_exit_message(status: Option<i32>, stderr: &str) -> String {
    match (stderr.is_empty(), status) {
        (false, _) => stderr.to_string(),
        (true, Some(code)) => format!("exited with status {code}"),
        (true, None) => "terminated by signal".to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct TerraformCli {
    binary: PathBuf,
}

impl TerraformCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// `terraform <args>` in `dir` with the scrubbed environment. The child
    /// is killed if the handle is dropped.
    pub fn command(&self, dir: &Path, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).current_dir(dir).kill_on_drop(true);
        for var in SCRUBBED_ENV {
            cmd.env_remove(var);
        }
        cmd
    }

    pub(crate) fn spawn_error(&self, source: std::io::Error) -> CommandError {
        CommandError::Spawn {
            binary: self.binary.display().to_string(),
            source,
        }
    }

    /// Run `terraform <args>` in `dir` and return stdout.
    pub async fn run(&self, dir: &Path, args: &[&str]) -> Result<String, CommandError> {
        debug!(
            "Running {} {} in {}",
            self.binary.display(),
            args.join(" "),
            dir.display()
        );

        let output = self
            .command(dir, args)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(CommandError::NonZeroExit {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Default for TerraformCli {
    fn default() -> Self {
        Self::new("terraform")
    }
}
