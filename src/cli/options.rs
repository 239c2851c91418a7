use crate::config::MigrateConfig;
use crate::error::Result;
use crate::migration::DuplicateKeyPolicy;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Workspace-to-stack state migration helper
#[derive(Parser)]
#[command(name = "stack-migrate")]
#[command(about = "Prepare Terraform workspace state for migration into a stack")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct StackMigrateCli {
    #[command(subcommand)]
    pub command: Commands,

    /// YAML configuration file; flags override its values
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the resource addresses in the workspace state
    List {
        #[command(flatten)]
        paths: PathOptions,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Classify the workspace and print the address map it would migrate with
    Map {
        #[command(flatten)]
        paths: PathOptions,

        /// Run `terraform stacks validate` on the stack bundle first
        #[arg(long)]
        validate: bool,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Migrate the workspace state through `terraform rpcapi` and write the
    /// stack state snapshot
    Migrate {
        #[command(flatten)]
        paths: PathOptions,

        /// Workspace state file (defaults to terraform.tfstate in the
        /// workspace directory)
        #[arg(long)]
        state_file: Option<PathBuf>,

        /// Directory the snapshot is written to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Give up on the event stream after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Run `terraform stacks validate` on the stack bundle first
        #[arg(long)]
        validate: bool,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the contents of a persisted stack state snapshot
    Inspect {
        /// Snapshot file (defaults to the configured output path)
        snapshot: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct PathOptions {
    /// Terraform workspace configuration directory
    #[arg(short, long)]
    pub workspace_dir: Option<PathBuf>,

    /// Generated stack configuration directory
    #[arg(short, long)]
    pub stack_bundle_dir: Option<PathBuf>,

    /// Terraform executable
    #[arg(long)]
    pub terraform: Option<PathBuf>,

    /// How repeated snapshot keys are handled
    #[arg(long, value_enum)]
    pub duplicate_keys: Option<DuplicateKeyPolicy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl StackMigrateCli {
    /// Configuration from `--config` (or defaults) with command-line
    /// overrides applied.
    pub fn load_config(&self) -> Result<MigrateConfig> {
        let mut config = match &self.config {
            Some(path) => MigrateConfig::from_file(path)?,
            None => MigrateConfig::default(),
        };

        match &self.command {
            Commands::List { paths, .. } => paths.apply(&mut config),
            Commands::Map {
                paths, validate, ..
            } => {
                paths.apply(&mut config);
                config.validate_stack |= *validate;
            }
            Commands::Migrate {
                paths,
                state_file,
                output_dir,
                timeout,
                validate,
                ..
            } => {
                paths.apply(&mut config);
                if let Some(file) = state_file {
                    config.state_file = Some(file.clone());
                }
                if let Some(dir) = output_dir {
                    config.output_dir = dir.clone();
                }
                if timeout.is_some() {
                    config.stream_timeout_secs = *timeout;
                }
                config.validate_stack |= *validate;
            }
            Commands::Inspect { .. } => {}
        }

        config.validate()?;
        Ok(config)
    }
}

impl PathOptions {
    pub fn apply(&self, config: &mut MigrateConfig) {
        if let Some(dir) = &self.workspace_dir {
            config.workspace_dir = dir.clone();
        }
        if let Some(dir) = &self.stack_bundle_dir {
            config.stack_bundle_dir = dir.clone();
        }
        if let Some(binary) = &self.terraform {
            config.terraform_binary = binary.clone();
        }
        if let Some(policy) = self.duplicate_keys {
            config.duplicate_keys = policy;
        }
    }
}
