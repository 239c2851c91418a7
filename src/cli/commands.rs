use crate::cli::options::{Commands, OutputFormat, StackMigrateCli};
use crate::cli::output::{print_analysis, print_report, print_resources, print_snapshot};
use crate::config::MigrateConfig;
use crate::driver::MigrationDriver;
use crate::rpcapi::RpcApiPlugin;
use crate::snapshot::read_snapshot;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Dispatch a parsed command line.
pub async fn run_command(cli: &StackMigrateCli) -> Result<()> {
    let config = cli.load_config()?;

    match &cli.command {
        Commands::List { format, .. } => list_command(config, *format).await,
        Commands::Map { format, .. } => map_command(config, *format).await,
        Commands::Migrate { format, .. } => migrate_command(config, *format).await,
        Commands::Inspect { snapshot, format } => {
            inspect_command(&config, snapshot.clone(), *format).await
        }
    }
}

async fn list_command(config: MigrateConfig, format: OutputFormat) -> Result<()> {
    let driver = MigrationDriver::from_config(config);
    let resources = driver.list_resources().await?;
    print_resources(&resources, format)
}

async fn map_command(config: MigrateConfig, format: OutputFormat) -> Result<()> {
    info!(
        "Mapping workspace {} onto stack bundle {}",
        config.workspace_dir.display(),
        config.stack_bundle_dir.display()
    );
    let driver = MigrationDriver::from_config(config);
    let analysis = driver.analyze().await?;
    print_analysis(&analysis, format)
}

async fn migrate_command(config: MigrateConfig, format: OutputFormat) -> Result<()> {
    let driver = MigrationDriver::from_config(config);
    let analysis = driver.analyze().await?;

    let working_dir = driver
        .working_dir()
        .context("failed to resolve the working directory")?;
    let plugin = RpcApiPlugin::start(driver.terraform(), &working_dir)
        .await
        .context("failed to start terraform rpcapi")?;

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn(cancel_on_interrupt(cancel.clone()));

    let engine = plugin.engine();
    let result = driver.execute(&engine, &analysis, &cancel).await;

    interrupt.abort();
    plugin.stop().await;

    let report = result?;
    print_report(&report, format)
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("Interrupted, cancelling migration");
        cancel.cancel();
    }
}

async fn inspect_command(
    config: &MigrateConfig,
    snapshot: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let path = snapshot.unwrap_or_else(|| config.output_path());
    let state = read_snapshot(&path)
        .await
        .with_context(|| format!("failed to read stack state {}", path.display()))?;
    print_snapshot(&state, format)
}
