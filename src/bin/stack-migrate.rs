use anyhow::Result;
use clap::Parser;
use stack_migrate::cli::{run_command, StackMigrateCli};
use tracing::{debug, error};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = StackMigrateCli::parse();

    let level = match cli.verbosity {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    debug!("Starting stack-migrate v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run_command(&cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
