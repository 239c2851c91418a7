//! End-to-end migration pipeline.
//!
//! Each step is tagged with the [`Phase`] it belongs to so the first failure
//! can be reported with where it happened.

use crate::config::MigrateConfig;
use crate::error::{MigrateError, Phase, RunError};
use crate::mapping::build_address_map;
use crate::migration::{EventAggregator, MigrationEngine, MigrationSession, SessionPaths};
use crate::snapshot::write_snapshot;
use crate::stack::{
    aggregate_components, find_stack_files, validate_stack_bundle, ComponentExtractor,
    HclComponentExtractor,
};
use crate::terraform::TerraformCli;
use crate::types::{AddressMap, MappingRegime, StackState};
use crate::workspace::{is_fully_modular, ResourceLister, TerraformStateLister};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

type RunResult<T> = std::result::Result<T, RunError>;

fn in_phase(phase: Phase) -> impl Fn(MigrateError) -> RunError {
    move |source| RunError::new(phase, source)
}

/// Everything learned about the workspace before the engine is involved.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceAnalysis {
    pub resources: Vec<String>,
    pub fully_modular: bool,
    pub components: BTreeSet<String>,
    pub address_map: AddressMap,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub output_path: PathBuf,
    pub regime: MappingRegime,
    pub mapped_addresses: usize,
    pub raw_entries: usize,
    pub descriptions: usize,
}

/// Runs the pipeline phases in order: listing, classification, mapping,
/// session setup, streaming and persisting.
///
/// The lister and component extractor are injected so the pipeline can run
/// without a `terraform` binary.
pub struct MigrationDriver<L, C> {
    config: MigrateConfig,
    lister: L,
    extractor: C,
    terraform: TerraformCli,
    working_dir: Option<PathBuf>,
}

impl MigrationDriver<TerraformStateLister, HclComponentExtractor> {
    /// Driver backed by the local `terraform` binary and the HCL parser.
    pub fn from_config(config: MigrateConfig) -> Self {
        let terraform = TerraformCli::new(config.terraform_binary.clone());
        let lister = TerraformStateLister::new(terraform.clone());
        Self::with_terraform(config, terraform, lister, HclComponentExtractor::new())
    }
}

impl<L, C> MigrationDriver<L, C>
where
    L: ResourceLister,
    C: ComponentExtractor,
{
    pub fn new(config: MigrateConfig, lister: L, extractor: C) -> Self {
        let terraform = TerraformCli::new(config.terraform_binary.clone());
        Self::with_terraform(config, terraform, lister, extractor)
    }

    /// Like [`new`](Self::new) but reusing an existing `terraform` wrapper.
    pub fn with_terraform(
        config: MigrateConfig,
        terraform: TerraformCli,
        lister: L,
        extractor: C,
    ) -> Self {
        Self {
            config,
            lister,
            extractor,
            terraform,
            working_dir: None,
        }
    }

    /// Directory engine-relative paths are computed from. Defaults to the
    /// process working directory.
    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(working_dir.into());
        self
    }

    pub fn config(&self) -> &MigrateConfig {
        &self.config
    }

    pub fn terraform(&self) -> &TerraformCli {
        &self.terraform
    }

    /// Directory engine-relative paths are resolved against.
    pub fn working_dir(&self) -> std::io::Result<PathBuf> {
        match &self.working_dir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir(),
        }
    }

    pub async fn list_resources(&self) -> RunResult<Vec<String>> {
        self.lister
            .list_resources(&self.config.workspace_dir)
            .await
            .map_err(in_phase(Phase::Listing))
    }

    /// List, classify and map the workspace.
    pub async fn analyze(&self) -> RunResult<WorkspaceAnalysis> {
        self.config.validate().map_err(in_phase(Phase::Listing))?;

        let resources = self.list_resources().await?;

        let fully_modular = is_fully_modular(&resources).map_err(in_phase(Phase::Classification))?;
        info!(
            "Workspace state is {}fully modular ({} resources)",
            if fully_modular { "" } else { "not " },
            resources.len()
        );

        let components = self.discover_components().await.map_err(in_phase(Phase::Mapping))?;
        let address_map = build_address_map(&resources, &components, fully_modular)
            .map_err(in_phase(Phase::Mapping))?;
        info!(
            "Built address map with {} entries for components {:?}",
            address_map.len(),
            components
        );

        Ok(WorkspaceAnalysis {
            resources,
            fully_modular,
            components,
            address_map,
        })
    }

    async fn discover_components(&self) -> crate::error::Result<BTreeSet<String>> {
        let bundle_dir = &self.config.stack_bundle_dir;
        if self.config.validate_stack {
            validate_stack_bundle(&self.terraform, bundle_dir).await?;
        }

        let stack_files = find_stack_files(bundle_dir)?;
        aggregate_components(&self.extractor, &stack_files)
    }

    /// Drive the engine through `analysis` and fold its events into a
    /// snapshot. Session handles are released on every path out.
    pub async fn migrate<E>(
        &self,
        engine: &E,
        analysis: &WorkspaceAnalysis,
        cancel: &CancellationToken,
    ) -> RunResult<StackState>
    where
        E: MigrationEngine + ?Sized,
    {
        let setup = in_phase(Phase::SessionSetup);

        let state_file = self.config.state_file();
        let raw_state = tokio::fs::read(&state_file).await.map_err(|e| {
            setup(MigrateError::input(format!(
                "failed to read workspace state {}: {e}",
                state_file.display()
            )))
        })?;

        let working_dir = self.working_dir().map_err(|e| setup(e.into()))?;
        let paths = SessionPaths::resolve(
            &working_dir,
            &self.config.workspace_dir,
            &self.config.stack_bundle_dir,
        )
        .map_err(&setup)?;

        let session = MigrationSession::open(engine, &raw_state, &paths)
            .await
            .map_err(&setup)?;

        let streamed = self.stream(&session, &analysis.address_map, cancel).await;
        let released = session.close().await;

        match (streamed, released) {
            (Ok(snapshot), Ok(())) => Ok(snapshot),
            (Ok(_), Err(release_err)) => Err(RunError::new(Phase::Streaming, release_err)),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_err)) => {
                warn!("Session release failed after streaming error: {}", release_err);
                Err(e)
            }
        }
    }

    async fn stream<E>(
        &self,
        session: &MigrationSession<'_, E>,
        address_map: &AddressMap,
        cancel: &CancellationToken,
    ) -> RunResult<StackState>
    where
        E: MigrationEngine + ?Sized,
    {
        let streaming = in_phase(Phase::Streaming);
        let events = session.migrate(address_map).await.map_err(&streaming)?;
        let aggregator = EventAggregator::new(self.config.duplicate_keys);

        let drained = match self.config.stream_timeout() {
            Some(limit) => {
                match tokio::time::timeout(limit, aggregator.drain(events, cancel)).await {
                    Ok(result) => result,
                    Err(_) => Err(MigrateError::Cancelled {
                        reason: format!("event stream timed out after {}s", limit.as_secs()),
                    }),
                }
            }
            None => aggregator.drain(events, cancel).await,
        };

        drained.map_err(streaming)
    }

    /// Full run: analyze, migrate, and persist the snapshot.
    pub async fn run<E>(&self, engine: &E, cancel: &CancellationToken) -> RunResult<MigrationReport>
    where
        E: MigrationEngine + ?Sized,
    {
        let analysis = self.analyze().await?;
        self.execute(engine, &analysis, cancel).await
    }

    /// Migrate an already analyzed workspace and persist the snapshot.
    pub async fn execute<E>(
        &self,
        engine: &E,
        analysis: &WorkspaceAnalysis,
        cancel: &CancellationToken,
    ) -> RunResult<MigrationReport>
    where
        E: MigrationEngine + ?Sized,
    {
        let snapshot = self.migrate(engine, analysis, cancel).await?;

        let output_path = self.config.output_path();
        write_snapshot(&output_path, &snapshot)
            .await
            .map_err(in_phase(Phase::Persisting))?;

        info!("Migration completed successfully");
        Ok(MigrationReport {
            output_path,
            regime: analysis.address_map.regime(),
            mapped_addresses: analysis.address_map.len(),
            raw_entries: snapshot.raw.len(),
            descriptions: snapshot.descriptions.len(),
        })
    }
}
