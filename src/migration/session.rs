//! Engine handles scoped to one migration run.

use crate::error::{EnginePhase, HandleKind, MigrateError, ProtocolError, Result};
use crate::migration::engine::{EventStream, Handle, MigrateRequest, MigrationEngine};
use crate::migration::paths::SessionPaths;
use crate::types::AddressMap;
use tracing::{debug, info, warn};

/// Handles held open against the migration engine for one run.
///
/// Handles are acquired in a fixed order and released in reverse order by
/// [`MigrationSession::close`]. If any acquisition fails, everything acquired
/// so far is released before the error is returned.
pub struct MigrationSession<'e, E: MigrationEngine + ?Sized> {
    engine: &'e E,
    acquired: Vec<(HandleKind, Handle)>,
}

impl<'e, E: MigrationEngine + ?Sized> MigrationSession<'e, E> {
    pub async fn open(engine: &'e E, raw_state: &[u8], paths: &SessionPaths) -> Result<Self> {
        let mut session = Self {
            engine,
            acquired: Vec::with_capacity(5),
        };

        if let Err(e) = session.acquire_all(raw_state, paths).await {
            if let Err(release_err) = session.close().await {
                warn!("Release after failed session setup also failed: {}", release_err);
            }
            return Err(e);
        }

        info!(
            "Opened migration session with {} handles",
            session.acquired.len()
        );
        Ok(session)
    }

    async fn acquire_all(&mut self, raw_state: &[u8], paths: &SessionPaths) -> Result<()> {
        let engine = self.engine;

        let state = engine.open_state(raw_state).await;
        self.record(HandleKind::State, state)?;

        let bundle = engine.open_config_bundle(&paths.module_cache_dir).await;
        let bundle = self.record(HandleKind::ConfigBundle, bundle)?;

        let stack_config = engine.open_stack_config(bundle, &paths.stack_config).await;
        self.record(HandleKind::StackConfig, stack_config)?;

        let lock_file = engine.open_lock_file(bundle, &paths.lock_file).await;
        self.record(HandleKind::LockFile, lock_file)?;

        let provider_cache = engine.open_provider_cache(&paths.provider_cache_dir).await;
        self.record(HandleKind::ProviderCache, provider_cache)?;

        Ok(())
    }

    fn record(&mut self, kind: HandleKind, opened: anyhow::Result<Handle>) -> Result<Handle> {
        let handle = opened.map_err(|e| MigrateError::engine(kind.open_phase(), format!("{e:#}")))?;
        debug!("Acquired {} handle {}", kind, handle);
        self.acquired.push((kind, handle));
        Ok(handle)
    }

    pub fn handle(&self, kind: HandleKind) -> Option<Handle> {
        self.acquired
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, handle)| *handle)
    }

    fn require(&self, kind: HandleKind) -> Result<Handle> {
        self.handle(kind).ok_or_else(|| {
            MigrateError::engine(EnginePhase::Migrate, format!("no {kind} handle is open"))
        })
    }

    /// Start the migration for `address_map` using this session's handles.
    pub async fn migrate(&self, address_map: &AddressMap) -> Result<EventStream> {
        let request = MigrateRequest::new(
            self.require(HandleKind::State)?,
            self.require(HandleKind::StackConfig)?,
            self.require(HandleKind::LockFile)?,
            self.require(HandleKind::ProviderCache)?,
            address_map,
        );

        self.engine
            .migrate(request)
            .await
            .map_err(|e| MigrateError::engine(EnginePhase::Migrate, format!("{e:#}")))
    }

    /// Release every handle in reverse acquisition order.
    ///
    /// All releases are attempted; the first failure is returned.
    pub async fn close(mut self) -> Result<()> {
        let mut first_failure = None;

        while let Some((kind, handle)) = self.acquired.pop() {
            match self.engine.release(kind, handle).await {
                Ok(()) => debug!("Released {} handle {}", kind, handle),
                Err(e) => {
                    warn!("Failed to release {} handle {}: {:#}", kind, handle, e);
                    if first_failure.is_none() {
                        first_failure = Some(ProtocolError::ReleaseFailed {
                            handle: kind,
                            reason: format!("{e:#}"),
                        });
                    }
                }
            }
        }

        match first_failure {
            Some(failure) => Err(failure.into()),
            None => Ok(()),
        }
    }
}

impl<E: MigrationEngine + ?Sized> Drop for MigrationSession<'_, E> {
    fn drop(&mut self) {
        if !self.acquired.is_empty() {
            warn!(
                "Migration session dropped with {} handles still open",
                self.acquired.len()
            );
        }
    }
}
