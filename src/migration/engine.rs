use crate::error::HandleKind;
use crate::types::{AddressMap, StreamFrame};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::pin::Pin;

/// Opaque reference to an object held open by the migration engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub i64);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Arguments of a single `migrate` call.
///
/// Exactly one of the two address maps is set, matching the regime the
/// address map was built under.
#[derive(Debug, Clone)]
pub struct MigrateRequest<'a> {
    pub state: Handle,
    pub stack_config: Handle,
    pub dependency_locks: Handle,
    pub provider_cache: Handle,
    pub resource_address_map: Option<&'a BTreeMap<String, String>>,
    pub module_address_map: Option<&'a BTreeMap<String, String>>,
}

impl<'a> MigrateRequest<'a> {
    pub fn new(
        state: Handle,
        stack_config: Handle,
        dependency_locks: Handle,
        provider_cache: Handle,
        address_map: &'a AddressMap,
    ) -> Self {
        Self {
            state,
            stack_config,
            dependency_locks,
            provider_cache,
            resource_address_map: address_map.resource_addresses(),
            module_address_map: address_map.module_names(),
        }
    }
}

/// The external state-migration capability.
///
/// Every `open_*` call hands out a handle that must later be passed back to
/// `release` with the matching [`HandleKind`].
#[async_trait]
pub trait MigrationEngine: Send + Sync {
    async fn open_state(&self, raw_state: &[u8]) -> anyhow::Result<Handle>;

    async fn open_config_bundle(&self, module_cache_dir: &Path) -> anyhow::Result<Handle>;

    async fn open_stack_config(&self, bundle: Handle, relative_path: &str)
        -> anyhow::Result<Handle>;

    async fn open_lock_file(&self, bundle: Handle, relative_path: &str) -> anyhow::Result<Handle>;

    async fn open_provider_cache(&self, provider_cache_dir: &Path) -> anyhow::Result<Handle>;

    async fn release(&self, kind: HandleKind, handle: Handle) -> anyhow::Result<()>;

    async fn migrate(&self, request: MigrateRequest<'_>) -> anyhow::Result<EventStream>;
}

/// Finite, single-pass stream of frames produced by one `migrate` call.
pub struct EventStream {
    inner: Pin<Box<dyn Stream<Item = anyhow::Result<StreamFrame>> + Send>>,
}

impl EventStream {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = anyhow::Result<StreamFrame>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Stream that yields `frames` in order and then ends.
    pub fn from_frames(frames: Vec<StreamFrame>) -> Self {
        Self::new(futures::stream::iter(frames.into_iter().map(Ok)))
    }

    /// Wait for the next frame. `None` means the engine closed the stream.
    pub async fn next(&mut self) -> Option<anyhow::Result<StreamFrame>> {
        self.inner.next().await
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream").finish_non_exhaustive()
    }
}
