use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("Invalid input: {reason}")]
    Input { reason: String },

    #[error("Stack configuration error: {reason}")]
    Config { reason: String },

    #[error("Workspace state is not fully modular, found {found} components, expected 1")]
    AmbiguousComponent { found: usize },

    #[error("Top-level modules {modules:?} do not match components {components:?}")]
    AddressMismatch {
        modules: BTreeSet<String>,
        components: BTreeSet<String>,
    },

    #[error("Migration engine failed during {phase}: {reason}")]
    Engine { phase: EnginePhase, reason: String },

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Migration cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("Snapshot encoding error: {0}")]
    Codec(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrateError {
    pub fn input(reason: impl Into<String>) -> Self {
        MigrateError::Input {
            reason: reason.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        MigrateError::Config {
            reason: reason.into(),
        }
    }

    pub fn engine(phase: EnginePhase, reason: impl fmt::Display) -> Self {
        MigrateError::Engine {
            phase,
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("diagnostic received from migration engine: {detail}")]
    Diagnostic { detail: String },

    #[error("unrecognized event from migration engine: {kind}")]
    UnrecognizedEvent { kind: String },

    #[error("event stream ended without a completion marker")]
    StreamTruncated,

    #[error("event received after the stream was closed")]
    EventAfterClose,

    #[error("event stream already failed; no snapshot is available")]
    AlreadyFailed,

    #[error("duplicate {map} key written by a later event: {key}")]
    DuplicateKey { map: SnapshotMap, key: String },

    #[error("failed to release {handle} handle: {reason}")]
    ReleaseFailed { handle: HandleKind, reason: String },
}

/// Engine operation that was in flight when an engine call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    OpenState,
    OpenConfigBundle,
    OpenStackConfig,
    OpenLockFile,
    OpenProviderCache,
    Migrate,
    Receive,
}

impl fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnginePhase::OpenState => "open state",
            EnginePhase::OpenConfigBundle => "open config bundle",
            EnginePhase::OpenStackConfig => "open stack configuration",
            EnginePhase::OpenLockFile => "open dependency lock file",
            EnginePhase::OpenProviderCache => "open provider cache",
            EnginePhase::Migrate => "migrate",
            EnginePhase::Receive => "receive event",
        };
        f.write_str(name)
    }
}

/// Kinds of handle held open against the migration engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    State,
    ConfigBundle,
    StackConfig,
    LockFile,
    ProviderCache,
}

impl HandleKind {
    pub fn open_phase(self) -> EnginePhase {
        match self {
            HandleKind::State => EnginePhase::OpenState,
            HandleKind::ConfigBundle => EnginePhase::OpenConfigBundle,
            HandleKind::StackConfig => EnginePhase::OpenStackConfig,
            HandleKind::LockFile => EnginePhase::OpenLockFile,
            HandleKind::ProviderCache => EnginePhase::OpenProviderCache,
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandleKind::State => "state",
            HandleKind::ConfigBundle => "config bundle",
            HandleKind::StackConfig => "stack configuration",
            HandleKind::LockFile => "dependency lock file",
            HandleKind::ProviderCache => "provider cache",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotMap {
    Raw,
    Description,
}

impl fmt::Display for SnapshotMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotMap::Raw => f.write_str("raw"),
            SnapshotMap::Description => f.write_str("description"),
        }
    }
}

/// Pipeline stage an error surfaced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Listing,
    Classification,
    Mapping,
    SessionSetup,
    Streaming,
    Persisting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Listing => "listing",
            Phase::Classification => "classification",
            Phase::Mapping => "mapping",
            Phase::SessionSetup => "session setup",
            Phase::Streaming => "streaming",
            Phase::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("{phase} failed: {source}")]
pub struct RunError {
    pub phase: Phase,
    #[source]
    pub source: MigrateError,
}

impl RunError {
    pub fn new(phase: Phase, source: MigrateError) -> Self {
        Self { phase, source }
    }
}

pub type Result<T> = std::result::Result<T, MigrateError>;
