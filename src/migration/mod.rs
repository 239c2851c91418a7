pub mod aggregator;
pub mod engine;
pub mod paths;
pub mod session;

pub use aggregator::{AggregatorState, DuplicateKeyPolicy, EventAggregator, Outcome};
pub use engine::{EventStream, Handle, MigrateRequest, MigrationEngine};
pub use paths::{engine_relative_path, relative_path, SessionPaths};
pub use session::MigrationSession;
