//! Stack Migrate - moves Terraform workspace state into stack state
//!
//! The crate classifies a workspace's resources, reads the components of a
//! generated stack configuration, builds the address map between the two,
//! and folds the migration engine's event stream into a persisted stack
//! state snapshot.

pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod mapping;
pub mod migration;
pub mod rpcapi;
pub mod snapshot;
pub mod stack;
pub mod terraform;
pub mod types;
pub mod workspace;

pub use config::MigrateConfig;
pub use driver::{MigrationDriver, MigrationReport, WorkspaceAnalysis};
pub use error::{MigrateError, Phase, ProtocolError, Result, RunError};
pub use types::*;
