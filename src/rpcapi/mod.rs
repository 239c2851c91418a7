//! Migration engine served by `terraform rpcapi`.

pub mod engine;
pub mod plugin;
pub mod proto;

pub use engine::RpcApiEngine;
pub use plugin::{PluginAddress, RpcApiPlugin};

use crate::terraform::CommandError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcApiError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("terraform rpcapi exited before completing the plugin handshake")]
    NoHandshake,

    #[error("timed out after {}s waiting for the terraform rpcapi handshake", .0.as_secs())]
    HandshakeTimeout(Duration),

    #[error("malformed plugin handshake {line:?}: {reason}")]
    BadHandshake { line: String, reason: String },

    #[error("failed to connect to terraform rpcapi: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("{call} failed: {}", .status.message())]
    Call {
        call: &'static str,
        status: tonic::Status,
    },

    #[error("{call} reported errors: {summary}")]
    Diagnostics { call: &'static str, summary: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
