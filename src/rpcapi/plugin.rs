//! Launching `terraform rpcapi` and connecting to it.
//!
//! Terraform serves the RPC API as a go-plugin: the child prints one
//! handshake line on stdout naming the socket it listens on, then speaks
//! gRPC over it until its stdin closes or it is killed.

use super::engine::RpcApiEngine;
use super::RpcApiError;
use crate::terraform::TerraformCli;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdout};
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, info};

pub const MAGIC_COOKIE_KEY: &str = "TERRAFORM_RPCAPI_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str = "fba0991c9bcd453982f0d88e2da95940";

const PROTOCOL_VERSION: &str = "1";
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the plugin listens, as announced in its handshake line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginAddress {
    Unix(PathBuf),
    Tcp(String),
}

impl PluginAddress {
    /// Parse `CORE|APP|NETWORK|ADDRESS|PROTOCOL[|CERT]`.
    pub fn parse(line: &str) -> Result<Self, RpcApiError> {
        let line = line.trim();
        let malformed = |reason: &str| RpcApiError::BadHandshake {
            line: line.to_string(),
            reason: reason.to_string(),
        };

        let fields: Vec<&str> = line.split('|').collect();
        if fields.len() < 5 {
            return Err(malformed("expected at least five fields"));
        }
        if fields[0] != "1" {
            return Err(malformed("unsupported core protocol version"));
        }
        if fields[1] != PROTOCOL_VERSION {
            return Err(malformed("unsupported rpcapi protocol version"));
        }
        if fields[4] != "grpc" {
            return Err(malformed("plugin does not serve grpc"));
        }

        match fields[2] {
            "unix" => Ok(PluginAddress::Unix(PathBuf::from(fields[3]))),
            "tcp" => Ok(PluginAddress::Tcp(fields[3].to_string())),
            _ => Err(malformed("unknown network type")),
        }
    }

    async fn connect(&self) -> Result<Channel, RpcApiError> {
        match self {
            PluginAddress::Tcp(addr) => {
                let channel = Endpoint::from_shared(format!("http://{addr}"))?
                    .connect()
                    .await?;
                Ok(channel)
            }
            PluginAddress::Unix(path) => connect_unix(path.clone()).await,
        }
    }
}

#[cfg(unix)]
async fn connect_unix(path: PathBuf) -> Result<Channel, RpcApiError> {
    use hyper_util::rt::TokioIo;
    use tokio::net::UnixStream;
    use tonic::transport::Uri;
    use tower::service_fn;

    // The URI only satisfies the builder; the connector ignores it.
    let channel = Endpoint::from_static("http://rpcapi.local")
        .connect_with_connector(service_fn(move |_: Uri| {
            let path = path.clone();
            async move { UnixStream::connect(path).await.map(TokioIo::new) }
        }))
        .await?;
    Ok(channel)
}

#[cfg(not(unix))]
async fn connect_unix(path: PathBuf) -> Result<Channel, RpcApiError> {
    Err(RpcApiError::BadHandshake {
        line: path.display().to_string(),
        reason: "unix sockets are not supported on this platform".to_string(),
    })
}

/// A running `terraform rpcapi` child and the channel to it.
///
/// The child is killed when this value is dropped.
pub struct RpcApiPlugin {
    child: Child,
    channel: Channel,
    // Held so the child never sees a closed stdout.
    _stdout: Lines<BufReader<ChildStdout>>,
}

impl RpcApiPlugin {
    /// Start `terraform rpcapi` in `working_dir`, connect, and complete the
    /// setup handshake.
    pub async fn start(terraform: &TerraformCli, working_dir: &Path) -> Result<Self, RpcApiError> {
        let mut command = terraform.command(working_dir, &["rpcapi"]);
        command
            .env(MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE)
            .env("PLUGIN_PROTOCOL_VERSIONS", PROTOCOL_VERSION)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|e| terraform.spawn_error(e))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr));
        }
        let stdout = child.stdout.take().ok_or(RpcApiError::NoHandshake)?;
        let mut lines = BufReader::new(stdout).lines();

        let line = match tokio::time::timeout(HANDSHAKE_TIMEOUT, lines.next_line()).await {
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) => return Err(RpcApiError::NoHandshake),
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(RpcApiError::HandshakeTimeout(HANDSHAKE_TIMEOUT)),
        };

        let address = PluginAddress::parse(&line)?;
        debug!("terraform rpcapi listening on {:?}", address);

        let channel = address.connect().await?;
        RpcApiEngine::new(channel.clone()).handshake().await?;
        info!("Connected to terraform rpcapi");

        Ok(Self {
            child,
            channel,
            _stdout: lines,
        })
    }

    pub fn engine(&self) -> RpcApiEngine {
        RpcApiEngine::new(self.channel.clone())
    }

    /// Close the child's stdin, which asks it to exit, then wait for it,
    /// killing it if it lingers.
    pub async fn stop(mut self) {
        drop(self.child.stdin.take());
        match tokio::time::timeout(Duration::from_secs(5), self.child.wait()).await {
            Ok(Ok(status)) => debug!("terraform rpcapi exited with {}", status),
            Ok(Err(e)) => debug!("Failed to wait for terraform rpcapi: {}", e),
            Err(_) => {
                if let Err(e) = self.child.kill().await {
                    debug!("Failed to kill terraform rpcapi: {}", e);
                }
            }
        }
    }
}

async fn forward_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "terraform::rpcapi", "{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_unix_handshake() {
        let address = PluginAddress::parse("1|1|unix|/tmp/plugin123456|grpc|\n").unwrap();
        assert_eq!(address, PluginAddress::Unix(PathBuf::from("/tmp/plugin123456")));
    }

    #[test]
    fn test_parses_tcp_handshake() {
        let address = PluginAddress::parse("1|1|tcp|127.0.0.1:10000|grpc").unwrap();
        assert_eq!(address, PluginAddress::Tcp("127.0.0.1:10000".to_string()));
    }

    #[test]
    fn test_rejects_netrpc_plugins() {
        let err = PluginAddress::parse("1|1|unix|/tmp/plugin|netrpc|").unwrap_err();
        assert!(err.to_string().contains("does not serve grpc"), "{err}");
    }

    #[test]
    fn test_rejects_unexpected_protocol_version() {
        let err = PluginAddress::parse("1|6|unix|/tmp/plugin|grpc|").unwrap_err();
        assert!(err.to_string().contains("rpcapi protocol version"), "{err}");
    }

    #[test]
    fn test_rejects_truncated_line() {
        let err = PluginAddress::parse("Error: unknown command \"rpcapi\"").unwrap_err();
        match err {
            RpcApiError::BadHandshake { line, .. } => {
                assert_eq!(line, "Error: unknown command \"rpcapi\"")
            }
            other => panic!("expected bad handshake, got {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_child_exiting_without_handshake() {
        // `sh rpcapi` fails to find a script and exits without printing.
        let dir = tempfile::tempdir().unwrap();
        let err = RpcApiPlugin::start(&TerraformCli::new("sh"), dir.path())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RpcApiError::NoHandshake), "{err}");
    }
}
