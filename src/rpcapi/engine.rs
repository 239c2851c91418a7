//! [`MigrationEngine`] backed by a `terraform rpcapi` connection.

use super::proto::{self, paths};
use super::RpcApiError;
use crate::error::HandleKind;
use crate::migration::{EventStream, Handle, MigrateRequest, MigrationEngine};
use crate::types::{
    AppliedChange, ChangeDescription, ChangeKind, Diagnostic, MigrationEvent, RawEntry, Severity,
    StreamFrame,
};
use async_trait::async_trait;
use futures::Stream;
use prost::Message;
use std::path::Path;
use tonic::client::Grpc;
use tonic::codec::{ProstCodec, Streaming};
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RpcApiEngine {
    channel: Channel,
}

impl RpcApiEngine {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }

    async fn client(&self, call: &'static str) -> Result<Grpc<Channel>, RpcApiError> {
        let mut grpc = Grpc::new(self.channel.clone());
        grpc.ready().await.map_err(|e| RpcApiError::Call {
            call,
            status: tonic::Status::unavailable(e.to_string()),
        })?;
        Ok(grpc)
    }

    async fn unary<Req, Resp>(&self, call: &'static str, request: Req) -> Result<Resp, RpcApiError>
    where
        Req: Message + Send + Sync + 'static,
        Resp: Message + Default + Send + Sync + 'static,
    {
        debug!("rpcapi call {}", call);
        let mut grpc = self.client(call).await?;
        let response = grpc
            .unary(
                tonic::Request::new(request),
                PathAndQuery::from_static(call),
                ProstCodec::<Req, Resp>::default(),
            )
            .await
            .map_err(|status| RpcApiError::Call { call, status })?;
        Ok(response.into_inner())
    }

    /// Negotiate the session with the server. Must precede every other call.
    pub async fn handshake(&self) -> Result<(), RpcApiError> {
        let _: proto::Empty = self.unary(paths::HANDSHAKE, proto::Empty {}).await?;
        Ok(())
    }

    async fn close<Req>(&self, call: &'static str, request: Req) -> Result<(), RpcApiError>
    where
        Req: Message + Send + Sync + 'static,
    {
        let _: proto::Empty = self.unary(call, request).await?;
        Ok(())
    }
}

#[async_trait]
impl MigrationEngine for RpcApiEngine {
    async fn open_state(&self, raw_state: &[u8]) -> anyhow::Result<Handle> {
        let request = proto::OpenTerraformStateRequest {
            state: Some(proto::open_terraform_state_request::State::Raw(
                raw_state.to_vec(),
            )),
        };
        let response: proto::OpenTerraformStateResponse =
            self.unary(paths::OPEN_TERRAFORM_STATE, request).await?;
        check_diagnostics(paths::OPEN_TERRAFORM_STATE, &response.diagnostics)?;
        Ok(Handle(response.state_handle))
    }

    async fn open_config_bundle(&self, module_cache_dir: &Path) -> anyhow::Result<Handle> {
        let request = proto::OpenSourceBundleRequest {
            local_path: module_cache_dir.display().to_string(),
        };
        let response: proto::OpenSourceBundleResponse =
            self.unary(paths::OPEN_SOURCE_BUNDLE, request).await?;
        Ok(Handle(response.source_bundle_handle))
    }

    async fn open_stack_config(
        &self,
        bundle: Handle,
        relative_path: &str,
    ) -> anyhow::Result<Handle> {
        let request = proto::OpenStackConfigurationRequest {
            source_bundle_handle: bundle.0,
            source_address: Some(source_address(relative_path)),
        };
        let response: proto::OpenStackConfigurationResponse =
            self.unary(paths::OPEN_STACK_CONFIGURATION, request).await?;
        check_diagnostics(paths::OPEN_STACK_CONFIGURATION, &response.diagnostics)?;
        Ok(Handle(response.stack_config_handle))
    }

    async fn open_lock_file(&self, bundle: Handle, relative_path: &str) -> anyhow::Result<Handle> {
        let request = proto::OpenDependencyLockFileRequest {
            source_bundle_handle: bundle.0,
            source_address: Some(source_address(relative_path)),
        };
        let response: proto::OpenDependencyLockFileResponse =
            self.unary(paths::OPEN_DEPENDENCY_LOCK_FILE, request).await?;
        check_diagnostics(paths::OPEN_DEPENDENCY_LOCK_FILE, &response.diagnostics)?;
        Ok(Handle(response.dependencies_handle))
    }

    async fn open_provider_cache(&self, provider_cache_dir: &Path) -> anyhow::Result<Handle> {
        let request = proto::OpenProviderPluginCacheRequest {
            cache_dir: provider_cache_dir.display().to_string(),
            override_platform: String::new(),
        };
        let response: proto::OpenProviderPluginCacheResponse =
            self.unary(paths::OPEN_PROVIDER_PLUGIN_CACHE, request).await?;
        check_diagnostics(paths::OPEN_PROVIDER_PLUGIN_CACHE, &response.diagnostics)?;
        Ok(Handle(response.provider_cache_handle))
    }

    async fn release(&self, kind: HandleKind, handle: Handle) -> anyhow::Result<()> {
        let id = handle.0;
        match kind {
            HandleKind::State => {
                let request = proto::CloseTerraformStateRequest { state_handle: id };
                self.close(paths::CLOSE_TERRAFORM_STATE, request).await?
            }
            HandleKind::ConfigBundle => {
                let request = proto::CloseSourceBundleRequest {
                    source_bundle_handle: id,
                };
                self.close(paths::CLOSE_SOURCE_BUNDLE, request).await?
            }
            HandleKind::StackConfig => {
                let request = proto::CloseStackConfigurationRequest {
                    stack_config_handle: id,
                };
                self.close(paths::CLOSE_STACK_CONFIGURATION, request).await?
            }
            HandleKind::LockFile => {
                let request = proto::CloseDependenciesRequest {
                    dependencies_handle: id,
                };
                self.close(paths::CLOSE_DEPENDENCIES, request).await?
            }
            HandleKind::ProviderCache => {
                let request = proto::CloseProviderPluginCacheRequest {
                    provider_cache_handle: id,
                };
                self.close(paths::CLOSE_PROVIDER_PLUGIN_CACHE, request).await?
            }
        }
        Ok(())
    }

    async fn migrate(&self, request: MigrateRequest<'_>) -> anyhow::Result<EventStream> {
        let call = paths::MIGRATE_TERRAFORM_STATE;
        let mut grpc = self.client(call).await?;
        let response = grpc
            .server_streaming(
                tonic::Request::new(migrate_request(&request)),
                PathAndQuery::from_static(call),
                ProstCodec::<proto::MigrateTerraformStateRequest, proto::MigrateTerraformStateEvent>::default(),
            )
            .await
            .map_err(|status| RpcApiError::Call { call, status })?;

        Ok(EventStream::new(event_frames(response.into_inner())))
    }
}

fn source_address(relative_path: &str) -> proto::SourceAddress {
    proto::SourceAddress {
        source: relative_path.to_string(),
    }
}

/// Open calls report problems as diagnostics alongside a handle. Errors fail
/// the call; warnings are logged.
fn check_diagnostics(
    call: &'static str,
    diagnostics: &[proto::Diagnostic],
) -> Result<(), RpcApiError> {
    let mut errors = Vec::new();
    for diagnostic in diagnostics {
        let converted = convert_diagnostic(diagnostic);
        match converted.severity {
            Severity::Error => errors.push(converted.to_string()),
            Severity::Warning => warn!("{}: {}", call, converted),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(RpcApiError::Diagnostics {
            call,
            summary: errors.join("; "),
        })
    }
}

// Anything not explicitly a warning is treated as an error.
fn convert_diagnostic(diagnostic: &proto::Diagnostic) -> Diagnostic {
    let severity = match proto::DiagnosticSeverity::try_from(diagnostic.severity) {
        Ok(proto::DiagnosticSeverity::Warning) => Severity::Warning,
        _ => Severity::Error,
    };
    Diagnostic {
        severity,
        summary: diagnostic.summary.clone(),
        detail: diagnostic.detail.clone(),
    }
}

pub(crate) fn migrate_request(request: &MigrateRequest<'_>) -> proto::MigrateTerraformStateRequest {
    let mapping = proto::AddressMapping {
        resource_address_map: request.resource_address_map.cloned().unwrap_or_default(),
        module_address_map: request.module_address_map.cloned().unwrap_or_default(),
    };
    proto::MigrateTerraformStateRequest {
        state_handle: request.state.0,
        config_handle: request.stack_config.0,
        dependency_locks_handle: request.dependency_locks.0,
        provider_cache_handle: request.provider_cache.0,
        mapping: Some(proto::migrate_terraform_state_request::Mapping::Simple(mapping)),
    }
}

/// Adapt the gRPC stream. A clean end of the call becomes
/// [`StreamFrame::Complete`]; a non-OK status becomes an error.
fn event_frames(
    streaming: Streaming<proto::MigrateTerraformStateEvent>,
) -> impl Stream<Item = anyhow::Result<StreamFrame>> + Send + 'static {
    futures::stream::unfold(Some(streaming), |state| async move {
        let mut streaming = state?;
        match streaming.message().await {
            Ok(Some(event)) => Some((Ok(frame_from_event(event)), Some(streaming))),
            Ok(None) => Some((Ok(StreamFrame::Complete), None)),
            Err(status) => Some((
                Err(anyhow::anyhow!("migration event stream failed: {status}")),
                None,
            )),
        }
    })
}

pub(crate) fn frame_from_event(event: proto::MigrateTerraformStateEvent) -> StreamFrame {
    use proto::migrate_terraform_state_event::Result as EventResult;

    match event.result {
        Some(EventResult::Diagnostic(diagnostic)) => {
            MigrationEvent::Diagnostic(convert_diagnostic(&diagnostic)).into()
        }
        Some(EventResult::AppliedChange(change)) => {
            MigrationEvent::AppliedChange(convert_applied_change(change)).into()
        }
        None => StreamFrame::Unrecognized {
            kind: "event with no result".to_string(),
        },
    }
}

fn convert_applied_change(change: proto::AppliedChange) -> AppliedChange {
    let raw = change
        .raw
        .into_iter()
        .map(|raw| RawEntry {
            key: raw.key,
            value: raw.value.unwrap_or_default(),
        })
        .collect();

    let descriptions = change
        .descriptions
        .into_iter()
        .map(convert_description)
        .collect();

    AppliedChange { raw, descriptions }
}

fn convert_description(description: proto::ChangeDescription) -> ChangeDescription {
    use proto::change_description::Description;

    let (kind, address, detail) = match description.description {
        Some(Description::ResourceInstance(bytes)) => {
            let address = proto::ResourceInstanceView::decode(bytes.as_slice())
                .ok()
                .and_then(|view| view.addr)
                .map(|addr| {
                    join_address(&addr.component_instance_addr, &addr.resource_instance_addr)
                })
                .unwrap_or_default();
            (ChangeKind::ResourceInstance, address, bytes)
        }
        Some(Description::ComponentInstance(bytes)) => {
            let address = proto::ComponentInstanceView::decode(bytes.as_slice())
                .map(|view| view.component_instance_addr)
                .unwrap_or_default();
            (ChangeKind::ComponentInstance, address, bytes)
        }
        Some(Description::OutputValue(bytes)) => {
            let address = named_value(&bytes, "output");
            (ChangeKind::OutputValue, address, bytes)
        }
        Some(Description::InputVariable(bytes)) => {
            let address = named_value(&bytes, "var");
            (ChangeKind::InputVariable, address, bytes)
        }
        Some(Description::Deleted(bytes)) => (ChangeKind::Deleted, String::new(), bytes),
        Some(Description::Moved(bytes)) => (ChangeKind::Moved, String::new(), bytes),
        None => (ChangeKind::Unspecified, String::new(), Vec::new()),
    };

    ChangeDescription {
        detail,
        ..ChangeDescription::new(description.key, kind, address)
    }
}

fn named_value(bytes: &[u8], prefix: &str) -> String {
    proto::NamedValueView::decode(bytes)
        .ok()
        .filter(|view| !view.name.is_empty())
        .map(|view| format!("{prefix}.{}", view.name))
        .unwrap_or_default()
}

fn join_address(component: &str, resource: &str) -> String {
    match (component.is_empty(), resource.is_empty()) {
        (false, false) => format!("{component}.{resource}"),
        (true, _) => resource.to_string(),
        (false, true) => component.to_string(),
    }
}
