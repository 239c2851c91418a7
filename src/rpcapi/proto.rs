//! Wire messages of Terraform's `rpcapi` services.
//!
//! Only the calls needed for state migration are declared. Tags follow the
//! `terraform1.setup`, `terraform1.dependencies` and `terraform1.stacks`
//! protobuf packages shipped with Terraform.

use std::collections::BTreeMap;

pub use prost_types::Any;

pub mod paths {
    pub const HANDSHAKE: &str = "/terraform1.setup.Setup/Handshake";

    pub const OPEN_SOURCE_BUNDLE: &str = "/terraform1.dependencies.Dependencies/OpenSourceBundle";
    pub const CLOSE_SOURCE_BUNDLE: &str = "/terraform1.dependencies.Dependencies/CloseSourceBundle";
    pub const OPEN_DEPENDENCY_LOCK_FILE: &str =
        "/terraform1.dependencies.Dependencies/OpenDependencyLockFile";
    pub const CLOSE_DEPENDENCIES: &str = "/terraform1.dependencies.Dependencies/CloseDependencies";
    pub const OPEN_PROVIDER_PLUGIN_CACHE: &str =
        "/terraform1.dependencies.Dependencies/OpenProviderPluginCache";
    pub const CLOSE_PROVIDER_PLUGIN_CACHE: &str =
        "/terraform1.dependencies.Dependencies/CloseProviderPluginCache";

    pub const OPEN_STACK_CONFIGURATION: &str = "/terraform1.stacks.Stacks/OpenStackConfiguration";
    pub const CLOSE_STACK_CONFIGURATION: &str = "/terraform1.stacks.Stacks/CloseStackConfiguration";
    pub const OPEN_TERRAFORM_STATE: &str = "/terraform1.stacks.Stacks/OpenTerraformState";
    pub const CLOSE_TERRAFORM_STATE: &str = "/terraform1.stacks.Stacks/CloseTerraformState";
    pub const MIGRATE_TERRAFORM_STATE: &str = "/terraform1.stacks.Stacks/MigrateTerraformState";
}

/// Request or response with no fields.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Empty {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SourceAddress {
    #[prost(string, tag = "1")]
    pub source: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Diagnostic {
    #[prost(enumeration = "DiagnosticSeverity", tag = "1")]
    pub severity: i32,
    #[prost(string, tag = "2")]
    pub summary: String,
    #[prost(string, tag = "3")]
    pub detail: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum DiagnosticSeverity {
    Invalid = 0,
    Error = 1,
    Warning = 2,
}

// Source bundles, lock files and provider caches

#[derive(Clone, PartialEq, prost::Message)]
pub struct OpenSourceBundleRequest {
    #[prost(string, tag = "1")]
    pub local_path: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct OpenSourceBundleResponse {
    #[prost(int64, tag = "1")]
    pub source_bundle_handle: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CloseSourceBundleRequest {
    #[prost(int64, tag = "1")]
    pub source_bundle_handle: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct OpenDependencyLockFileRequest {
    #[prost(int64, tag = "1")]
    pub source_bundle_handle: i64,
    #[prost(message, optional, tag = "2")]
    pub source_address: Option<SourceAddress>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct OpenDependencyLockFileResponse {
    #[prost(int64, tag = "1")]
    pub dependencies_handle: i64,
    #[prost(message, repeated, tag = "2")]
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CloseDependenciesRequest {
    #[prost(int64, tag = "1")]
    pub dependencies_handle: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct OpenProviderPluginCacheRequest {
    #[prost(string, tag = "1")]
    pub cache_dir: String,
    #[prost(string, tag = "2")]
    pub override_platform: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct OpenProviderPluginCacheResponse {
    #[prost(int64, tag = "1")]
    pub provider_cache_handle: i64,
    #[prost(message, repeated, tag = "2")]
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CloseProviderPluginCacheRequest {
    #[prost(int64, tag = "1")]
    pub provider_cache_handle: i64,
}

// Stack configuration and workspace state

#[derive(Clone, PartialEq, prost::Message)]
pub struct OpenStackConfigurationRequest {
    #[prost(int64, tag = "1")]
    pub source_bundle_handle: i64,
    #[prost(message, optional, tag = "2")]
    pub source_address: Option<SourceAddress>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct OpenStackConfigurationResponse {
    #[prost(int64, tag = "1")]
    pub stack_config_handle: i64,
    #[prost(message, repeated, tag = "2")]
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CloseStackConfigurationRequest {
    #[prost(int64, tag = "1")]
    pub stack_config_handle: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct OpenTerraformStateRequest {
    #[prost(oneof = "open_terraform_state_request::State", tags = "1, 2")]
    pub state: Option<open_terraform_state_request::State>,
}

pub mod open_terraform_state_request {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum State {
        #[prost(string, tag = "1")]
        ConfigPath(String),
        #[prost(bytes, tag = "2")]
        Raw(Vec<u8>),
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct OpenTerraformStateResponse {
    #[prost(int64, tag = "1")]
    pub state_handle: i64,
    #[prost(message, repeated, tag = "2")]
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CloseTerraformStateRequest {
    #[prost(int64, tag = "1")]
    pub state_handle: i64,
}

// Migration

#[derive(Clone, PartialEq, prost::Message)]
pub struct MigrateTerraformStateRequest {
    #[prost(int64, tag = "1")]
    pub state_handle: i64,
    #[prost(int64, tag = "2")]
    pub config_handle: i64,
    #[prost(int64, tag = "3")]
    pub dependency_locks_handle: i64,
    #[prost(int64, tag = "4")]
    pub provider_cache_handle: i64,
    #[prost(oneof = "migrate_terraform_state_request::Mapping", tags = "5")]
    pub mapping: Option<migrate_terraform_state_request::Mapping>,
}

pub mod migrate_terraform_state_request {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Mapping {
        #[prost(message, tag = "5")]
        Simple(super::AddressMapping),
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AddressMapping {
    #[prost(btree_map = "string, string", tag = "1")]
    pub resource_address_map: BTreeMap<String, String>,
    #[prost(btree_map = "string, string", tag = "2")]
    pub module_address_map: BTreeMap<String, String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MigrateTerraformStateEvent {
    #[prost(oneof = "migrate_terraform_state_event::Result", tags = "1, 2")]
    pub result: Option<migrate_terraform_state_event::Result>,
}

pub mod migrate_terraform_state_event {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Result {
        #[prost(message, tag = "1")]
        Diagnostic(super::Diagnostic),
        #[prost(message, tag = "2")]
        AppliedChange(super::AppliedChange),
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AppliedChange {
    #[prost(message, repeated, tag = "1")]
    pub raw: Vec<RawChange>,
    #[prost(message, repeated, tag = "2")]
    pub descriptions: Vec<ChangeDescription>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RawChange {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(message, optional, tag = "2")]
    pub value: Option<Any>,
}

/// Description of one applied change.
///
/// Each variant is a nested message on the wire; its encoded bytes are kept
/// as-is so nothing Terraform sends is lost. Message and bytes fields share
/// the same length-delimited encoding.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ChangeDescription {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(oneof = "change_description::Description", tags = "2, 3, 4, 5, 6, 7")]
    pub description: Option<change_description::Description>,
}

pub mod change_description {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Description {
        #[prost(bytes, tag = "2")]
        ResourceInstance(Vec<u8>),
        #[prost(bytes, tag = "3")]
        OutputValue(Vec<u8>),
        #[prost(bytes, tag = "4")]
        Deleted(Vec<u8>),
        #[prost(bytes, tag = "5")]
        ComponentInstance(Vec<u8>),
        #[prost(bytes, tag = "6")]
        Moved(Vec<u8>),
        #[prost(bytes, tag = "7")]
        InputVariable(Vec<u8>),
    }
}

// Address-only views of description payloads; other fields are skipped.

#[derive(Clone, PartialEq, prost::Message)]
pub struct ResourceInstanceView {
    #[prost(message, optional, tag = "1")]
    pub addr: Option<ResourceInstanceObjectAddr>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ResourceInstanceObjectAddr {
    #[prost(string, tag = "1")]
    pub component_instance_addr: String,
    #[prost(string, tag = "2")]
    pub resource_instance_addr: String,
    #[prost(string, tag = "3")]
    pub deposed_key: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ComponentInstanceView {
    #[prost(string, tag = "1")]
    pub component_addr: String,
    #[prost(string, tag = "2")]
    pub component_instance_addr: String,
}

/// Output values and input variables both lead with their name.
#[derive(Clone, PartialEq, prost::Message)]
pub struct NamedValueView {
    #[prost(string, tag = "1")]
    pub name: String,
}
