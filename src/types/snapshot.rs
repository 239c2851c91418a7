//! Persisted stack state messages.
//!
//! These mirror the protobuf layout of a `.tfstackstate` file so the
//! snapshot can be written with `prost` without a build step.

use std::collections::BTreeMap;

pub use prost_types::Any;

/// Format version written into every snapshot.
pub const STACK_STATE_FORMAT_VERSION: u32 = 1;

/// Final, immutable stack state produced by a successful migration run.
#[derive(Clone, PartialEq, prost::Message)]
pub struct StackState {
    #[prost(uint32, tag = "1")]
    pub format_version: u32,
    #[prost(btree_map = "string, message", tag = "2")]
    pub raw: BTreeMap<String, Any>,
    #[prost(btree_map = "string, message", tag = "3")]
    pub descriptions: BTreeMap<String, ChangeDescription>,
}

impl StackState {
    pub fn empty() -> Self {
        Self {
            format_version: STACK_STATE_FORMAT_VERSION,
            raw: BTreeMap::new(),
            descriptions: BTreeMap::new(),
        }
    }
}

/// Structured description of one applied change.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ChangeDescription {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(enumeration = "ChangeKind", tag = "2")]
    pub kind: i32,
    #[prost(string, tag = "3")]
    pub address: String,
    #[prost(string, optional, tag = "4")]
    pub prior_address: Option<String>,
    #[prost(bytes = "vec", tag = "5")]
    pub detail: Vec<u8>,
}

impl ChangeDescription {
    pub fn new(key: impl Into<String>, kind: ChangeKind, address: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: kind as i32,
            address: address.into(),
            prior_address: None,
            detail: Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum ChangeKind {
    Unspecified = 0,
    ComponentInstance = 1,
    ResourceInstance = 2,
    OutputValue = 3,
    InputVariable = 4,
    Deleted = 5,
    Moved = 6,
}
