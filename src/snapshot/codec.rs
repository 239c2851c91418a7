use crate::error::{MigrateError, Result};
use crate::types::StackState;
use prost::Message;

/// Serialize a snapshot to protobuf bytes.
pub fn encode_snapshot(snapshot: &StackState) -> Vec<u8> {
    snapshot.encode_to_vec()
}

/// Parse protobuf bytes into a snapshot.
///
/// Protobuf cannot tell an empty map from a missing one; both decode to an
/// empty map here, so `raw` and `descriptions` are always present.
pub fn decode_snapshot(bytes: &[u8]) -> Result<StackState> {
    StackState::decode(bytes)
        .map_err(|e| MigrateError::Codec(format!("failed to decode stack state: {e}")))
}
