use crate::error::Result;
use crate::snapshot::atomic::AtomicWriter;
use crate::snapshot::codec::{decode_snapshot, encode_snapshot};
use crate::types::{ChangeKind, StackState};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Write the whole snapshot to `path`, replacing any existing file.
pub async fn write_snapshot(path: &Path, snapshot: &StackState) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let bytes = encode_snapshot(snapshot);
    let mut writer = AtomicWriter::new(path).await?;
    if let Err(e) = writer.write_all(&bytes).await {
        writer.abort().await;
        return Err(e.into());
    }
    writer.commit().await?;

    info!(
        "Wrote stack state ({} raw, {} descriptions, {} bytes) to {}",
        snapshot.raw.len(),
        snapshot.descriptions.len(),
        bytes.len(),
        path.display()
    );
    Ok(())
}

/// Decode a snapshot previously written by [`write_snapshot`].
pub async fn read_snapshot(path: &Path) -> Result<StackState> {
    let bytes = tokio::fs::read(path).await?;
    decode_snapshot(&bytes)
}

/// JSON-friendly rendering of a snapshot.
#[derive(Debug, Serialize)]
pub struct SnapshotView {
    pub format_version: u32,
    pub raw: BTreeMap<String, RawView>,
    pub descriptions: BTreeMap<String, DescriptionView>,
}

#[derive(Debug, Serialize)]
pub struct RawView {
    pub type_url: String,
    /// Base64 of the payload bytes.
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct DescriptionView {
    pub kind: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_address: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

impl From<&StackState> for SnapshotView {
    fn from(snapshot: &StackState) -> Self {
        let raw = snapshot
            .raw
            .iter()
            .map(|(key, any)| {
                (
                    key.clone(),
                    RawView {
                        type_url: any.type_url.clone(),
                        value: BASE64.encode(&any.value),
                    },
                )
            })
            .collect();

        let descriptions = snapshot
            .descriptions
            .iter()
            .map(|(key, description)| {
                let kind = ChangeKind::try_from(description.kind)
                    .map(|kind| format!("{kind:?}"))
                    .unwrap_or_else(|_| format!("UNKNOWN({})", description.kind));
                (
                    key.clone(),
                    DescriptionView {
                        kind,
                        address: description.address.clone(),
                        prior_address: description.prior_address.clone(),
                        detail: BASE64.encode(&description.detail),
                    },
                )
            })
            .collect();

        Self {
            format_version: snapshot.format_version,
            raw,
            descriptions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Any, ChangeDescription};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_read_creates_output_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stack_state").join("stack_state.tfstackstate");

        write_snapshot(&path, &StackState::empty()).await.unwrap();
        let read = read_snapshot(&path).await.unwrap();
        assert_eq!(read, StackState::empty());
    }

    #[test]
    fn test_view_encodes_payloads() {
        let mut snapshot = StackState::empty();
        snapshot.raw.insert(
            "k".to_string(),
            Any {
                type_url: "type.test/X".to_string(),
                value: b"hi".to_vec(),
            },
        );
        snapshot.descriptions.insert(
            "k".to_string(),
            ChangeDescription::new("k", ChangeKind::ComponentInstance, "component.app"),
        );

        let json = serde_json::to_value(SnapshotView::from(&snapshot)).unwrap();
        assert_eq!(json["format_version"], 1);
        assert_eq!(json["raw"]["k"]["value"], "aGk=");
        assert_eq!(json["descriptions"]["k"]["kind"], "ComponentInstance");
        assert!(json["descriptions"]["k"].get("detail").is_none());
    }
}
