//! Atomic file writes: data lands in a sibling temp file and is renamed over
//! the target only on commit.

use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Writer whose output becomes visible at the target path all at once.
///
/// The temp file lives next to the target so the final rename stays on one
/// filesystem. Dropping the writer without [`commit`](Self::commit) removes
/// the temp file and leaves any existing target untouched.
pub struct AtomicWriter {
    temp_path: PathBuf,
    final_path: PathBuf,
    temp_file: Option<File>,
}

impl AtomicWriter {
    /// Create a fresh temp file beside `target_path`. Fails if the target
    /// has no file name or its directory is not writable.
    pub async fn new(target_path: impl AsRef<Path>) -> std::io::Result<Self> {
        let final_path = target_path.as_ref().to_path_buf();
        let temp_path = create_temp_file_path(&final_path)?;

        let temp_file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await?;

        Ok(AtomicWriter {
            temp_path,
            final_path,
            temp_file: Some(temp_file),
        })
    }

    /// Append `data` to the temp file.
    pub async fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        match self.temp_file.as_mut() {
            Some(file) => file.write_all(data).await,
            None => Err(std::io::Error::other("atomic writer already closed")),
        }
    }

    /// Flush, sync and move the temp file over the target.
    pub async fn commit(mut self) -> std::io::Result<()> {
        if let Some(mut file) = self.temp_file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }

        tokio::fs::rename(&self.temp_path, &self.final_path).await
    }

    /// Discard everything written so far.
    pub async fn abort(mut self) {
        self.temp_file.take();
        let _ = tokio::fs::remove_file(&self.temp_path).await;
    }
}

impl Drop for AtomicWriter {
    fn drop(&mut self) {
        // Neither committed nor aborted
        if self.temp_file.take().is_some() {
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}

fn create_temp_file_path(target_path: &Path) -> std::io::Result<PathBuf> {
    let parent = target_path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = target_path
        .file_name()
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} has no file name", target_path.display()),
            )
        })?
        .to_string_lossy();

    let temp_name = format!(".{}.tmp.{}", file_name, Uuid::new_v4().simple());
    Ok(parent.join(temp_name))
}
