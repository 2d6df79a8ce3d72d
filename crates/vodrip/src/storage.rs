//! Scratch space for the segments of one run.
//!
//! The directory itself is owned by the caller (the CLI hands in a temporary directory that
//! disappears on every exit path). This type only decides file names and writes segments as
//! read-only files.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::VodError;

#[derive(Debug, Clone)]
pub struct ScopedStorage {
    root: PathBuf,
}

impl ScopedStorage {
    /// Wrap an existing directory. The path is made absolute so it can be handed to external
    /// tools running from another working directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, VodError> {
        let root = std::path::absolute(root.as_ref())?;
        if !root.is_dir() {
            return Err(VodError::configuration(format!(
                "storage directory {} does not exist",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn segment_file_name(asset_id: &str, index: usize) -> String {
        format!("{asset_id}_{index}.ts")
    }

    pub fn segment_path(&self, asset_id: &str, index: usize) -> PathBuf {
        self.root.join(Self::segment_file_name(asset_id, index))
    }

    pub async fn has_segment(&self, asset_id: &str, index: usize) -> bool {
        tokio::fs::try_exists(self.segment_path(asset_id, index))
            .await
            .unwrap_or(false)
    }

    /// Persist segment `index` and mark it read-only. Returns the absolute path.
    pub async fn write_segment(
        &self,
        asset_id: &str,
        index: usize,
        bytes: &[u8],
    ) -> Result<PathBuf, VodError> {
        let path = self.segment_path(asset_id, index);
        self.write_read_only(&path, bytes).await?;
        trace!(path = %path.display(), size = bytes.len(), "Segment persisted");
        Ok(path)
    }

    pub(crate) async fn write_read_only(&self, path: &Path, bytes: &[u8]) -> Result<(), VodError> {
        tokio::fs::write(path, bytes).await?;
        let mut permissions = tokio::fs::metadata(path).await?.permissions();
        permissions.set_readonly(true);
        tokio::fs::set_permissions(path, permissions).await?;
        Ok(())
    }

    /// Remove persisted segments, ignoring ones that were never written.
    pub async fn remove_segments(&self, asset_id: &str, indices: &[usize]) {
        let mut removed = 0usize;
        for &index in indices {
            match tokio::fs::remove_file(self.segment_path(asset_id, index)).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => debug!(index, error = %e, "Failed to remove segment"),
            }
        }
        debug!(removed, "Removed persisted segments");
    }
}
