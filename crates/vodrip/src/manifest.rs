//! Concat manifest handed to the encoder: one `file '<absolute path>'` line per segment.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::VodError;
use crate::range::SegmentRange;
use crate::storage::ScopedStorage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub path: PathBuf,
    /// Segment indices listed, ascending
    pub entries: Vec<usize>,
    /// Indices of the range that had no persisted file
    pub missing: Vec<usize>,
}

impl Manifest {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn manifest_file_name(asset_id: &str) -> String {
    format!("{asset_id}_concat.txt")
}

/// Quote a path for the concat demuxer: single quotes, embedded quotes as `'\''`.
fn quote(path: &Path) -> String {
    let raw = path.to_string_lossy();
    format!("'{}'", raw.replace('\'', r"'\''"))
}

/// Render the manifest body for `paths`, in the order given.
pub fn render<'a>(paths: impl IntoIterator<Item = &'a Path>) -> String {
    paths
        .into_iter()
        .map(|path| format!("file {}\n", quote(path)))
        .collect()
}

/// Write the manifest for `range` into `storage` as a read-only file.
///
/// Only segments that were actually persisted are listed; dropped ones leave a gap that is
/// reported but does not fail the run.
pub async fn build_manifest(
    storage: &ScopedStorage,
    asset_id: &str,
    range: SegmentRange,
) -> Result<Manifest, VodError> {
    let mut entries = Vec::with_capacity(range.count);
    let mut missing = Vec::new();
    let mut paths = Vec::with_capacity(range.count);

    for index in range.start_index..range.end_index() {
        let path = storage.segment_path(asset_id, index);
        if tokio::fs::try_exists(&path).await? {
            entries.push(index);
            paths.push(path);
        } else {
            missing.push(index);
        }
    }

    if !missing.is_empty() {
        warn!(
            missing = missing.len(),
            first = missing[0],
            "Manifest has gaps, the output will skip the missing segments"
        );
    }

    let path = storage.path().join(manifest_file_name(asset_id));
    let body = render(paths.iter().map(PathBuf::as_path));
    storage.write_read_only(&path, body.as_bytes()).await?;
    debug!(path = %path.display(), entries = entries.len(), "Wrote concat manifest");

    Ok(Manifest {
        path,
        entries,
        missing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_single_quoted() {
        let body = render([Path::new("/tmp/a_0.ts"), Path::new("/tmp/it's/a_1.ts")]);
        assert_eq!(body, "file '/tmp/a_0.ts'\nfile '/tmp/it'\\''s/a_1.ts'\n");
    }

    #[tokio::test]
    async fn lists_persisted_segments_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ScopedStorage::new(dir.path()).unwrap();
        for index in [2, 3, 4] {
            storage.write_segment("42", index, b"x").await.unwrap();
        }

        let manifest = build_manifest(&storage, "42", SegmentRange::new(2, 3))
            .await
            .unwrap();

        assert_eq!(manifest.path, storage.path().join("42_concat.txt"));
        assert_eq!(manifest.entries, vec![2, 3, 4]);
        assert!(manifest.missing.is_empty());
        let permissions = tokio::fs::metadata(&manifest.path).await.unwrap().permissions();
        assert!(permissions.readonly());

        let body = tokio::fs::read_to_string(&manifest.path).await.unwrap();
        let lines: Vec<_> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        for (line, index) in lines.iter().zip(2..) {
            let expected = storage.segment_path("42", index);
            assert_eq!(*line, format!("file '{}'", expected.display()));
        }
    }

    #[tokio::test]
    async fn gaps_are_skipped_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ScopedStorage::new(dir.path()).unwrap();
        storage.write_segment("42", 0, b"x").await.unwrap();
        storage.write_segment("42", 2, b"x").await.unwrap();

        let manifest = build_manifest(&storage, "42", SegmentRange::new(0, 3))
            .await
            .unwrap();

        assert_eq!(manifest.entries, vec![0, 2]);
        assert_eq!(manifest.missing, vec![1]);
        let body = tokio::fs::read_to_string(&manifest.path).await.unwrap();
        assert_eq!(body.lines().count(), 2);
    }

    #[tokio::test]
    async fn empty_range_writes_empty_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ScopedStorage::new(dir.path()).unwrap();

        let manifest = build_manifest(&storage, "42", SegmentRange::new(5, 0))
            .await
            .unwrap();
        assert!(manifest.is_empty());
        assert_eq!(tokio::fs::read_to_string(&manifest.path).await.unwrap(), "");
    }
}
