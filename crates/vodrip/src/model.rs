//! Plain data shared by the selector, the range calculator and the fetch manager.

use std::path::PathBuf;

use crate::error::VodError;

/// Label of the "source" variant; asking for it means "best the origin has".
pub const SOURCE_QUALITY: &str = "chunked";

/// One quality of the asset and the playlist that lists its segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDescriptor {
    pub quality_label: String,
    pub playlist_url: String,
}

impl VariantDescriptor {
    pub fn new(quality_label: impl Into<String>, playlist_url: impl Into<String>) -> Self {
        Self {
            quality_label: quality_label.into(),
            playlist_url: playlist_url.into(),
        }
    }
}

/// Segment listing of one variant.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPlaylist {
    /// Nominal per-segment duration in whole seconds, always > 0
    pub target_duration: u64,
    /// Segment names in playback order
    pub segments: Vec<String>,
    /// Per-segment durations as advertised. May be empty or shorter than `segments`.
    pub durations: Vec<f64>,
}

impl MediaPlaylist {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Durations usable for exact range calculation: only when there is one per segment.
    pub fn precise_durations(&self) -> Option<&[f64]> {
        (!self.durations.is_empty() && self.durations.len() == self.segments.len())
            .then_some(self.durations.as_slice())
    }

    /// Enumerate the download work for `[start_index, start_index + count)`.
    pub fn tasks(&self, start_index: usize, count: usize) -> Vec<DownloadTask> {
        self.segments
            .iter()
            .enumerate()
            .skip(start_index)
            .take(count)
            .map(|(index, name)| DownloadTask::new(index, name.clone()))
            .collect()
    }
}

/// One segment scheduled for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// Position of the segment in the media playlist
    pub segment_index: usize,
    pub segment_name: String,
}

impl DownloadTask {
    pub fn new(segment_index: usize, segment_name: impl Into<String>) -> Self {
        Self {
            segment_index,
            segment_name: segment_name.into(),
        }
    }
}

/// How a single [`DownloadTask`] ended.
#[derive(Debug)]
pub enum TaskOutcome {
    /// Bytes were persisted to `path`
    Completed {
        index: usize,
        path: PathBuf,
        bytes: u64,
    },
    /// The origin refused the segment; the batch carries on without it
    Dropped { index: usize, reason: String },
    /// Retries were exhausted; the whole batch is aborted
    Failed { index: usize, error: VodError },
}

impl TaskOutcome {
    pub fn index(&self) -> usize {
        match self {
            Self::Completed { index, .. } | Self::Dropped { index, .. } | Self::Failed { index, .. } => {
                *index
            }
        }
    }
}
