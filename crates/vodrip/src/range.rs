//! Translate a [`TimeWindow`] into the slice of segments that covers it.
//!
//! Two estimators exist. The precise one walks the advertised per-segment durations and is
//! used whenever there is exactly one duration per segment. Otherwise the uniform one assumes
//! every segment lasts the playlist's target duration, which may be off by one segment at
//! either boundary. The two are never reconciled.

use std::fmt;

use crate::model::MediaPlaylist;
use crate::time::TimeWindow;

/// Contiguous run of segment indices, `[start_index, start_index + count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRange {
    pub start_index: usize,
    pub count: usize,
}

impl SegmentRange {
    pub const fn new(start_index: usize, count: usize) -> Self {
        Self { start_index, count }
    }

    pub fn end_index(&self) -> usize {
        self.start_index + self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Shrink the range so it never reaches past `total` segments.
    fn clamp(self, total: usize) -> Self {
        if self.start_index >= total {
            return Self::new(self.start_index, 0);
        }
        Self::new(self.start_index, self.count.min(total - self.start_index))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Estimator<'a> {
    /// Every segment is assumed to last the target duration (seconds, > 0)
    Uniform { target_duration: u64 },
    /// One duration per segment
    Precise(&'a [f64]),
}

impl Estimator<'_> {
    /// Precise when the playlist carries one duration per segment, uniform otherwise.
    pub fn for_playlist(playlist: &MediaPlaylist) -> Estimator<'_> {
        match playlist.precise_durations() {
            Some(durations) => Estimator::Precise(durations),
            None => Estimator::Uniform {
                target_duration: playlist.target_duration,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Uniform { .. } => "uniform",
            Self::Precise(_) => "precise",
        }
    }
}

impl fmt::Display for Estimator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compute the segment range for `window` over a playlist of `total` segments.
pub fn calculate(window: &TimeWindow, total: usize, estimator: Estimator<'_>) -> SegmentRange {
    let Some(end) = window.end_seconds() else {
        return SegmentRange::new(0, total);
    };
    let start = window.start_seconds();

    let range = match estimator {
        Estimator::Uniform { target_duration } => uniform(start, end, target_duration),
        Estimator::Precise(durations) => precise(start, end, durations),
    };
    range.clamp(total)
}

/// Convenience over [`calculate`] that picks the estimator from the playlist.
pub fn plan<'a>(
    window: &TimeWindow,
    playlist: &'a MediaPlaylist,
) -> (SegmentRange, Estimator<'a>) {
    let estimator = Estimator::for_playlist(playlist);
    (calculate(window, playlist.len(), estimator), estimator)
}

fn uniform(start: u64, end: u64, target_duration: u64) -> SegmentRange {
    let target = target_duration.max(1);
    let start_index = usize::try_from(start / target).unwrap_or(usize::MAX);
    let count = usize::try_from((end - start) / target)
        .unwrap_or(usize::MAX)
        .saturating_add(1);
    SegmentRange::new(start_index, count)
}

fn precise(start: u64, end: u64, durations: &[f64]) -> SegmentRange {
    let start_secs = start as f64;
    let span = (end - start) as f64;

    let mut sum = 0.0;
    let mut first = None;
    for (index, duration) in durations.iter().enumerate() {
        let before = sum;
        sum += duration;
        if sum > start_secs {
            first = Some((index, start_secs - before));
            break;
        }
    }
    // Start lies past the last segment: nothing to fetch.
    let Some((start_index, rest)) = first else {
        return SegmentRange::new(durations.len(), 0);
    };

    let remaining = durations.len() - start_index;
    let goal = rest + span;
    let mut sum = 0.0;
    for (offset, duration) in durations[start_index..].iter().enumerate() {
        sum += duration;
        if sum > goal {
            // boundary segment plus one guard segment past it
            return SegmentRange::new(start_index, (offset + 2).min(remaining));
        }
    }
    SegmentRange::new(start_index, remaining)
}
