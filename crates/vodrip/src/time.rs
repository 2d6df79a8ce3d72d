//! User supplied time offsets (`1h10m10s`) and the window they describe.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::error::VodError;

static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$").expect("timestamp regex is valid")
});

/// Parse an offset such as `1h10m10s`, `15m21s`, `2h` or `33s` into seconds.
///
/// Units must appear in hour, minute, second order and each at most once. Minutes and
/// seconds above 59 are rejected rather than carried into the next unit.
pub fn parse_timestamp(input: &str) -> Result<u64, VodError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(VodError::validation(input, "empty time"));
    }

    let caps = TIMESTAMP_RE
        .captures(trimmed)
        .ok_or_else(|| VodError::validation(input, "unknown time format"))?;

    let field = |idx: usize| -> Result<Option<u64>, VodError> {
        caps.get(idx)
            .map(|m| {
                m.as_str()
                    .parse::<u64>()
                    .map_err(|e| VodError::validation(input, e.to_string()))
            })
            .transpose()
    };

    let hours = field(1)?;
    let minutes = field(2)?;
    let seconds = field(3)?;

    if hours.is_none() && minutes.is_none() && seconds.is_none() {
        return Err(VodError::validation(input, "unknown time format"));
    }
    if minutes.is_some_and(|m| m > 59) {
        return Err(VodError::validation(input, "more than 59 minutes in 1 hour"));
    }
    if seconds.is_some_and(|s| s > 59) {
        return Err(VodError::validation(input, "more than 59 seconds in 1 minute"));
    }

    hours
        .unwrap_or(0)
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes.unwrap_or(0) * 60))
        .and_then(|hm| hm.checked_add(seconds.unwrap_or(0)))
        .ok_or_else(|| VodError::validation(input, "time is out of range"))
}

/// The part of the asset to download, in seconds from its beginning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start_seconds: u64,
    end_seconds: Option<u64>,
}

impl TimeWindow {
    /// The whole asset.
    pub const fn unbounded() -> Self {
        Self {
            start_seconds: 0,
            end_seconds: None,
        }
    }

    pub fn bounded(start_seconds: u64, end_seconds: u64) -> Result<Self, VodError> {
        if end_seconds < start_seconds {
            return Err(VodError::validation(
                format!("{start_seconds}s..{end_seconds}s"),
                "end time is before start time",
            ));
        }
        Ok(Self {
            start_seconds,
            end_seconds: Some(end_seconds),
        })
    }

    /// Build a window from raw user input.
    ///
    /// Without an end the whole asset is downloaded and any start is ignored.
    pub fn from_inputs(start: Option<&str>, end: Option<&str>) -> Result<Self, VodError> {
        match (start, end) {
            (start, None) => {
                if let Some(start) = start {
                    // still reject garbage even though it goes unused
                    parse_timestamp(start)?;
                    warn!(start, "Start time given without an end time, downloading the full VOD");
                }
                Ok(Self::unbounded())
            }
            (start, Some(end)) => {
                let start = start.map(parse_timestamp).transpose()?.unwrap_or(0);
                Self::bounded(start, parse_timestamp(end)?)
            }
        }
    }

    pub fn start_seconds(&self) -> u64 {
        self.start_seconds
    }

    pub fn end_seconds(&self) -> Option<u64> {
        self.end_seconds
    }

    pub fn is_unbounded(&self) -> bool {
        self.end_seconds.is_none()
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end_seconds {
            Some(end) => write!(f, "{}s..{}s", self.start_seconds, end),
            None => f.write_str("full"),
        }
    }
}
