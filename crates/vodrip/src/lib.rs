//! Vodrip engine: download a time-bounded slice of a segmented VOD and stitch it together.
//!
//! ## Component Overview
//!
//! - `playlist`: master and media playlist parsing
//! - `quality`: variant selection with source and best-available fallbacks
//! - `time` / `range`: user time window to segment range, with precise and uniform estimators
//! - `fetch`: bounded-concurrency segment downloads with per-segment retry
//! - `storage` / `manifest`: scoped segment files and the concat manifest
//! - `origin`: token exchange, variant listing and video metadata
//! - `encoder`: ffmpeg concat driver
//! - `downloader`: phase orchestration, cancellation and timing

pub mod builder;
pub mod config;
pub mod downloader;
pub mod encoder;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod model;
pub mod origin;
pub mod playlist;
pub mod proxy;
pub mod quality;
pub mod range;
pub mod storage;
pub mod time;

#[cfg(test)]
mod test_support;

pub use builder::DownloaderConfigBuilder;
pub use config::{DownloaderConfig, VodConfig, create_client};
pub use downloader::{DownloadPlan, DownloadReport, DownloadRequest, Phase, PhaseError, VodDownloader};
pub use encoder::{ConcatEncoder, EncoderConfig};
pub use error::{Result, VodError};
pub use fetch::{FetchReport, ProgressCallback, RetryPolicy, SegmentProgress};
pub use manifest::Manifest;
pub use model::{MediaPlaylist, SOURCE_QUALITY, VariantDescriptor};
pub use origin::{OriginEndpoints, PlaylistProvider, TwitchOrigin, VideoInfo};
pub use proxy::{ProxyAuth, ProxyConfig, ProxyType};
pub use quality::{Selection, SelectionPath};
pub use range::SegmentRange;
pub use storage::ScopedStorage;
pub use time::{TimeWindow, parse_timestamp};
