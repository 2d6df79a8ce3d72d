// In-memory stand-ins for the network seams.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::StatusCode;
use url::Url;

use crate::error::VodError;
use crate::fetch::SegmentDownloader;
use crate::model::{MediaPlaylist, VariantDescriptor};
use crate::origin::PlaylistProvider;

pub(crate) const PLAYLIST_URL: &str = "https://vod.example.net/abc/chunked/index-dvr.m3u8";

/// Scripted answer for one attempt.
#[derive(Debug, Clone)]
pub(crate) enum MockReply {
    Body(Bytes),
    Status(StatusCode),
    Transport,
}

impl MockReply {
    pub(crate) fn body(text: &str) -> Self {
        Self::Body(Bytes::copy_from_slice(text.as_bytes()))
    }
}

/// Replays scripted replies per segment file name, then answers with a default body.
/// Tracks call counts and the peak number of concurrent calls.
#[derive(Default)]
pub(crate) struct MockSegmentDownloader {
    scripts: Mutex<HashMap<String, VecDeque<MockReply>>>,
    calls: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Duration,
}

impl MockSegmentDownloader {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn script(self, name: &str, replies: Vec<MockReply>) -> Self {
        self.scripts.lock().insert(name.to_string(), replies.into());
        self
    }

    pub(crate) fn calls(&self, name: &str) -> usize {
        self.calls.lock().get(name).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SegmentDownloader for MockSegmentDownloader {
    async fn download_segment(&self, url: &Url) -> Result<Bytes, VodError> {
        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string();

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        *self.calls.lock().entry(name.clone()).or_default() += 1;

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let reply = self
            .scripts
            .lock()
            .get_mut(&name)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| MockReply::body(&format!("segment {name}")));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            MockReply::Body(bytes) => Ok(bytes),
            MockReply::Status(status) => Err(VodError::http_status(status, url.as_str(), "segment fetch")),
            MockReply::Transport => Err(VodError::transport("connection reset by peer")),
        }
    }
}

/// Serves a fixed variant list and media playlists keyed by URL.
#[derive(Default)]
pub(crate) struct MockPlaylistProvider {
    variants: Vec<VariantDescriptor>,
    playlists: HashMap<String, MediaPlaylist>,
}

impl MockPlaylistProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn variant(mut self, label: &str, playlist_url: &str, playlist: MediaPlaylist) -> Self {
        self.variants.push(VariantDescriptor::new(label, playlist_url));
        self.playlists.insert(playlist_url.to_string(), playlist);
        self
    }
}

#[async_trait]
impl PlaylistProvider for MockPlaylistProvider {
    async fn resolve_variants(&self, _asset_id: &str) -> Result<Vec<VariantDescriptor>, VodError> {
        Ok(self.variants.clone())
    }

    async fn load_media_playlist(&self, playlist_url: &str) -> Result<MediaPlaylist, VodError> {
        self.playlists
            .get(playlist_url)
            .cloned()
            .ok_or_else(|| VodError::http_status(StatusCode::NOT_FOUND, playlist_url, "media playlist"))
    }
}

/// `count` segments named `0.ts`, `1.ts`, ... of 10 seconds each.
pub(crate) fn media_playlist(count: usize) -> MediaPlaylist {
    MediaPlaylist {
        target_duration: 10,
        segments: (0..count).map(|i| format!("{i}.ts")).collect(),
        durations: vec![10.0; count],
    }
}
