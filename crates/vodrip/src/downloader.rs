//! Orchestration of one download: connect, select, plan, fetch, manifest, encode.
//!
//! Each phase is entered only if the cancellation token has not fired, and every failure is
//! tagged with the phase it happened in so the caller can report it in one place.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use crate::config::{VodConfig, create_client};
use crate::encoder::ConcatEncoder;
use crate::error::VodError;
use crate::fetch::{
    FetchBatch, FetchManager, FetchReport, HttpSegmentDownloader, ProgressCallback,
    SegmentDownloader, base_url,
};
use crate::manifest::{Manifest, build_manifest};
use crate::model::{DownloadTask, MediaPlaylist};
use crate::origin::{PlaylistProvider, TwitchOrigin};
use crate::quality::{Selection, SelectionPath, select_variant};
use crate::range::{self, SegmentRange};
use crate::storage::ScopedStorage;
use crate::time::TimeWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connect,
    Select,
    Plan,
    Fetch,
    Manifest,
    Encode,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connect => "connect",
            Self::Select => "select",
            Self::Plan => "plan",
            Self::Fetch => "fetch",
            Self::Manifest => "manifest",
            Self::Encode => "encode",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{phase} phase failed: {source}")]
pub struct PhaseError {
    pub phase: Phase,
    #[source]
    pub source: VodError,
}

impl PhaseError {
    pub fn new(phase: Phase, source: VodError) -> Self {
        Self { phase, source }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.source, VodError::Cancelled)
    }
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub asset_id: String,
    /// Requested quality label; `chunked` means source
    pub quality: String,
    pub window: TimeWindow,
}

/// What will be fetched, decided before any segment is downloaded.
#[derive(Debug, Clone)]
pub struct DownloadPlan {
    pub asset_id: String,
    pub selection: Selection,
    pub playlist: MediaPlaylist,
    pub base_url: Url,
    pub range: SegmentRange,
    /// Name of the estimator that produced `range`
    pub estimator: &'static str,
}

impl DownloadPlan {
    pub fn tasks(&self) -> Vec<DownloadTask> {
        self.playlist.tasks(self.range.start_index, self.range.count)
    }

    /// True when the window lies past the end of the VOD.
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

#[derive(Debug)]
pub struct DownloadReport {
    pub plan: DownloadPlan,
    pub fetch: FetchReport,
    /// `None` when the plan was empty and nothing was fetched
    pub manifest: Option<Manifest>,
    pub output: Option<PathBuf>,
    pub elapsed: Duration,
}

pub struct VodDownloader {
    config: VodConfig,
    provider: Arc<dyn PlaylistProvider>,
    fetcher: FetchManager,
    encoder: ConcatEncoder,
}

impl VodDownloader {
    /// Build a downloader talking to the configured origin over HTTP.
    pub fn new(config: VodConfig) -> Result<Self, VodError> {
        config.validate()?;
        let client = create_client(&config.downloader)?;
        let origin =
            TwitchOrigin::new(client.clone(), config.endpoints.clone()).with_verbose(config.verbose);
        Ok(Self::with_components(
            config,
            Arc::new(origin),
            Arc::new(HttpSegmentDownloader::new(client)),
        ))
    }

    pub fn with_components(
        config: VodConfig,
        provider: Arc<dyn PlaylistProvider>,
        downloader: Arc<dyn SegmentDownloader>,
    ) -> Self {
        let fetcher = FetchManager::new(downloader, config.concurrency, config.retry.clone());
        let encoder = ConcatEncoder::new(config.encoder.clone());
        Self {
            config,
            provider,
            fetcher,
            encoder,
        }
    }

    pub fn config(&self) -> &VodConfig {
        &self.config
    }

    pub fn encoder(&self) -> &ConcatEncoder {
        &self.encoder
    }

    async fn timed<T>(
        &self,
        phase: Phase,
        token: &CancellationToken,
        operation: impl Future<Output = Result<T, VodError>>,
    ) -> Result<T, PhaseError> {
        if token.is_cancelled() {
            return Err(PhaseError::new(phase, VodError::Cancelled));
        }
        let started = Instant::now();
        let result = operation.await.map_err(|e| PhaseError::new(phase, e));
        if self.config.timing {
            info!(phase = %phase, elapsed = ?started.elapsed(), "Phase finished");
        }
        result
    }

    /// Resolve variants, pick one and work out which segments cover the window.
    pub async fn plan(
        &self,
        request: &DownloadRequest,
        token: &CancellationToken,
    ) -> Result<DownloadPlan, PhaseError> {
        let variants = self
            .timed(
                Phase::Connect,
                token,
                cancellable(token, self.provider.resolve_variants(&request.asset_id)),
            )
            .await?;
        info!(variants = variants.len(), "Connected to origin");

        let selection = self
            .timed(Phase::Select, token, async {
                select_variant(&variants, &request.quality)
            })
            .await?;
        match selection.path {
            SelectionPath::Exact => {
                info!(quality = selection.display_label(), "Selected requested quality");
            }
            SelectionPath::SourceFallback | SelectionPath::BestAvailable => warn!(
                requested = %request.quality,
                quality = selection.display_label(),
                via = %selection.path,
                "Requested quality is not available"
            ),
        }

        let (playlist, base_url) = self
            .timed(
                Phase::Plan,
                token,
                cancellable(token, async {
                    let base = base_url(&selection.playlist_url)?;
                    let playlist = self
                        .provider
                        .load_media_playlist(&selection.playlist_url)
                        .await?;
                    Ok::<_, VodError>((playlist, base))
                }),
            )
            .await?;

        if request.window.is_unbounded() {
            info!("No time window given, downloading the full VOD");
        }
        let (range, estimator) = range::plan(&request.window, &playlist);
        let estimator = estimator.name();
        if range.is_empty() {
            warn!(
                window = %request.window,
                total = playlist.len(),
                "Time window starts after the end of the VOD, nothing to download"
            );
        }
        info!(
            start_index = range.start_index,
            count = range.count,
            total = playlist.len(),
            estimator,
            "Planned segment range"
        );

        Ok(DownloadPlan {
            asset_id: request.asset_id.clone(),
            selection,
            playlist,
            base_url,
            range,
            estimator,
        })
    }

    /// Fetch the planned segments into `storage` and write the concat manifest.
    ///
    /// An empty plan is a no-op: nothing is fetched and no manifest is written.
    pub async fn fetch(
        &self,
        plan: &DownloadPlan,
        storage: &ScopedStorage,
        token: &CancellationToken,
        on_progress: Option<ProgressCallback>,
    ) -> Result<(FetchReport, Option<Manifest>), PhaseError> {
        if plan.is_empty() {
            info!("No segments planned, skipping fetch");
            return Ok((FetchReport::default(), None));
        }
        let batch = FetchBatch {
            asset_id: plan.asset_id.clone(),
            base_url: plan.base_url.clone(),
            tasks: plan.tasks(),
        };
        let report = self
            .timed(
                Phase::Fetch,
                token,
                self.fetcher.fetch(batch, storage, token, on_progress),
            )
            .await?;

        let manifest = self
            .timed(
                Phase::Manifest,
                token,
                build_manifest(storage, &plan.asset_id, plan.range),
            )
            .await?;
        if manifest.is_empty() {
            return Err(PhaseError::new(
                Phase::Manifest,
                VodError::decode("none of the planned segments could be downloaded"),
            ));
        }
        Ok((report, Some(manifest)))
    }

    pub async fn encode(
        &self,
        plan: &DownloadPlan,
        manifest: &Manifest,
        token: &CancellationToken,
    ) -> Result<PathBuf, PhaseError> {
        self.timed(
            Phase::Encode,
            token,
            self.encoder.encode(&manifest.path, &plan.asset_id, token),
        )
        .await
    }

    /// Run every phase. Segments land in `storage`, which the caller discards afterwards.
    pub async fn run(
        &self,
        request: &DownloadRequest,
        storage: &ScopedStorage,
        token: &CancellationToken,
        on_progress: Option<ProgressCallback>,
    ) -> Result<DownloadReport, PhaseError> {
        let started = Instant::now();

        let plan = self.plan(request, token).await?;
        let (fetch, manifest) = self.fetch(&plan, storage, token, on_progress).await?;
        let output = match &manifest {
            Some(manifest) => Some(self.encode(&plan, manifest, token).await?),
            None => None,
        };

        let elapsed = started.elapsed();
        if self.config.timing {
            info!(elapsed = ?elapsed, "Download finished");
        }
        Ok(DownloadReport {
            plan,
            fetch,
            manifest,
            output,
            elapsed,
        })
    }
}

/// Race `operation` against the token; used for origin calls that know nothing of it.
async fn cancellable<T>(
    token: &CancellationToken,
    operation: impl Future<Output = Result<T, VodError>>,
) -> Result<T, VodError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(VodError::Cancelled),
        result = operation => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::EncoderConfig;
    use crate::test_support::{
        MockPlaylistProvider, MockReply, MockSegmentDownloader, PLAYLIST_URL, media_playlist,
    };
    use reqwest::StatusCode;

    fn downloader(
        provider: MockPlaylistProvider,
        segments: MockSegmentDownloader,
        output_dir: &std::path::Path,
        binary: &str,
    ) -> VodDownloader {
        let config = VodConfig {
            encoder: EncoderConfig {
                binary: PathBuf::from(binary),
                output_dir: output_dir.to_path_buf(),
            },
            ..Default::default()
        };
        VodDownloader::with_components(config, Arc::new(provider), Arc::new(segments))
    }

    fn request(quality: &str, window: TimeWindow) -> DownloadRequest {
        DownloadRequest {
            asset_id: "123456789".to_string(),
            quality: quality.to_string(),
            window,
        }
    }

    #[tokio::test]
    async fn unbounded_window_fetches_whole_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ScopedStorage::new(dir.path()).unwrap();
        let vod = downloader(
            MockPlaylistProvider::new().variant("chunked", PLAYLIST_URL, media_playlist(6)),
            MockSegmentDownloader::new(),
            dir.path(),
            "ffmpeg",
        );
        let token = CancellationToken::new();

        let plan = vod
            .plan(&request("chunked", TimeWindow::unbounded()), &token)
            .await
            .unwrap();
        assert_eq!(plan.range, SegmentRange::new(0, 6));
        assert_eq!(plan.selection.path, SelectionPath::Exact);

        let (report, manifest) = vod.fetch(&plan, &storage, &token, None).await.unwrap();
        let manifest = manifest.unwrap();
        assert_eq!(report.persisted, (0..6).collect::<Vec<_>>());
        assert_eq!(manifest.entries, (0..6).collect::<Vec<_>>());

        let body = tokio::fs::read_to_string(&manifest.path).await.unwrap();
        let expected: Vec<String> = (0..6)
            .map(|i| format!("file '{}'", storage.segment_path("123456789", i).display()))
            .collect();
        assert_eq!(body.lines().collect::<Vec<_>>(), expected);
    }

    #[tokio::test]
    async fn bounded_window_fetches_only_covering_segments() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ScopedStorage::new(dir.path()).unwrap();
        let segments = MockSegmentDownloader::new();
        let vod = downloader(
            MockPlaylistProvider::new().variant("chunked", PLAYLIST_URL, media_playlist(30)),
            segments,
            dir.path(),
            "ffmpeg",
        );
        let token = CancellationToken::new();

        let window = TimeWindow::bounded(25, 55).unwrap();
        let plan = vod.plan(&request("chunked", window), &token).await.unwrap();
        assert_eq!(plan.estimator, "precise");
        assert_eq!(plan.range.start_index, 2);

        let (report, manifest) = vod.fetch(&plan, &storage, &token, None).await.unwrap();
        assert_eq!(report.persisted.first(), Some(&2));
        assert_eq!(manifest.unwrap().len(), plan.range.count);
    }

    #[tokio::test]
    async fn missing_quality_falls_back_during_planning() {
        let provider = MockPlaylistProvider::new()
            .variant("720p30", "https://vod.example.net/abc/720p30/index-dvr.m3u8", media_playlist(3))
            .variant("chunked", PLAYLIST_URL, media_playlist(3));
        let dir = tempfile::tempdir().unwrap();
        let vod = downloader(provider, MockSegmentDownloader::new(), dir.path(), "ffmpeg");

        let plan = vod
            .plan(&request("1080p60", TimeWindow::unbounded()), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(plan.selection.path, SelectionPath::SourceFallback);
        assert_eq!(plan.base_url.as_str(), "https://vod.example.net/abc/chunked/");
    }

    #[tokio::test]
    async fn no_variants_fails_in_select_phase() {
        let dir = tempfile::tempdir().unwrap();
        let vod = downloader(MockPlaylistProvider::new(), MockSegmentDownloader::new(), dir.path(), "ffmpeg");

        let err = vod
            .plan(&request("chunked", TimeWindow::unbounded()), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.phase, Phase::Select);
        assert!(matches!(err.source, VodError::NoVariants));
    }

    #[tokio::test]
    async fn window_past_end_is_a_no_op() {
        let scratch = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let storage = ScopedStorage::new(scratch.path()).unwrap();
        let segments = Arc::new(MockSegmentDownloader::new());
        let config = VodConfig {
            encoder: EncoderConfig {
                binary: PathBuf::from("ffmpeg-binary-that-does-not-exist"),
                output_dir: output.path().to_path_buf(),
            },
            ..Default::default()
        };
        let vod = VodDownloader::with_components(
            config,
            Arc::new(MockPlaylistProvider::new().variant("chunked", PLAYLIST_URL, media_playlist(3))),
            segments.clone(),
        );

        let window = TimeWindow::bounded(3600, 3700).unwrap();
        let report = vod
            .run(&request("chunked", window), &storage, &CancellationToken::new(), None)
            .await
            .unwrap();

        assert!(report.plan.is_empty());
        assert_eq!(report.fetch, FetchReport::default());
        assert!(report.manifest.is_none());
        assert!(report.output.is_none());
        assert_eq!(segments.total_calls(), 0);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let vod = downloader(
            MockPlaylistProvider::new().variant("chunked", PLAYLIST_URL, media_playlist(3)),
            MockSegmentDownloader::new(),
            dir.path(),
            "ffmpeg",
        );
        let token = CancellationToken::new();
        token.cancel();

        let err = vod
            .plan(&request("chunked", TimeWindow::unbounded()), &token)
            .await
            .unwrap_err();
        assert_eq!(err.phase, Phase::Connect);
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn fully_dropped_range_fails_in_manifest_phase() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ScopedStorage::new(dir.path()).unwrap();
        let segments = MockSegmentDownloader::new()
            .script("0.ts", vec![MockReply::Status(StatusCode::FORBIDDEN)])
            .script("1.ts", vec![MockReply::Status(StatusCode::NOT_FOUND)]);
        let vod = downloader(
            MockPlaylistProvider::new().variant("chunked", PLAYLIST_URL, media_playlist(2)),
            segments,
            dir.path(),
            "ffmpeg",
        );
        let token = CancellationToken::new();

        let plan = vod
            .plan(&request("chunked", TimeWindow::unbounded()), &token)
            .await
            .unwrap();
        let err = vod.fetch(&plan, &storage, &token, None).await.unwrap_err();
        assert_eq!(err.phase, Phase::Manifest);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_hands_manifest_to_encoder() {
        let scratch = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let storage = ScopedStorage::new(scratch.path()).unwrap();
        let vod = downloader(
            MockPlaylistProvider::new().variant("chunked", PLAYLIST_URL, media_playlist(4)),
            MockSegmentDownloader::new(),
            output.path(),
            "true",
        );

        let report = vod
            .run(
                &request("chunked", TimeWindow::unbounded()),
                &storage,
                &CancellationToken::new(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(report.output, Some(output.path().join("123456789.mp4")));
        assert_eq!(report.manifest.map(|m| m.len()), Some(4));
        assert!(report.fetch.is_complete());
    }
}
