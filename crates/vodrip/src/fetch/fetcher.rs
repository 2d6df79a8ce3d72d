// Segment fetcher: one HTTP GET per attempt, classified into the error taxonomy.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::{instrument, trace};
use url::Url;

use crate::error::VodError;

/// Transfers the raw bytes of a single segment. One call is one attempt; retries are the
/// caller's business.
#[async_trait]
pub trait SegmentDownloader: Send + Sync {
    /// Errors must be classified: [`VodError::HttpStatus`] when the origin answered with a
    /// non-success status, a retryable error when the transfer itself broke.
    async fn download_segment(&self, url: &Url) -> Result<Bytes, VodError>;
}

pub struct HttpSegmentDownloader {
    client: Client,
}

impl HttpSegmentDownloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SegmentDownloader for HttpSegmentDownloader {
    #[instrument(skip(self), fields(url = %url), level = "trace")]
    async fn download_segment(&self, url: &Url) -> Result<Bytes, VodError> {
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(VodError::http_status(status, url.as_str(), "segment fetch"));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| VodError::transport(format!("failed to read segment body: {e}")))?;
        trace!(size = bytes.len(), "Segment body received");
        Ok(bytes)
    }
}

/// Directory of a variant playlist URL, against which segment names resolve.
///
/// `https://host/a/chunked/index-dvr.m3u8?x=1` becomes `https://host/a/chunked/`.
pub fn base_url(playlist_url: &str) -> Result<Url, VodError> {
    let url = Url::parse(playlist_url)
        .map_err(|e| VodError::invalid_url(playlist_url, e.to_string()))?;
    url.join("./")
        .map_err(|e| VodError::invalid_url(playlist_url, e.to_string()))
}

/// Resolve a segment name against the variant's base URL.
pub fn segment_url(base: &Url, segment_name: &str) -> Result<Url, VodError> {
    base.join(segment_name)
        .map_err(|e| VodError::invalid_url(segment_name, e.to_string()))
}
