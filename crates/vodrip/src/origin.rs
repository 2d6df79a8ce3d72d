//! Origin API client: token exchange, variant listing, media playlists and video metadata.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::VodError;
use crate::model::{MediaPlaylist, VariantDescriptor};
use crate::playlist::{parse_master, parse_media};

const ID_PLACEHOLDER: &str = "{id}";

/// Where the origin lives. `{id}` in a URL template is replaced with the asset ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginEndpoints {
    pub client_id: String,
    /// Access token exchange; `client_id` is appended as a query parameter
    pub token_url: String,
    /// Master playlist listing; token, signature and `allow_source` are appended
    pub usher_url: String,
    /// Video metadata lookup; the asset ID is passed as `id`
    pub video_info_url: String,
}

impl Default for OriginEndpoints {
    fn default() -> Self {
        Self {
            client_id: "o4m8ilgpeewree25zlyzr1noba1j7t".to_string(),
            token_url: "https://api.twitch.tv/api/vods/{id}/access_token".to_string(),
            usher_url: "http://usher.twitch.tv/vod/{id}".to_string(),
            video_info_url: "https://api.twitch.tv/helix/videos".to_string(),
        }
    }
}

impl OriginEndpoints {
    fn expand(template: &str, asset_id: &str) -> String {
        template.replace(ID_PLACEHOLDER, asset_id)
    }
}

/// Source of variant and media playlists for an asset.
#[async_trait]
pub trait PlaylistProvider: Send + Sync {
    /// List the quality variants of `asset_id`, in listing order.
    async fn resolve_variants(&self, asset_id: &str) -> Result<Vec<VariantDescriptor>, VodError>;

    async fn load_media_playlist(&self, playlist_url: &str) -> Result<MediaPlaylist, VodError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub sig: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VideoInfo {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub view_count: u64,
    pub user_id: String,
    pub duration: String,
    pub created_at: Option<DateTime<Utc>>,
    pub viewable: String,
    pub language: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct VideoInfoResponse {
    #[serde(default)]
    data: Vec<VideoInfo>,
}

fn title_case(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl fmt::Display for VideoInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let created = self
            .created_at
            .map(|at| at.format("%m/%d/%Y %H:%M").to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        let description = if self.description.trim().is_empty() {
            "Empty"
        } else {
            self.description.as_str()
        };

        writeln!(f, "Title: {}", self.title)?;
        writeln!(f, "Type: {}", title_case(&self.kind))?;
        writeln!(f, "Views: {}", self.view_count)?;
        writeln!(f, "Streamer ID: {}", self.user_id)?;
        writeln!(f, "Full duration: {}", self.duration)?;
        writeln!(f, "Created at: {created}")?;
        writeln!(f, "Viewable by: {}", title_case(&self.viewable))?;
        writeln!(f, "Video language: {}", title_case(&self.language))?;
        write!(f, "Description: {description}")
    }
}

/// Production [`PlaylistProvider`] backed by the Twitch APIs.
pub struct TwitchOrigin {
    client: Client,
    endpoints: OriginEndpoints,
    verbose: bool,
}

impl TwitchOrigin {
    pub fn new(client: Client, endpoints: OriginEndpoints) -> Self {
        Self {
            client,
            endpoints,
            verbose: false,
        }
    }

    /// Log raw origin responses at debug level.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    async fn read_text(
        &self,
        request: reqwest::RequestBuilder,
        operation: &'static str,
    ) -> Result<String, VodError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(VodError::http_status(
                status,
                response.url().as_str(),
                operation,
            ));
        }
        let body = response.text().await?;
        if self.verbose {
            debug!(operation, body = %body, "Origin response");
        }
        Ok(body)
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn access_token(&self, asset_id: &str) -> Result<AccessToken, VodError> {
        let url = OriginEndpoints::expand(&self.endpoints.token_url, asset_id);
        let request = self
            .client
            .get(&url)
            .query(&[("client_id", self.endpoints.client_id.as_str())]);
        let body = self.read_text(request, "token exchange").await?;

        let token: AccessToken = serde_json::from_str(&body)
            .map_err(|e| VodError::decode(format!("access token response: {e}")))?;
        debug!(sig = %token.sig, "Received access token");
        Ok(token)
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn video_info(&self, asset_id: &str) -> Result<VideoInfo, VodError> {
        let request = self
            .client
            .get(&self.endpoints.video_info_url)
            .query(&[("id", asset_id)])
            .header("Client-ID", &self.endpoints.client_id);
        let body = self.read_text(request, "video info").await?;

        let response: VideoInfoResponse = serde_json::from_str(&body)
            .map_err(|e| VodError::decode(format!("video info response: {e}")))?;
        response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| VodError::decode(format!("no video with id {asset_id}")))
    }
}

#[async_trait]
impl PlaylistProvider for TwitchOrigin {
    #[instrument(skip(self), level = "debug")]
    async fn resolve_variants(&self, asset_id: &str) -> Result<Vec<VariantDescriptor>, VodError> {
        let token = self.access_token(asset_id).await?;

        let url = OriginEndpoints::expand(&self.endpoints.usher_url, asset_id);
        let request = self.client.get(&url).query(&[
            ("nauthsig", token.sig.as_str()),
            ("nauth", token.token.as_str()),
            ("allow_source", "true"),
        ]);
        let body = self.read_text(request, "variant listing").await?;

        let variants = parse_master(&body)?;
        for variant in &variants {
            debug!(quality = %variant.quality_label, url = %variant.playlist_url, "Variant");
        }
        Ok(variants)
    }

    #[instrument(skip(self), level = "debug")]
    async fn load_media_playlist(&self, playlist_url: &str) -> Result<MediaPlaylist, VodError> {
        let body = self
            .read_text(self.client.get(playlist_url), "media playlist")
            .await?;
        parse_media(&body)
    }
}
