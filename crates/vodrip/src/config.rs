use std::time::Duration;

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, info};

use crate::encoder::EncoderConfig;
use crate::error::VodError;
use crate::fetch::RetryPolicy;
use crate::origin::OriginEndpoints;
use crate::proxy::{ProxyConfig, build_proxy};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

/// Number of segment transfers allowed in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// HTTP options shared by every request the engine makes.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Overall timeout for a single HTTP request (zero disables it)
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    pub follow_redirects: bool,

    pub user_agent: String,

    /// Custom HTTP headers for requests
    pub headers: HeaderMap,

    /// Proxy configuration (optional)
    pub proxy: Option<ProxyConfig>,

    /// Whether to use system proxy settings if available
    pub use_system_proxy: bool,

    /// Maximum idle connections to keep per host
    pub pool_max_idle_per_host: usize,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(0),
            connect_timeout: Duration::from_secs(30),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: DownloaderConfig::get_default_headers(),
            proxy: None,
            use_system_proxy: true,
            pool_max_idle_per_host: DEFAULT_CONCURRENCY,
        }
    }
}

impl DownloaderConfig {
    pub fn builder() -> crate::builder::DownloaderConfigBuilder {
        crate::builder::DownloaderConfigBuilder::new()
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate"),
        );

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));

        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );
        default_headers
    }
}

/// Everything one download run needs, passed explicitly to each component entry point.
#[derive(Debug, Clone)]
pub struct VodConfig {
    pub downloader: DownloaderConfig,

    /// Size of the fetch worker pool and of the admission gate
    pub concurrency: usize,

    pub retry: RetryPolicy,

    pub endpoints: OriginEndpoints,

    pub encoder: EncoderConfig,

    /// Emit per-request diagnostics (dropped segments, retry attempts, raw origin data)
    pub verbose: bool,

    /// Log the elapsed time of every phase
    pub timing: bool,
}

impl Default for VodConfig {
    fn default() -> Self {
        Self {
            downloader: DownloaderConfig::default(),
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            endpoints: OriginEndpoints::default(),
            encoder: EncoderConfig::default(),
            verbose: false,
            timing: false,
        }
    }
}

impl VodConfig {
    pub fn validate(&self) -> Result<(), VodError> {
        if self.concurrency == 0 {
            return Err(VodError::configuration("concurrency must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(VodError::configuration(
                "segment retry policy must allow at least one attempt",
            ));
        }
        Ok(())
    }
}

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &DownloaderConfig) -> Result<Client, VodError> {
    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    if let Some(proxy_config) = &config.proxy {
        // Explicit proxy configuration takes precedence
        client_builder = client_builder.proxy(build_proxy(proxy_config)?);
        info!(proxy_url = %proxy_config.url, "Using explicitly configured proxy");
    } else if config.use_system_proxy {
        debug!("Using system proxy settings");
    } else {
        client_builder = client_builder.no_proxy();
        debug!("Proxy disabled");
    }

    client_builder.build().map_err(VodError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = VodConfig::default();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.retry.max_attempts, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = VodConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(VodError::Configuration { .. })
        ));
    }

    #[test]
    fn client_builds_from_defaults() {
        assert!(create_client(&DownloaderConfig::default()).is_ok());
    }
}
