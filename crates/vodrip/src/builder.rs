use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};
use tracing::warn;

use crate::config::DownloaderConfig;
use crate::proxy::ProxyConfig;

/// Fluent builder for [`DownloaderConfig`].
#[derive(Debug, Clone, Default)]
pub struct DownloaderConfigBuilder {
    config: DownloaderConfig,
}

impl DownloaderConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add or replace a default header. Invalid names or values are logged and ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.config.headers.insert(name, value);
            }
            _ => warn!(header = name, "Ignoring invalid header"),
        }
        self
    }

    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.config.proxy = Some(proxy);
        self
    }

    pub fn with_system_proxy(mut self, use_system_proxy: bool) -> Self {
        self.config.use_system_proxy = use_system_proxy;
        self
    }

    pub fn with_pool_max_idle_per_host(mut self, max_idle: usize) -> Self {
        self.config.pool_max_idle_per_host = max_idle;
        self
    }

    pub fn build(self) -> DownloaderConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ProxyType;

    #[test]
    fn builder_overrides_defaults() {
        let config = DownloaderConfig::builder()
            .with_user_agent("vodrip-test")
            .with_timeout(Duration::from_secs(5))
            .with_header("referer", "https://www.twitch.tv/")
            .with_proxy(ProxyConfig::new("http://127.0.0.1:8080", ProxyType::Http))
            .build();

        assert_eq!(config.user_agent, "vodrip-test");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(
            config.headers.get("referer").map(|v| v.to_str().unwrap()),
            Some("https://www.twitch.tv/")
        );
        assert!(config.proxy.is_some());
    }

    #[test]
    fn invalid_header_is_ignored() {
        let before = DownloaderConfig::default().headers.len();
        let config = DownloaderConfig::builder()
            .with_header("bad header", "x")
            .build();
        assert_eq!(config.headers.len(), before);
    }
}
