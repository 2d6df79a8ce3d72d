use reqwest::Proxy;

use crate::error::VodError;

/// Proxy flavours understood by [`build_proxy`].
#[derive(Debug, Clone, PartialEq, Eq, Copy, Default)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ProxyType {
    #[default]
    Http,
    Https,
    Socks5,
}

#[derive(Debug, Clone)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

/// Proxy configuration
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Proxy server URL (e.g., "http://proxy.example.com:8080")
    pub url: String,
    pub proxy_type: ProxyType,
    pub auth: Option<ProxyAuth>,
}

impl ProxyConfig {
    pub fn new(url: impl Into<String>, proxy_type: ProxyType) -> Self {
        Self {
            url: url.into(),
            proxy_type,
            auth: None,
        }
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(ProxyAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Normalised proxy URL. SOCKS5 proxies without a scheme get `socks5://` prepended.
    fn effective_url(&self) -> String {
        match self.proxy_type {
            ProxyType::Socks5
                if !(self.url.starts_with("socks5://") || self.url.starts_with("socks5h://")) =>
            {
                format!("socks5://{}", self.url)
            }
            _ => self.url.clone(),
        }
    }
}

/// Build a reqwest [`Proxy`] from our proxy configuration.
pub fn build_proxy(config: &ProxyConfig) -> Result<Proxy, VodError> {
    let url = config.effective_url();

    let proxy = match config.proxy_type {
        ProxyType::Http => Proxy::http(&url),
        ProxyType::Https => Proxy::https(&url),
        ProxyType::Socks5 => Proxy::all(&url),
    }
    .map_err(|e| VodError::ProxyConfiguration {
        reason: format!("invalid {:?} proxy URL `{url}`: {e}", config.proxy_type),
    })?;

    Ok(match &config.auth {
        Some(auth) => proxy.basic_auth(&auth.username, &auth.password),
        None => proxy,
    })
}
