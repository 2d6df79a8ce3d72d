use reqwest::StatusCode;

/// Accepted time formats, shown to the user whenever a timestamp is rejected.
pub const TIME_FORMAT_HINT: &str = "correct format: 1h10m10s, 15m21s or 33s";

#[derive(Debug, thiserror::Error)]
pub enum VodError {
    #[error("download cancelled")]
    Cancelled,

    #[error("invalid time `{input}`: {reason} ({TIME_FORMAT_HINT})")]
    Validation { input: String, reason: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("proxy configuration error: {reason}")]
    ProxyConfiguration { reason: String },

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("transport error: {reason}")]
    Transport { reason: String },

    #[error("request failed with HTTP {status} during {operation} for {url}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        operation: &'static str,
    },

    #[error("unexpected response from origin: {reason}")]
    Decode { reason: String },

    #[error("no quality options are available for this VOD")]
    NoVariants,

    #[error("segment #{index} ({name}) failed after {attempts} attempts: {reason}")]
    SegmentFailed {
        index: usize,
        name: String,
        attempts: u32,
        reason: String,
    },

    #[error("{tool} failed: {reason}{}", format_stderr(.stderr))]
    ExternalTool {
        tool: String,
        reason: String,
        stderr: String,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("internal error: {reason}")]
    Internal { reason: String },
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\n{trimmed}")
    }
}

impl VodError {
    pub fn validation(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn http_status(
        status: StatusCode,
        url: impl Into<String>,
        operation: &'static str,
    ) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
            operation,
        }
    }

    pub fn external_tool(
        tool: impl Into<String>,
        reason: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::ExternalTool {
            tool: tool.into(),
            reason: reason.into(),
            stderr: stderr.into(),
        }
    }

    /// Whether a segment transfer that failed with this error may be attempted again.
    ///
    /// Only transport-level failures qualify. A non-success HTTP status means the origin
    /// answered and the segment is dropped instead.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { source } => !source.is_builder() && !source.is_redirect(),
            Self::Transport { .. } => true,
            Self::Cancelled
            | Self::Validation { .. }
            | Self::Configuration { .. }
            | Self::ProxyConfiguration { .. }
            | Self::InvalidUrl { .. }
            | Self::HttpStatus { .. }
            | Self::Decode { .. }
            | Self::NoVariants
            | Self::SegmentFailed { .. }
            | Self::ExternalTool { .. }
            | Self::Io { .. }
            | Self::Internal { .. } => false,
        }
    }

    /// A segment answered with a non-success status: skip it and keep the batch going.
    pub fn is_droppable(&self) -> bool {
        matches!(self, Self::HttpStatus { .. })
    }
}

pub type Result<T, E = VodError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_retryable() {
        assert!(VodError::transport("connection reset").is_retryable());
        assert!(!VodError::transport("connection reset").is_droppable());
    }

    #[test]
    fn http_status_is_dropped_not_retried() {
        let err = VodError::http_status(StatusCode::NOT_FOUND, "http://a/1.ts", "segment fetch");
        assert!(!err.is_retryable());
        assert!(err.is_droppable());
    }

    #[test]
    fn validation_message_carries_format_hint() {
        let err = VodError::validation("1x", "unknown unit `x`");
        assert!(err.to_string().contains(TIME_FORMAT_HINT));
    }

    #[test]
    fn external_tool_message_includes_stderr() {
        let err = VodError::external_tool("ffmpeg", "exit status 1", "  concat: bad file\n");
        let msg = err.to_string();
        assert!(msg.starts_with("ffmpeg failed: exit status 1"));
        assert!(msg.ends_with("concat: bad file"));
    }
}
