use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::AppError;

static VOD_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s|https?://|www\.)twitch\.tv/videos/(\d{9,})$").unwrap()
});

/// Extracts the VOD ID from a `twitch.tv/videos/<id>` URL.
///
/// The host may be preceded by a scheme and/or `www.`, and the ID must be at least nine
/// digits long and end the input.
///
/// # Examples
///
/// ```
/// use vodrip::utils::parse_vod_id;
///
/// assert_eq!(parse_vod_id("https://www.twitch.tv/videos/123456789").unwrap(), "123456789");
/// assert!(parse_vod_id("https://www.twitch.tv/video/123456789").is_err());
/// ```
pub fn parse_vod_id(input: &str) -> Result<String, AppError> {
    let id = VOD_URL_REGEX
        .captures(input.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            AppError::InvalidInput(format!(
                "`{input}` is not a VOD URL, expected something like https://www.twitch.tv/videos/123456789"
            ))
        })?;
    debug!(id = %id, "Parsed VOD URL");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("twitch.tv/video/12345678", None)]
    #[case("www.twitch.tv/video/12345678", None)]
    #[case("https://twitch.tv/video/12345678", None)]
    #[case("twitch.tv/videos/12345678", None)]
    #[case("www.twitch.tv/videos/12345678", None)]
    #[case("https://www.twitch.tv/videos/12345678", None)]
    #[case("twitch.tv/videos/123456789", Some("123456789"))]
    #[case("www.twitch.tv/videos/123456789", Some("123456789"))]
    #[case("https://www.twitch.tv/videos/123456789", Some("123456789"))]
    #[case("http://www.twitch.tv/videos/123456789", Some("123456789"))]
    #[case("https://twitch.tv/videos/1234567890", Some("1234567890"))]
    #[case("http://foobar.com", None)]
    #[case("foobar.com", None)]
    #[case("www.foobar.com", None)]
    #[case(
        "some random string that may contain twitch or twitch.tv or even videos or some ID 123456789",
        None
    )]
    #[case("https://www.twitch.tv/videos/309711819", Some("309711819"))]
    #[case("https://www.twitch.tv/videos/309711819?t=1h", None)]
    #[case("", None)]
    fn extracts_vod_id(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(parse_vod_id(input).ok().as_deref(), expected);
    }
}
