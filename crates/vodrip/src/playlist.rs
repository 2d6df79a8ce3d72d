//! Mapping of the origin's master and media playlists onto the crate's model.
//!
//! Parsing is done by `m3u8-rs`; this layer only picks out `(quality, url)` pairs from the
//! master playlist and segment names, target duration and per-segment durations from a media
//! playlist, reporting anything unusable as [`VodError::Decode`].

use m3u8_rs::{MediaSegment, parse_master_playlist_res, parse_media_playlist_res};
use tracing::{debug, trace};

use crate::error::VodError;
use crate::model::{MediaPlaylist, VariantDescriptor};

const SEGMENT_EXTENSION: &str = ".ts";

/// Extract the quality variants listed by a master playlist, in listing order.
///
/// The quality label is the `VIDEO` attribute of each `#EXT-X-STREAM-INF` tag and the
/// playlist URL is its URI. I-frame streams and entries without a label are skipped.
pub fn parse_master(text: &str) -> Result<Vec<VariantDescriptor>, VodError> {
    let playlist = parse_master_playlist_res(text.as_bytes())
        .map_err(|e| VodError::decode(format!("Failed to parse master playlist: {e}")))?;

    let variants: Vec<VariantDescriptor> = playlist
        .variants
        .into_iter()
        .filter(|variant| !variant.is_i_frame)
        .filter_map(|variant| match variant.video {
            Some(label) if !variant.uri.is_empty() => {
                Some(VariantDescriptor::new(label, variant.uri))
            }
            _ => {
                trace!(uri = %variant.uri, "Stream info without VIDEO attribute");
                None
            }
        })
        .collect();

    debug!(count = variants.len(), "Parsed master playlist");
    Ok(variants)
}

fn is_segment_uri(uri: &str) -> bool {
    let path = uri.split_once('?').map_or(uri, |(path, _)| path);
    path.ends_with(SEGMENT_EXTENSION)
}

fn segment_duration(segment: &MediaSegment) -> Option<f64> {
    let duration = f64::from(segment.duration);
    (duration.is_finite() && duration > 0.0).then_some(duration)
}

/// Extract segment names, target duration and (when present) per-segment durations.
///
/// A segment without a usable `#EXTINF` duration leaves the duration list shorter than the
/// segment list, which callers treat as "durations unavailable".
pub fn parse_media(text: &str) -> Result<MediaPlaylist, VodError> {
    let playlist = parse_media_playlist_res(text.as_bytes())
        .map_err(|e| VodError::decode(format!("Failed to parse media playlist: {e}")))?;

    if playlist.target_duration == 0 {
        return Err(VodError::decode(
            "media playlist has no positive TARGETDURATION",
        ));
    }

    let mut segments = Vec::with_capacity(playlist.segments.len());
    let mut durations = Vec::with_capacity(playlist.segments.len());
    for segment in &playlist.segments {
        if !is_segment_uri(&segment.uri) {
            trace!(uri = %segment.uri, "Skipping non-segment entry");
            continue;
        }
        match segment_duration(segment) {
            Some(duration) => durations.push(duration),
            None => debug!(uri = %segment.uri, "Segment has no usable duration"),
        }
        segments.push(segment.uri.clone());
    }

    if segments.is_empty() {
        return Err(VodError::decode("media playlist lists no segments"));
    }

    debug!(
        segments = segments.len(),
        durations = durations.len(),
        target_duration = playlist.target_duration,
        "Parsed media playlist"
    );

    Ok(MediaPlaylist {
        target_duration: playlist.target_duration,
        segments,
        durations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = r#"#EXTM3U
#EXT-X-TWITCH-INFO:ORIGIN="s3",B="false",REGION="EU",USER-IP="127.0.0.1"
#EXT-X-MEDIA:TYPE=VIDEO,GROUP-ID="chunked",NAME="1080p60 (source)",AUTOSELECT=YES,DEFAULT=YES
#EXT-X-STREAM-INF:BANDWIDTH=6000000,CODECS="avc1.64002A,mp4a.40.2",RESOLUTION=1920x1080,VIDEO="chunked",FRAME-RATE=60.000
https://vod.example.net/abc/chunked/index-dvr.m3u8
#EXT-X-MEDIA:TYPE=VIDEO,GROUP-ID="720p60",NAME="720p60",AUTOSELECT=YES,DEFAULT=YES
#EXT-X-STREAM-INF:BANDWIDTH=3000000,CODECS="avc1.4D401F,mp4a.40.2",RESOLUTION=1280x720,VIDEO="720p60"
https://vod.example.net/abc/720p60/index-dvr.m3u8
#EXT-X-MEDIA:TYPE=VIDEO,GROUP-ID="audio_only",NAME="Audio Only",AUTOSELECT=NO,DEFAULT=NO
#EXT-X-STREAM-INF:BANDWIDTH=160000,CODECS="mp4a.40.2",VIDEO="audio_only"
https://vod.example.net/abc/audio_only/index-dvr.m3u8
"#;

    const MEDIA: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:10
#ID3-EQUIV-TDTG:2018-09-13T21:47:01
#EXT-X-PLAYLIST-TYPE:EVENT
#EXT-X-MEDIA-SEQUENCE:0
#EXTINF:1.996,
0.ts
#EXTINF:10.000,
1.ts
#EXTINF:10.000,
2-muted.ts
#EXT-X-ENDLIST
";

    #[test]
    fn master_lists_variants_in_order() {
        let variants = parse_master(MASTER).unwrap();
        assert_eq!(
            variants,
            vec![
                VariantDescriptor::new("chunked", "https://vod.example.net/abc/chunked/index-dvr.m3u8"),
                VariantDescriptor::new("720p60", "https://vod.example.net/abc/720p60/index-dvr.m3u8"),
                VariantDescriptor::new(
                    "audio_only",
                    "https://vod.example.net/abc/audio_only/index-dvr.m3u8"
                ),
            ]
        );
    }

    #[test]
    fn master_without_header_is_rejected() {
        assert!(matches!(
            parse_master("{\"error\":\"Not Found\"}"),
            Err(VodError::Decode { .. })
        ));
    }

    #[test]
    fn master_skips_stream_without_video_attribute() {
        let text = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\nhttp://a/x.m3u8\n#EXT-X-STREAM-INF:BANDWIDTH=2,CODECS=\"a,b\",VIDEO=\"480p30\"\nhttp://a/480p30/y.m3u8\n";
        let variants = parse_master(text).unwrap();
        assert_eq!(variants, vec![VariantDescriptor::new("480p30", "http://a/480p30/y.m3u8")]);
    }

    #[test]
    fn master_without_variants_is_empty() {
        assert!(parse_master("#EXTM3U\n").unwrap().is_empty());
    }

    #[test]
    fn media_extracts_segments_and_durations() {
        let playlist = parse_media(MEDIA).unwrap();
        assert_eq!(playlist.target_duration, 10);
        assert_eq!(playlist.segments, vec!["0.ts", "1.ts", "2-muted.ts"]);
        assert_eq!(playlist.durations, vec![f64::from(1.996_f32), 10.0, 10.0]);
        assert!(playlist.precise_durations().is_some());
    }

    #[test]
    fn media_tolerates_missing_durations() {
        let text = "#EXTM3U\n#EXT-X-TARGETDURATION:10\n0.ts\n#EXTINF:10.0,\n1.ts\n#EXTINF:10.0,\n2.ts?token=1\n";
        let playlist = parse_media(text).unwrap();
        assert_eq!(playlist.segments, vec!["0.ts", "1.ts", "2.ts?token=1"]);
        assert_eq!(playlist.durations, vec![10.0, 10.0]);
        assert!(playlist.precise_durations().is_none());
    }

    #[test]
    fn media_requires_target_duration() {
        let text = "#EXTM3U\n#EXTINF:10.0,\n0.ts\n";
        assert!(matches!(parse_media(text), Err(VodError::Decode { .. })));

        let text = "#EXTM3U\n#EXT-X-TARGETDURATION:0\n0.ts\n";
        assert!(matches!(parse_media(text), Err(VodError::Decode { .. })));
    }

    #[test]
    fn media_requires_segments() {
        let text = "#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXT-X-ENDLIST\n";
        assert!(matches!(parse_media(text), Err(VodError::Decode { .. })));
    }
}
