mod vod_url;

pub use vod_url::parse_vod_id;
