use std::path::PathBuf;

use clap::Parser;
use vodrip_engine::config::DEFAULT_CONCURRENCY;
use vodrip_engine::fetch::DEFAULT_MAX_ATTEMPTS;
use vodrip_engine::{ProxyType, SOURCE_QUALITY};

#[derive(Parser, Debug)]
#[command(author, version, about = "Download a time range of a Twitch VOD", long_about = None)]
pub struct Args {
    /// VOD URL, e.g. https://www.twitch.tv/videos/123456789
    #[arg(required = true)]
    pub url: String,

    /// Start of the range, e.g. 0h20m19s
    #[arg(short, long, value_name = "TIME")]
    pub start: Option<String>,

    /// End of the range, e.g. 3h04m0s. Without it the whole VOD is downloaded.
    #[arg(short, long, value_name = "TIME")]
    pub end: Option<String>,

    /// Quality label such as 720p60; "chunked" is the source quality
    #[arg(long, default_value = SOURCE_QUALITY)]
    pub quality: String,

    /// Show VOD details and available qualities, then exit
    #[arg(short, long)]
    pub info: bool,

    /// Number of segments downloaded in parallel
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Attempts per segment before the download is abandoned
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub retries: u32,

    /// Pause between attempts of the same segment, in milliseconds
    #[arg(long, default_value_t = 0, value_name = "MS")]
    pub retry_delay: u64,

    /// Directory the final mp4 is written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// ffmpeg executable
    #[arg(long, default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// Overall timeout for a single HTTP request in seconds (0 disables it)
    #[arg(long, default_value_t = 0)]
    pub timeout: u64,

    /// Proxy URL
    #[arg(long)]
    pub proxy: Option<String>,

    #[arg(long, value_enum, default_value_t = ProxyType::Http)]
    pub proxy_type: ProxyType,

    #[arg(long, requires = "proxy")]
    pub proxy_user: Option<String>,

    #[arg(long, requires = "proxy_user")]
    pub proxy_pass: Option<String>,

    /// Ignore proxies configured in the environment
    #[arg(long)]
    pub no_system_proxy: bool,

    /// Output debug information
    #[arg(short, long, alias = "debug", conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only output errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Show the elapsed time of every phase
    #[arg(long = "time")]
    pub timing: bool,
}
