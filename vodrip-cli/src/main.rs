mod cli;
mod output;

use std::process;
use std::time::{Duration, Instant};

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Level, debug, error, info, warn};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};
use vodrip::error::{AppError, Scratch};
use vodrip::utils::parse_vod_id;
use vodrip_engine::{
    DownloadRequest, DownloaderConfig, EncoderConfig, PlaylistProvider, ProxyConfig, RetryPolicy,
    ScopedStorage, TimeWindow, TwitchOrigin, VodConfig, VodDownloader, create_client,
};

use crate::cli::Args;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args).await {
        if e.is_cancelled() {
            eprintln!("Interrupted by user");
        } else {
            error!("{e}");
            eprintln!("Error: {e}");
        }
        process::exit(1);
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("info,vodrip=debug,vodrip_engine=debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(verbose)
                .with_level(verbose)
                .with_writer(indicatif_layer.get_stderr_writer()),
        )
        .with(indicatif_layer)
        .init();
}

fn build_config(args: &Args) -> Result<VodConfig, AppError> {
    let mut downloader = DownloaderConfig::builder().with_system_proxy(!args.no_system_proxy);
    if args.timeout > 0 {
        downloader = downloader.with_timeout(Duration::from_secs(args.timeout));
    }
    if let Some(url) = &args.proxy {
        let mut proxy = ProxyConfig::new(url.clone(), args.proxy_type);
        if let Some(user) = &args.proxy_user {
            proxy = proxy.with_auth(user.clone(), args.proxy_pass.clone().unwrap_or_default());
        }
        downloader = downloader.with_proxy(proxy);
    }

    let config = VodConfig {
        downloader: downloader.build(),
        concurrency: args.concurrency,
        retry: RetryPolicy::new(args.retries, Duration::from_millis(args.retry_delay)),
        encoder: EncoderConfig {
            binary: args.ffmpeg.clone(),
            output_dir: args.output_dir.clone(),
        },
        verbose: args.verbose,
        timing: args.timing,
        ..VodConfig::default()
    };
    config.validate()?;
    Ok(config)
}

async fn show_info(config: &VodConfig, asset_id: &str) -> Result<(), AppError> {
    let client = create_client(&config.downloader)?;
    let origin = TwitchOrigin::new(client, config.endpoints.clone()).with_verbose(config.verbose);
    let (info, variants) = tokio::join!(origin.video_info(asset_id), origin.resolve_variants(asset_id));
    println!("{}", output::render_info(&info?, &variants?));
    Ok(())
}

async fn run(args: Args) -> Result<(), AppError> {
    let started = Instant::now();
    let asset_id = parse_vod_id(&args.url)?;
    let config = build_config(&args)?;

    if args.info {
        return show_info(&config, &asset_id).await;
    }

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, stopping");
            signal_token.cancel();
        }
    });

    let request = DownloadRequest {
        asset_id: asset_id.clone(),
        quality: args.quality.clone(),
        window: TimeWindow::from_inputs(args.start.as_deref(), args.end.as_deref())?,
    };

    let downloader = VodDownloader::new(config)?;
    let version = downloader.encoder().probe().await?;
    debug!(version = %version, "Using encoder");

    let plan = downloader.plan(&request, &token).await?;
    if plan.is_empty() {
        println!("Nothing to download, the time window starts after the end of the VOD");
        return Ok(());
    }
    info!("{}", output::render_plan(&plan));

    let scratch = tempfile::Builder::new()
        .prefix(&format!("{asset_id}_"))
        .tempdir_in(".")?;
    let storage = ScopedStorage::new(scratch.path())?;

    let result = async {
        let (span, on_progress) = output::fetch_progress(plan.range.count);
        let (report, manifest) = downloader
            .fetch(&plan, &storage, &token, Some(on_progress))
            .instrument(span)
            .await?;
        let path = match manifest {
            Some(manifest) => Some(downloader.encode(&plan, &manifest, &token).await?),
            None => None,
        };
        Ok::<_, vodrip_engine::PhaseError>((report, path))
    }
    .await;

    let scratch_path = scratch.path().to_path_buf();
    let removed = match scratch.close() {
        Ok(()) => true,
        Err(e) => {
            warn!(path = %scratch_path.display(), error = %e, "Could not remove temporary directory");
            false
        }
    };

    let (report, path) = result.map_err(|e| {
        AppError::download(
            e,
            Some(Scratch {
                path: scratch_path,
                removed,
            }),
        )
    })?;
    match path {
        Some(path) => println!("{}", output::render_summary(&path, &report, started.elapsed())),
        None => println!("Nothing was downloaded"),
    }
    if args.timing {
        info!(elapsed = ?started.elapsed(), "Total");
    }
    Ok(())
}
