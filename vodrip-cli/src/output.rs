use std::fmt::Write as _;
use std::sync::Arc;

use indicatif::{HumanBytes, HumanDuration, ProgressStyle};
use tracing::{Span, info_span};
use tracing_indicatif::span_ext::IndicatifSpanExt;
use vodrip_engine::{
    DownloadPlan, FetchReport, ProgressCallback, SOURCE_QUALITY, SegmentProgress, VariantDescriptor,
    VideoInfo,
};

/// Span carrying the segment progress bar, and the callback that advances it.
pub fn fetch_progress(total: usize) -> (Span, ProgressCallback) {
    let span = info_span!("fetch");
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} segments {msg}",
    ) {
        span.pb_set_style(&style.progress_chars("=> "));
    }
    span.pb_set_length(total as u64);

    let ticker = span.clone();
    let callback: ProgressCallback = Arc::new(move |progress: SegmentProgress| {
        ticker.pb_inc(1);
        ticker.pb_set_message(&HumanBytes(progress.bytes).to_string());
    });
    (span, callback)
}

fn quality_line(label: &str) -> String {
    if label == SOURCE_QUALITY {
        format!("{label} (source)")
    } else {
        label.to_string()
    }
}

pub fn render_info(info: &VideoInfo, variants: &[VariantDescriptor]) -> String {
    let mut out = format!("\n{info}\n\nAvailable quality options:\n");
    for variant in variants {
        let _ = writeln!(out, "{}", quality_line(&variant.quality_label));
    }
    out
}

pub fn render_plan(plan: &DownloadPlan) -> String {
    format!(
        "Downloading {} segments ({}..{} of {}) in {} quality",
        plan.range.count,
        plan.range.start_index,
        plan.range.end_index(),
        plan.playlist.len(),
        plan.selection.display_label()
    )
}

pub fn render_summary(
    output: &std::path::Path,
    report: &FetchReport,
    elapsed: std::time::Duration,
) -> String {
    let mut out = format!(
        "Saved {} ({} segments, {}) in {}",
        output.display(),
        report.persisted.len(),
        HumanBytes(report.bytes),
        HumanDuration(elapsed)
    );
    if !report.dropped.is_empty() {
        let skipped: Vec<String> = report.dropped.iter().map(|d| d.index.to_string()).collect();
        let _ = write!(
            out,
            "\n{} segments were unavailable and skipped: {}",
            skipped.len(),
            skipped.join(", ")
        );
    }
    out
}
