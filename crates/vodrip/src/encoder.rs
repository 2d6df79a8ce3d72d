//! ffmpeg concat driver: stitches the persisted segments into a single mp4 without re-encoding.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use rand::RngExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::VodError;

const FFMPEG_DOWNLOAD_URL: &str = "https://www.ffmpeg.org/download.html";

/// Random suffixes tried before giving up on finding a free output name.
const MAX_NAME_ATTEMPTS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    /// ffmpeg executable, looked up on `PATH` when not a path
    pub binary: PathBuf,
    /// Directory the final `<asset_id>.mp4` is written to
    pub output_dir: PathBuf,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
            output_dir: PathBuf::from("."),
        }
    }
}

pub struct ConcatEncoder {
    config: EncoderConfig,
}

impl ConcatEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    fn tool_name(&self) -> String {
        self.config.binary.display().to_string()
    }

    fn spawn_error(&self, error: std::io::Error) -> VodError {
        let reason = if error.kind() == ErrorKind::NotFound {
            format!("not found, install ffmpeg from {FFMPEG_DOWNLOAD_URL} or pass its path")
        } else {
            format!("could not be started: {error}")
        };
        VodError::external_tool(self.tool_name(), reason, "")
    }

    /// Check the encoder can be run, returning the first line of its version banner.
    pub async fn probe(&self) -> Result<String, VodError> {
        let output = Command::new(&self.config.binary)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(VodError::external_tool(
                self.tool_name(),
                format!("version check exited with {}", output.status),
                String::from_utf8_lossy(&output.stderr),
            ));
        }

        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string();
        debug!(version = %version, "Encoder available");
        Ok(version)
    }

    /// `<asset_id>.mp4` in the output directory, or `<asset_id>_<n>.mp4` with a random
    /// `n < 10000` when that name is taken.
    pub async fn output_path(&self, asset_id: &str) -> Result<PathBuf, VodError> {
        let dir = &self.config.output_dir;
        let preferred = dir.join(format!("{asset_id}.mp4"));
        if !tokio::fs::try_exists(&preferred).await? {
            return Ok(preferred);
        }

        for _ in 0..MAX_NAME_ATTEMPTS {
            let suffix: u32 = rand::rng().random_range(0..10_000);
            let candidate = dir.join(format!("{asset_id}_{suffix}.mp4"));
            if !tokio::fs::try_exists(&candidate).await? {
                info!(
                    existing = %preferred.display(),
                    output = %candidate.display(),
                    "Output file already exists, writing to a new name"
                );
                return Ok(candidate);
            }
        }

        Err(VodError::configuration(format!(
            "could not find a free output name for {asset_id} in {}",
            dir.display()
        )))
    }

    /// Concatenate the segments listed in `manifest` into a new output file.
    ///
    /// The child is killed when `token` fires; a partial output is removed on any failure.
    pub async fn encode(
        &self,
        manifest: &Path,
        asset_id: &str,
        token: &CancellationToken,
    ) -> Result<PathBuf, VodError> {
        let output_path = self.output_path(asset_id).await?;
        let args = build_args(manifest, &output_path);
        debug!(binary = %self.config.binary.display(), ?args, "Starting encoder");

        let child = Command::new(&self.config.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(VodError::Cancelled),
            output = child.wait_with_output() => output.map_err(VodError::from),
        };

        let failure = match result {
            Ok(output) if output.status.success() => {
                info!(output = %output_path.display(), "Encoding finished");
                return Ok(output_path);
            }
            Ok(output) => VodError::external_tool(
                self.tool_name(),
                format!("exited with {}", output.status),
                String::from_utf8_lossy(&output.stderr),
            ),
            Err(error) => error,
        };

        match tokio::fs::remove_file(&output_path).await {
            Ok(()) => debug!(path = %output_path.display(), "Removed partial output"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %output_path.display(), error = %e, "Failed to remove partial output"),
        }
        Err(failure)
    }
}

/// Arguments for a lossless concat of the segments listed in `manifest`.
pub fn build_args(manifest: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-f", "concat", "-safe", "0", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(manifest.as_os_str().to_owned());
    args.extend(
        ["-c", "copy", "-fflags", "+genpts", "-bsf:a", "aac_adtstoasc"]
            .into_iter()
            .map(OsString::from),
    );
    args.push(output.as_os_str().to_owned());
    args
}
