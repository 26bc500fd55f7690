//! HLS segmenting via the ffmpeg binary.

use crate::domain::hls::SegmentOptions;
use crate::ports::transcoder::{TranscodeError, Transcoder};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Transcoder adapter that shells out to `ffmpeg`.
#[derive(Clone, Debug)]
pub struct FfmpegTranscoder {
    binary: String,
}

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self {
            binary: String::from("ffmpeg"),
        }
    }

    /// Use a specific ffmpeg binary instead of the one on PATH.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

fn hls_args(input: &Path, manifest_out: &Path, options: &SegmentOptions) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-i".into(),
        input.as_os_str().to_owned(),
        "-start_number".into(),
        options.start_number.to_string().into(),
        "-hls_time".into(),
        options.chunk_seconds.to_string().into(),
        // 0 disables the rolling window, keeping every manifest entry
        "-hls_list_size".into(),
        options.playlist_window.unwrap_or(0).to_string().into(),
        "-f".into(),
        "hls".into(),
        manifest_out.as_os_str().to_owned(),
    ]
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn segment(
        &self,
        input: &Path,
        manifest_out: &Path,
        options: &SegmentOptions,
    ) -> Result<(), TranscodeError> {
        debug!(input = %input.display(), manifest = %manifest_out.display(), "running ffmpeg");

        let output = Command::new(&self.binary)
            .args(hls_args(input, manifest_out, options))
            .output()
            .await
            .map_err(TranscodeError::Spawn)?;

        if !output.status.success() {
            return Err(TranscodeError::Engine {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}
