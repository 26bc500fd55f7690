use crate::domain::hls::SegmentOptions;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("failed to invoke transcoding engine: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("transcoding engine failed ({status}): {stderr}")]
    Engine { status: String, stderr: String },
}

/// Segmenting transcoder: turns one input file into an HLS manifest plus
/// chunk files alongside it.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait Transcoder: Send + Sync {
    /// Convert `input` into a manifest at `manifest_out`, writing chunk
    /// files into the same directory under the engine's default naming.
    /// Resolves only once the engine has signalled completion.
    async fn segment(
        &self,
        input: &Path,
        manifest_out: &Path,
        options: &SegmentOptions,
    ) -> Result<(), TranscodeError>;
}
