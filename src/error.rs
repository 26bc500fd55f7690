//! Error taxonomy for the transcoding pipeline.

use crate::ports::storage::StorageError;
use crate::ports::transcoder::TranscodeError;
use thiserror::Error;

/// Stage-tagged errors surfaced by one pipeline execution.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    ClientInput(String),

    #[error("workspace creation failed: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("failed to fetch source asset '{asset}': {source}")]
    Fetch {
        asset: String,
        #[source]
        source: StorageError,
    },

    #[error("transcoding failed: {0}")]
    Transcode(#[source] TranscodeError),

    #[error("publish failed for '{key}': {source}")]
    Publish {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Pipeline stage this error belongs to, for logging.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::ClientInput(_) => "validate",
            PipelineError::Workspace(_) => "workspace",
            PipelineError::Fetch { .. } => "fetch",
            PipelineError::Transcode(_) => "transcode",
            PipelineError::Publish { .. } => "publish",
            PipelineError::Internal(_) => "internal",
        }
    }

    /// Whether the caller, not the service, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::ClientInput(_))
    }
}
