use std::fmt;
use uuid::Uuid;

/// Stages of one pipeline execution, in order. Transitions are strictly
/// sequential; failure at any stage aborts the remaining ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Created,
    Fetching,
    Transcoding,
    Publishing,
    Completed,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStage::Created => write!(f, "created"),
            JobStage::Fetching => write!(f, "fetching"),
            JobStage::Transcoding => write!(f, "transcoding"),
            JobStage::Publishing => write!(f, "publishing"),
            JobStage::Completed => write!(f, "completed"),
        }
    }
}

/// One pipeline execution: a source asset, the workspace that isolates it,
/// and the name the manifest will be published under.
#[derive(Debug, Clone)]
pub struct Job {
    /// Caller-supplied name of the source object
    pub asset_id: String,
    /// Workspace directory name, also the storage folder for published files
    pub workspace_id: String,
    /// Manifest file name, `{token}.m3u8`. The token is independent of the
    /// workspace id so manifest URLs cannot be guessed from the folder name.
    pub manifest_name: String,
    pub stage: JobStage,
}

impl Job {
    pub fn new(asset_id: impl Into<String>, workspace_id: impl Into<String>) -> Self {
        let token = Uuid::new_v4().simple().to_string();
        Self {
            asset_id: asset_id.into(),
            workspace_id: workspace_id.into(),
            manifest_name: format!("{token}.m3u8"),
            stage: JobStage::Created,
        }
    }

    /// Location of the published manifest within the bucket.
    pub fn manifest_key(&self) -> String {
        format!("{}/{}", self.workspace_id, self.manifest_name)
    }
}
