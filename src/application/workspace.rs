//! Per-job workspace directories.

use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// An isolated directory owned by exactly one job for its lifetime.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub id: String,
    pub path: PathBuf,
}

/// Creates and destroys per-job directories under a fixed root.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Create a fresh workspace. The id is a v4 UUID, so concurrent jobs
    /// cannot collide on directories or storage folders.
    pub async fn create(&self) -> io::Result<Workspace> {
        let id = Uuid::new_v4().to_string();
        let path = self.root.join(&id);
        tokio::fs::create_dir_all(&path).await?;
        Ok(Workspace { id, path })
    }

    /// Remove a workspace tree. Destroying an already-absent path is Ok.
    pub async fn destroy(&self, path: &Path) -> io::Result<()> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
