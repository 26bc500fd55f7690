//! The per-request transcoding pipeline.
//!
//! One `process` call is one job: workspace creation, streaming fetch of
//! the source asset, HLS segmenting, publish of the segment set, and
//! workspace destruction on every exit path.

use crate::application::workspace::{Workspace, WorkspaceManager};
use crate::config::PublishPolicy;
use crate::domain::hls::{PublishedFile, SegmentOptions};
use crate::domain::job::{Job, JobStage};
use crate::error::PipelineError;
use crate::ports::storage::ObjectStore;
use crate::ports::transcoder::Transcoder;
use std::path::{Component, Path};
use tracing::{debug, error, info, warn};

pub struct PipelineService<S, T> {
    store: S,
    transcoder: T,
    workspaces: WorkspaceManager,
    publish_policy: PublishPolicy,
}

impl<S, T> PipelineService<S, T>
where
    S: ObjectStore,
    T: Transcoder,
{
    pub fn new(
        store: S,
        transcoder: T,
        workspaces: WorkspaceManager,
        publish_policy: PublishPolicy,
    ) -> Self {
        Self {
            store,
            transcoder,
            workspaces,
            publish_policy,
        }
    }

    /// Run one job end to end and return the published manifest location,
    /// `{workspaceId}/{manifestFileName}`.
    ///
    /// The workspace is destroyed on every exit path, but only after all
    /// stages that read it have finished.
    pub async fn process(&self, asset_id: &str) -> Result<String, PipelineError> {
        // Input validation happens before any filesystem side effect.
        validate_asset_id(asset_id)?;

        let workspace = self
            .workspaces
            .create()
            .await
            .map_err(PipelineError::Workspace)?;
        let mut job = Job::new(asset_id, workspace.id.clone());
        info!(workspace = %workspace.id, asset = %job.asset_id, "job created");

        let result = self.run(&mut job, &workspace).await;

        if let Err(e) = self.workspaces.destroy(&workspace.path).await {
            warn!(workspace = %workspace.id, error = %e, "workspace cleanup failed");
        }

        match &result {
            Ok(location) => {
                info!(workspace = %workspace.id, location = %location, "job completed")
            }
            Err(e) => {
                error!(workspace = %workspace.id, stage = e.stage(), error = %e, "job failed")
            }
        }
        result
    }

    async fn run(&self, job: &mut Job, workspace: &Workspace) -> Result<String, PipelineError> {
        job.stage = JobStage::Fetching;
        let input = workspace.path.join(&job.asset_id);
        self.store
            .download(&job.asset_id, &input)
            .await
            .map_err(|source| PipelineError::Fetch {
                asset: job.asset_id.clone(),
                source,
            })?;

        job.stage = JobStage::Transcoding;
        let manifest = workspace.path.join(&job.manifest_name);
        self.transcoder
            .segment(&input, &manifest, &SegmentOptions::default())
            .await
            .map_err(PipelineError::Transcode)?;

        // The source file is intermediate; drop it so it is not published
        // alongside the segment set.
        tokio::fs::remove_file(&input)
            .await
            .map_err(|e| PipelineError::Internal(format!("failed to remove source file: {e}")))?;

        job.stage = JobStage::Publishing;
        let published = self.publish(workspace).await?;
        debug!(workspace = %workspace.id, files = published.len(), "publish finished");

        job.stage = JobStage::Completed;
        Ok(job.manifest_key())
    }

    /// Upload every regular file in the workspace (one level only) to
    /// `{workspaceId}/{fileName}`. Directories are skipped, never an error.
    async fn publish(&self, workspace: &Workspace) -> Result<Vec<PublishedFile>, PipelineError> {
        let mut entries = tokio::fs::read_dir(&workspace.path)
            .await
            .map_err(|e| PipelineError::Internal(format!("failed to list workspace: {e}")))?;

        let mut published = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::Internal(format!("failed to list workspace: {e}")))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| PipelineError::Internal(format!("failed to stat entry: {e}")))?;
            if file_type.is_dir() {
                debug!(workspace = %workspace.id, entry = ?entry.file_name(), "skipping directory");
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            let key = format!("{}/{}", workspace.id, name);

            match self.store.upload(&entry.path(), &key).await {
                Ok(url) => published.push(PublishedFile { name, url }),
                Err(source) => match self.publish_policy {
                    PublishPolicy::BestEffort => {
                        warn!(
                            workspace = %workspace.id,
                            file = %name,
                            error = %source,
                            "upload failed, continuing"
                        );
                    }
                    PublishPolicy::AllOrNothing => {
                        return Err(PipelineError::Publish { key, source });
                    }
                },
            }
        }
        Ok(published)
    }
}

/// The asset name becomes a file name inside the workspace; reject anything
/// that could escape it.
fn validate_asset_id(asset_id: &str) -> Result<(), PipelineError> {
    if asset_id.is_empty() {
        return Err(PipelineError::ClientInput(String::from(
            "fileName is required",
        )));
    }
    let mut components = Path::new(asset_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(PipelineError::ClientInput(format!(
            "invalid fileName: {asset_id}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::storage::{MockObjectStore, StorageError};
    use crate::ports::transcoder::{MockTranscoder, TranscodeError};
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    /// Fake segmenter output: a manifest plus `chunks` media files named
    /// the way ffmpeg's HLS muxer names them by default.
    fn write_segment_set(manifest_out: &Path, chunks: usize) {
        let dir = manifest_out.parent().unwrap();
        let stem = manifest_out
            .file_stem()
            .unwrap()
            .to_string_lossy()
            .into_owned();

        let mut manifest = String::from("#EXTM3U\n#EXT-X-TARGETDURATION:10\n");
        for i in 0..chunks {
            manifest.push_str(&format!("#EXTINF:10.0,\n{stem}{i}.ts\n"));
            std::fs::write(dir.join(format!("{stem}{i}.ts")), b"chunk-bytes").unwrap();
        }
        manifest.push_str("#EXT-X-ENDLIST\n");
        std::fs::write(manifest_out, manifest).unwrap();
    }

    fn downloading_store() -> MockObjectStore {
        let mut store = MockObjectStore::new();
        store.expect_download().times(1).returning(|_, dest| {
            let dest = dest.to_path_buf();
            Box::pin(async move {
                std::fs::write(&dest, b"source-bytes")?;
                Ok(())
            })
        });
        store
    }

    fn segmenting_transcoder(chunks: usize) -> MockTranscoder {
        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_segment()
            .times(1)
            .returning(move |input, manifest_out, options| {
                assert!(input.exists(), "input must be fetched before segmenting");
                assert_eq!(options, &SegmentOptions::default());
                let manifest_out = manifest_out.to_path_buf();
                Box::pin(async move {
                    write_segment_set(&manifest_out, chunks);
                    Ok(())
                })
            });
        transcoder
    }

    fn service(
        store: MockObjectStore,
        transcoder: MockTranscoder,
        root: &Path,
        policy: PublishPolicy,
    ) -> PipelineService<MockObjectStore, MockTranscoder> {
        PipelineService::new(store, transcoder, WorkspaceManager::new(root), policy)
    }

    #[tokio::test]
    async fn publishes_manifest_and_chunks_then_cleans_up() {
        let root = tempdir().unwrap();
        let uploaded: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let mut store = downloading_store();
        let seen = uploaded.clone();
        store.expect_upload().times(5).returning(move |_, key| {
            seen.lock().unwrap().push(key.to_string());
            let url = format!("https://signed.example/{key}");
            Box::pin(async move { Ok(url) })
        });

        let pipeline = service(
            store,
            segmenting_transcoder(4),
            root.path(),
            PublishPolicy::BestEffort,
        );

        let location = pipeline.process("track1.mp3").await.unwrap();
        let (folder, manifest) = location.split_once('/').unwrap();
        assert!(manifest.ends_with(".m3u8"));

        let uploaded = uploaded.lock().unwrap();
        assert_eq!(uploaded.len(), 5, "one manifest plus four chunks");
        assert!(uploaded.contains(&location));
        for key in uploaded.iter() {
            assert!(key.starts_with(&format!("{folder}/")));
            assert!(
                !key.ends_with("track1.mp3"),
                "the source file must not be republished"
            );
        }

        // workspace directory is gone after completion
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn subdirectories_in_the_workspace_are_skipped() {
        let root = tempdir().unwrap();

        let mut store = downloading_store();
        store.expect_upload().times(2).returning(|_, key| {
            let url = format!("https://signed.example/{key}");
            Box::pin(async move { Ok(url) })
        });

        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_segment()
            .times(1)
            .returning(|_, manifest_out, _| {
                let manifest_out = manifest_out.to_path_buf();
                Box::pin(async move {
                    write_segment_set(&manifest_out, 1);
                    let nested = manifest_out.parent().unwrap().join("scratch");
                    std::fs::create_dir(&nested).unwrap();
                    std::fs::write(nested.join("leftover.tmp"), b"x").unwrap();
                    Ok(())
                })
            });

        let pipeline = service(store, transcoder, root.path(), PublishPolicy::BestEffort);
        pipeline.process("track1.mp3").await.unwrap();
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_asset_id_short_circuits_without_side_effects() {
        let root = tempdir().unwrap();
        let pipeline = service(
            MockObjectStore::new(),
            MockTranscoder::new(),
            root.path(),
            PublishPolicy::BestEffort,
        );

        let err = pipeline.process("").await.unwrap_err();
        assert!(matches!(err, PipelineError::ClientInput(_)));
        assert_eq!(err.to_string(), "invalid request: fileName is required");

        // no workspace was created
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn traversal_asset_ids_are_rejected() {
        let root = tempdir().unwrap();
        let pipeline = service(
            MockObjectStore::new(),
            MockTranscoder::new(),
            root.path(),
            PublishPolicy::BestEffort,
        );

        for bad in ["../secret.mp3", "/etc/passwd", "a/b.mp3"] {
            let err = pipeline.process(bad).await.unwrap_err();
            assert!(matches!(err, PipelineError::ClientInput(_)), "{bad}");
        }
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn fetch_failure_aborts_before_transcoding() {
        let root = tempdir().unwrap();

        let mut store = MockObjectStore::new();
        store.expect_download().times(1).returning(|key, _| {
            let key = key.to_string();
            Box::pin(async move { Err(StorageError::NotFound(key)) })
        });
        store.expect_upload().times(0);

        let mut transcoder = MockTranscoder::new();
        transcoder.expect_segment().times(0);

        let pipeline = service(store, transcoder, root.path(), PublishPolicy::BestEffort);
        let err = pipeline.process("missing.mp3").await.unwrap_err();
        assert!(matches!(err, PipelineError::Fetch { .. }));
        assert_eq!(err.stage(), "fetch");

        // failed workspaces are cleaned up too
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn transcode_failure_publishes_nothing_and_cleans_up() {
        let root = tempdir().unwrap();

        let mut store = downloading_store();
        store.expect_upload().times(0);

        let mut transcoder = MockTranscoder::new();
        transcoder.expect_segment().times(1).returning(|_, _, _| {
            Box::pin(async move {
                Err(TranscodeError::Engine {
                    status: String::from("exit status: 1"),
                    stderr: String::from("Invalid data found when processing input"),
                })
            })
        });

        let pipeline = service(store, transcoder, root.path(), PublishPolicy::BestEffort);
        let err = pipeline.process("corrupt.mp3").await.unwrap_err();
        assert!(matches!(err, PipelineError::Transcode(_)));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn best_effort_publish_survives_a_failed_chunk_upload() {
        let root = tempdir().unwrap();

        let mut store = downloading_store();
        store.expect_upload().times(5).returning(|_, key| {
            let key = key.to_string();
            Box::pin(async move {
                if key.ends_with("0.ts") {
                    Err(StorageError::Transfer(String::from("connection reset")))
                } else {
                    Ok(format!("https://signed.example/{key}"))
                }
            })
        });

        let pipeline = service(
            store,
            segmenting_transcoder(4),
            root.path(),
            PublishPolicy::BestEffort,
        );

        let location = pipeline.process("track1.mp3").await.unwrap();
        assert!(location.ends_with(".m3u8"));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn all_or_nothing_publish_fails_the_job_on_a_failed_upload() {
        let root = tempdir().unwrap();

        let mut store = downloading_store();
        store.expect_upload().times(1..=5).returning(|_, key| {
            let key = key.to_string();
            Box::pin(async move {
                if key.ends_with("0.ts") {
                    Err(StorageError::Transfer(String::from("connection reset")))
                } else {
                    Ok(format!("https://signed.example/{key}"))
                }
            })
        });

        let pipeline = service(
            store,
            segmenting_transcoder(4),
            root.path(),
            PublishPolicy::AllOrNothing,
        );

        let err = pipeline.process("track1.mp3").await.unwrap_err();
        assert!(matches!(err, PipelineError::Publish { .. }));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn concurrent_jobs_for_one_asset_do_not_collide() {
        let root = tempdir().unwrap();
        let uploaded: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let mut store = MockObjectStore::new();
        store.expect_download().times(2).returning(|_, dest| {
            let dest = dest.to_path_buf();
            Box::pin(async move {
                std::fs::write(&dest, b"source-bytes")?;
                Ok(())
            })
        });
        let seen = uploaded.clone();
        store.expect_upload().returning(move |_, key| {
            seen.lock().unwrap().push(key.to_string());
            let url = format!("https://signed.example/{key}");
            Box::pin(async move { Ok(url) })
        });

        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_segment()
            .times(2)
            .returning(|_, manifest_out, _| {
                let manifest_out = manifest_out.to_path_buf();
                Box::pin(async move {
                    write_segment_set(&manifest_out, 2);
                    Ok(())
                })
            });

        let pipeline = Arc::new(service(
            store,
            transcoder,
            root.path(),
            PublishPolicy::BestEffort,
        ));

        let (a, b) = tokio::join!(
            pipeline.process("track1.mp3"),
            pipeline.process("track1.mp3")
        );
        let a = a.unwrap();
        let b = b.unwrap();

        let folder_a = a.split('/').next().unwrap().to_string();
        let folder_b = b.split('/').next().unwrap().to_string();
        assert_ne!(folder_a, folder_b);
        assert_ne!(a, b);

        let uploaded = uploaded.lock().unwrap();
        assert_eq!(uploaded.len(), 6);
        for key in uploaded.iter() {
            let folder = key.split('/').next().unwrap();
            assert!(folder == folder_a || folder == folder_b);
        }
    }

    #[test]
    fn validate_accepts_plain_file_names() {
        assert!(validate_asset_id("track1.mp3").is_ok());
        assert!(validate_asset_id("track with spaces.flac").is_ok());
    }

    #[tokio::test]
    async fn publish_lists_one_level_only() {
        // publish() itself, without the full pipeline: one file, one dir
        let root = tempdir().unwrap();
        let manager = WorkspaceManager::new(root.path());
        let workspace = manager.create().await.unwrap();
        std::fs::write(workspace.path.join("a.ts"), b"x").unwrap();
        std::fs::create_dir(workspace.path.join("sub")).unwrap();
        std::fs::write(workspace.path.join("sub").join("b.ts"), b"y").unwrap();

        let mut store = MockObjectStore::new();
        store.expect_upload().times(1).returning(|_, key| {
            assert!(key.ends_with("/a.ts"));
            let url = format!("https://signed.example/{key}");
            Box::pin(async move { Ok(url) })
        });

        let pipeline = PipelineService::new(
            store,
            MockTranscoder::new(),
            manager,
            PublishPolicy::BestEffort,
        );
        let published = pipeline.publish(&workspace).await.unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].name, "a.ts");
    }
}
