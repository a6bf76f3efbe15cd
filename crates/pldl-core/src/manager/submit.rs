use std::path::PathBuf;
use std::sync::Arc;

use super::{DownloadManager, Inner, Phase};
use crate::error::{ManagerError, ManagerResult};
use crate::job::{DownloadOptions, JobId, JobRecord, NewJob};

/// One download request.
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub url: String,
    pub source_id: String,
    pub title: String,
    pub output_dir: PathBuf,
    pub options: DownloadOptions,
    pub group_id: Option<String>,
    pub thumbnail: Option<String>,
}

impl SubmitRequest {
    fn validate(&self) -> ManagerResult<()> {
        let missing = [
            ("url", self.url.trim().is_empty()),
            ("source id", self.source_id.trim().is_empty()),
            ("title", self.title.trim().is_empty()),
            ("output directory", self.output_dir.as_os_str().is_empty()),
        ];
        if let Some((field, _)) = missing.iter().find(|(_, empty)| *empty) {
            return Err(ManagerError::Validation(format!("{field} is required")));
        }
        // Used as the output file stem.
        let id = self.source_id.trim();
        if id == "." || id == ".." || id.contains(['/', '\\', '\0']) {
            return Err(ManagerError::Validation(format!(
                "source id {id:?} is not usable as a file name"
            )));
        }
        Ok(())
    }
}

impl DownloadManager {
    /// Create a pending job and queue it. Re-submitting a source that was
    /// already downloaded creates a new, independent job.
    pub async fn submit(&self, req: SubmitRequest) -> ManagerResult<JobId> {
        req.validate()?;
        self.ensure_running()?;

        // The dispatcher creates it again before fetching; failing here is not fatal.
        if let Err(e) = tokio::fs::create_dir_all(&req.output_dir).await {
            tracing::warn!(dir = %req.output_dir.display(), "could not create output directory yet: {e}");
        }

        let format = req
            .options
            .format
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| self.inner.settings.download_format());
        let quality = req
            .options
            .quality
            .filter(|q| !q.trim().is_empty())
            .unwrap_or_else(|| self.inner.settings.max_quality());
        let record = JobRecord::new(NewJob {
            source_id: req.source_id.trim().to_string(),
            group_id: req.group_id,
            source_url: req.url.trim().to_string(),
            display_name: req.title,
            thumbnail: req.thumbnail,
            output_dir: req.output_dir,
            format,
            quality,
        });
        let id = record.id;

        let mut state = self.inner.lock();
        let handle = match &state.phase {
            Phase::Running(handle) => handle.clone(),
            Phase::Created => return Err(ManagerError::NotInitialized),
            Phase::ShuttingDown => return Err(ManagerError::ShuttingDown),
        };
        self.inner.publish(&record);
        let generation = record.generation;
        tracing::info!(
            job_id = %id,
            source_id = %record.source_id,
            group_id = record.group_id.as_deref().unwrap_or("-"),
            "job submitted"
        );
        state.registry.put(record);
        self.inner.enqueue(&handle, id, generation);
        Ok(id)
    }
}

impl Inner {
    /// Queue one dispatch attempt for `id` at `generation`. Call with the
    /// state lock held so queue order matches transition order.
    pub(super) fn enqueue(
        self: &Arc<Self>,
        handle: &tokio::runtime::Handle,
        id: JobId,
        generation: u64,
    ) {
        let inner = Arc::clone(self);
        let _rt = handle.enter();
        // Detached: the attempt reports through the registry, not the handle.
        drop(self.queue.submit(async move {
            inner.run_attempt(id, generation).await;
        }));
    }
}
