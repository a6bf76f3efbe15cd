//! User-driven transitions. Every operation is safe to call at any time:
//! unknown ids and illegal transitions are logged and return `false`.

use super::{DownloadManager, Phase, SubmitRequest};
use crate::cleanup::remove_partial_artifacts;
use crate::job::{DownloadOptions, JobId, JobStatus};
use crate::notifier::JobEvent;

impl DownloadManager {
    /// pending/active -> paused. An active attempt is aborted.
    pub fn pause(&self, id: &JobId) -> bool {
        let mut state = self.inner.lock();
        if !matches!(state.phase, Phase::Running(_)) {
            tracing::warn!(job_id = %id, "pause rejected: manager is not running");
            return false;
        }
        let Some(rec) = state.registry.get_mut(id) else {
            tracing::warn!(job_id = %id, "pause: job not found");
            return false;
        };
        let was_active = rec.status == JobStatus::Active;
        if !rec.mark_paused() {
            tracing::warn!(job_id = %id, status = %rec.status, "pause rejected");
            return false;
        }
        self.inner.publish(rec);
        if was_active {
            state.registry.clear_active(id);
            self.inner.control.request_abort(id);
        }
        tracing::info!(job_id = %id, was_active, "job paused");
        true
    }

    /// paused -> pending, and back into the queue.
    pub fn resume(&self, id: &JobId) -> bool {
        let mut state = self.inner.lock();
        let Phase::Running(handle) = state.phase.clone() else {
            tracing::warn!(job_id = %id, "resume rejected: manager is not running");
            return false;
        };
        let Some(rec) = state.registry.get_mut(id) else {
            tracing::warn!(job_id = %id, "resume: job not found");
            return false;
        };
        if !rec.mark_resumed() {
            tracing::warn!(job_id = %id, status = %rec.status, "resume rejected");
            return false;
        }
        self.inner.publish(rec);
        let generation = rec.generation;
        self.inner.enqueue(&handle, *id, generation);
        tracing::info!(job_id = %id, "job resumed");
        true
    }

    /// pending/active/paused -> canceled. An active attempt is aborted and
    /// partial files are removed.
    pub fn cancel(&self, id: &JobId) -> bool {
        let mut state = self.inner.lock();
        let Phase::Running(handle) = state.phase.clone() else {
            tracing::warn!(job_id = %id, "cancel rejected: manager is not running");
            return false;
        };
        let Some(rec) = state.registry.get_mut(id) else {
            tracing::warn!(job_id = %id, "cancel: job not found");
            return false;
        };
        let previous = rec.status;
        if !rec.mark_canceled() {
            tracing::warn!(job_id = %id, status = %rec.status, "cancel rejected");
            return false;
        }
        self.inner.publish(rec);
        let (dir, source_id) = (rec.output_dir.clone(), rec.source_id.clone());
        match previous {
            JobStatus::Active => {
                // The aborted attempt cleans up once its fetch has been dropped.
                state.registry.clear_active(id);
                self.inner.control.request_abort(id);
            }
            JobStatus::Paused => {
                // A paused attempt may have left partial files behind.
                handle.spawn(async move {
                    remove_partial_artifacts(&dir, &source_id).await;
                });
            }
            _ => {}
        }
        tracing::info!(job_id = %id, from = %previous, "job canceled");
        true
    }

    /// Delete a terminal job from the registry.
    pub fn remove(&self, id: &JobId) -> bool {
        let mut state = self.inner.lock();
        if matches!(state.phase, Phase::Created) {
            tracing::warn!(job_id = %id, "remove rejected: manager is not initialized");
            return false;
        }
        let Some(status) = state.registry.get(id).map(|r| r.status) else {
            tracing::warn!(job_id = %id, "remove: job not found");
            return false;
        };
        if !status.is_terminal() {
            tracing::warn!(job_id = %id, %status, "remove rejected: job is not finished");
            return false;
        }
        state.registry.remove(id);
        self.inner.notifier.publish(JobEvent::Removed(*id));
        tracing::info!(job_id = %id, "job removed");
        true
    }

    /// Remove every completed job. Returns how many were removed.
    pub fn clear_completed(&self) -> usize {
        let mut state = self.inner.lock();
        if matches!(state.phase, Phase::Created) {
            return 0;
        }
        let done = state.registry.list_by_status(JobStatus::Completed);
        for rec in &done {
            state.registry.remove(&rec.id);
            self.inner.notifier.publish(JobEvent::Removed(rec.id));
        }
        if !done.is_empty() {
            tracing::info!(count = done.len(), "cleared completed jobs");
        }
        done.len()
    }

    /// Queue a fresh job for a failed or canceled one, with the same source,
    /// destination, format and quality. The old record is left untouched.
    pub async fn retry(&self, id: &JobId) -> Option<JobId> {
        let Some(rec) = self.get_by_id(id) else {
            tracing::warn!(job_id = %id, "retry: job not found");
            return None;
        };
        if !matches!(rec.status, JobStatus::Failed | JobStatus::Canceled) {
            tracing::warn!(job_id = %id, status = %rec.status, "retry rejected");
            return None;
        }
        let req = SubmitRequest {
            url: rec.source_url,
            source_id: rec.source_id,
            title: rec.display_name,
            output_dir: rec.output_dir,
            options: DownloadOptions {
                format: Some(rec.format),
                quality: Some(rec.quality),
            },
            group_id: rec.group_id,
            thumbnail: rec.thumbnail,
        };
        match self.submit(req).await {
            Ok(new_id) => {
                tracing::info!(job_id = %id, %new_id, "job retried");
                Some(new_id)
            }
            Err(e) => {
                tracing::warn!(job_id = %id, "retry failed: {e}");
                None
            }
        }
    }
}
