//! One dispatch attempt: pending -> active -> completed/failed, guarded by
//! the attempt generation at every step.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::{Inner, Phase};
use crate::cleanup::remove_partial_artifacts;
use crate::fetch::{FetchError, FetchRequest, ProgressCallback, ProgressUpdate};
use crate::job::{JobId, JobStatus};

enum Outcome {
    Finished(Result<PathBuf, FetchError>),
    TimedOut(Duration),
    Aborted,
}

/// Progress reporter handed to the fetcher for one attempt.
struct AttemptReporter {
    inner: Arc<Inner>,
    id: JobId,
    generation: u64,
}

impl ProgressCallback for AttemptReporter {
    fn report(&self, update: ProgressUpdate) {
        self.inner.apply_progress(self.id, self.generation, update);
    }
}

fn panic_error(panic: Box<dyn Any + Send>) -> FetchError {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    FetchError::Other(format!("fetcher panicked: {detail}"))
}

impl Inner {
    /// Runs while holding a queue slot.
    pub(super) async fn run_attempt(self: &Arc<Self>, id: JobId, generation: u64) {
        let Some((request, token)) = self.begin_attempt(id, generation) else {
            return;
        };

        let outcome = if let Err(e) = tokio::fs::create_dir_all(&request.output_dir).await {
            Outcome::Finished(Err(FetchError::Io(e)))
        } else {
            let reporter = AttemptReporter {
                inner: Arc::clone(self),
                id,
                generation,
            };
            // A panicking fetcher fails its job instead of unwinding the queue task.
            let fetch = AssertUnwindSafe(self.fetcher.fetch(&request, &reporter))
                .catch_unwind()
                .map(|res| res.unwrap_or_else(|panic| Err(panic_error(panic))));
            let timeout = self.job_timeout;
            tokio::select! {
                _ = token.cancelled() => Outcome::Aborted,
                outcome = async move {
                    match timeout {
                        Some(limit) => match tokio::time::timeout(limit, fetch).await {
                            Ok(res) => Outcome::Finished(res),
                            Err(_) => Outcome::TimedOut(limit),
                        },
                        None => Outcome::Finished(fetch.await),
                    }
                } => outcome,
            }
        };
        self.control.unregister(&id, generation);

        match outcome {
            Outcome::Finished(Ok(path)) => {
                self.complete_attempt(id, generation, path);
            }
            Outcome::Finished(Err(e)) => {
                if self.fail_attempt(id, generation, e.to_string()) {
                    remove_partial_artifacts(&request.output_dir, &request.source_id).await;
                }
            }
            Outcome::TimedOut(limit) => {
                let message = format!("timed out after {limit:?}");
                if self.fail_attempt(id, generation, message) {
                    remove_partial_artifacts(&request.output_dir, &request.source_id).await;
                }
            }
            Outcome::Aborted => {
                tracing::debug!(job_id = %id, generation, "attempt aborted");
                let canceled = self
                    .lock()
                    .registry
                    .get(&id)
                    .is_some_and(|r| r.status == JobStatus::Canceled);
                if canceled {
                    remove_partial_artifacts(&request.output_dir, &request.source_id).await;
                }
            }
        }
    }

    /// pending -> active, if this attempt is still the current one.
    fn begin_attempt(
        &self,
        id: JobId,
        generation: u64,
    ) -> Option<(FetchRequest, tokio_util::sync::CancellationToken)> {
        let mut state = self.lock();
        if !matches!(state.phase, Phase::Running(_)) {
            tracing::debug!(job_id = %id, "not dispatching: manager is not running");
            return None;
        }
        let rec = match state.registry.get_mut(&id) {
            Some(rec) => rec,
            None => {
                tracing::debug!(job_id = %id, "not dispatching: job was removed");
                return None;
            }
        };
        if rec.status != JobStatus::Pending || rec.generation != generation {
            tracing::debug!(
                job_id = %id,
                status = %rec.status,
                generation,
                current = rec.generation,
                "skipping stale dispatch"
            );
            return None;
        }
        rec.mark_active();
        let request = FetchRequest {
            job_id: id,
            url: rec.source_url.clone(),
            output_dir: rec.output_dir.clone(),
            source_id: rec.source_id.clone(),
            format: rec.format.clone(),
            quality: rec.quality.clone(),
        };
        self.publish(rec);
        state.registry.mark_active(id);
        let token = self.control.register(id, generation);
        tracing::info!(job_id = %id, url = %request.url, "download started");
        Some((request, token))
    }

    pub(super) fn apply_progress(&self, id: JobId, generation: u64, update: ProgressUpdate) {
        let mut state = self.lock();
        let Some(rec) = state.registry.get_mut(&id) else {
            return;
        };
        if rec.generation != generation {
            return;
        }
        if rec.apply_progress(update.percent, update.rate, update.eta) {
            self.publish(rec);
        }
    }

    /// active -> completed. Returns false when the attempt was superseded.
    pub(super) fn complete_attempt(&self, id: JobId, generation: u64, path: PathBuf) -> bool {
        let mut state = self.lock();
        let Some(rec) = state.registry.get_mut(&id) else {
            tracing::debug!(job_id = %id, "completion for removed job ignored");
            return false;
        };
        if rec.generation != generation || !rec.mark_completed(path) {
            tracing::debug!(job_id = %id, status = %rec.status, "late completion ignored");
            return false;
        }
        tracing::info!(
            job_id = %id,
            path = %rec.output_path.as_deref().unwrap_or(rec.output_dir.as_path()).display(),
            "download completed"
        );
        self.publish(rec);
        state.registry.clear_active(&id);
        true
    }

    /// active -> failed. Returns false when the attempt was superseded.
    pub(super) fn fail_attempt(&self, id: JobId, generation: u64, message: String) -> bool {
        let mut state = self.lock();
        let Some(rec) = state.registry.get_mut(&id) else {
            return false;
        };
        if rec.generation != generation || !rec.mark_failed(message) {
            tracing::debug!(job_id = %id, status = %rec.status, "late failure ignored");
            return false;
        }
        tracing::warn!(
            job_id = %id,
            error = rec.error_message.as_deref().unwrap_or_default(),
            "download failed"
        );
        self.publish(rec);
        state.registry.clear_active(&id);
        true
    }
}
