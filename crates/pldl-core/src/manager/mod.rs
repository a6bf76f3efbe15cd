//! Download manager: ties the bounded queue, the job registry and the
//! notifier together and owns every job state transition.
//!
//! All registry mutations happen under one mutex, and nothing awaits while it
//! is held. Each dispatch attempt carries the job's generation; pause, cancel
//! and resume bump it, so callbacks from an attempt that was superseded are
//! dropped instead of overwriting newer state.

mod dispatch;
mod lifecycle;
mod submit;

pub use submit::SubmitRequest;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;

use crate::config::SettingsSource;
use crate::control::JobControl;
use crate::destination::{DestinationResolver, FsDestinationResolver};
use crate::error::{ManagerError, ManagerResult};
use crate::fetch::MediaFetcher;
use crate::job::{JobId, JobRecord, JobStatus, QueueStats};
use crate::notifier::{JobEvent, ProgressNotifier, ProgressSink};
use crate::queue::BoundedQueue;
use crate::registry::JobRegistry;

const DEFAULT_EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone)]
enum Phase {
    Created,
    Running(Handle),
    ShuttingDown,
}

#[derive(Debug)]
struct ManagerState {
    registry: JobRegistry,
    phase: Phase,
}

pub(crate) struct Inner {
    fetcher: Arc<dyn MediaFetcher>,
    resolver: Arc<dyn DestinationResolver>,
    settings: Arc<dyn SettingsSource>,
    queue: BoundedQueue,
    control: JobControl,
    notifier: ProgressNotifier,
    job_timeout: Option<Duration>,
    state: Mutex<ManagerState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, record: &JobRecord) {
        self.notifier.publish(JobEvent::Updated(record.clone()));
    }
}

/// Construction-time options for [`DownloadManager`].
pub struct DownloadManagerBuilder {
    fetcher: Arc<dyn MediaFetcher>,
    settings: Arc<dyn SettingsSource>,
    resolver: Option<Arc<dyn DestinationResolver>>,
    sink: Option<Arc<dyn ProgressSink>>,
    job_timeout: Option<Duration>,
    event_buffer: usize,
}

impl DownloadManagerBuilder {
    /// Defaults to [`FsDestinationResolver`] over the same settings.
    pub fn resolver(mut self, resolver: Arc<dyn DestinationResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Fail an attempt that runs longer than `timeout`. Off by default.
    pub fn job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout.filter(|d| !d.is_zero());
        self
    }

    /// Capacity of the per-subscriber event buffer.
    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    pub fn build(self) -> DownloadManager {
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(FsDestinationResolver::new(Arc::clone(&self.settings))));
        let notifier = ProgressNotifier::new(self.event_buffer);
        notifier.set_sink(self.sink);
        DownloadManager {
            inner: Arc::new(Inner {
                fetcher: self.fetcher,
                resolver,
                queue: BoundedQueue::new(self.settings.concurrent_downloads()),
                settings: self.settings,
                control: JobControl::new(),
                notifier,
                job_timeout: self.job_timeout,
                state: Mutex::new(ManagerState {
                    registry: JobRegistry::new(),
                    phase: Phase::Created,
                }),
            }),
        }
    }
}

/// Cheap to clone; clones share the same jobs.
#[derive(Clone)]
pub struct DownloadManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadManager")
            .field("concurrency", &self.inner.queue.concurrency())
            .field("stats", &self.queue_stats())
            .finish()
    }
}

impl DownloadManager {
    pub fn builder(
        fetcher: Arc<dyn MediaFetcher>,
        settings: Arc<dyn SettingsSource>,
    ) -> DownloadManagerBuilder {
        DownloadManagerBuilder {
            fetcher,
            settings,
            resolver: None,
            sink: None,
            job_timeout: None,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    /// Read the concurrency setting and start event delivery. Must be called
    /// from within a Tokio runtime; jobs are dispatched on that runtime.
    /// Calling it again is a no-op.
    pub fn initialize(&self) -> ManagerResult<()> {
        let handle = Handle::try_current().map_err(|_| ManagerError::NoRuntime)?;
        let mut state = self.inner.lock();
        match state.phase {
            Phase::Running(_) => {
                tracing::debug!("download manager already initialized");
                return Ok(());
            }
            Phase::ShuttingDown => return Err(ManagerError::ShuttingDown),
            Phase::Created => {}
        }
        let concurrency = self.inner.settings.concurrent_downloads();
        self.inner.queue.set_concurrency(concurrency);
        {
            let _rt = handle.enter();
            self.inner.notifier.start();
        }
        state.phase = Phase::Running(handle);
        tracing::info!(concurrency, "download manager initialized");
        Ok(())
    }

    /// Pause every active job, abort its attempt and refuse further work.
    /// Pending jobs stay pending. Returns the number of jobs paused.
    pub fn shutdown(&self) -> usize {
        let mut state = self.inner.lock();
        if matches!(state.phase, Phase::ShuttingDown) {
            return 0;
        }
        state.phase = Phase::ShuttingDown;
        let mut paused = 0;
        for id in state.registry.active_ids() {
            state.registry.clear_active(&id);
            if let Some(rec) = state.registry.get_mut(&id) {
                if rec.mark_paused() {
                    paused += 1;
                    self.inner.publish(rec);
                }
            }
        }
        drop(state);
        let aborted = self.inner.control.abort_all();
        tracing::info!(paused, aborted, "download manager shut down");
        paused
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.inner.lock().phase, Phase::Running(_))
    }

    pub fn get_all(&self) -> Vec<JobRecord> {
        self.inner.lock().registry.list_all()
    }

    pub fn get_by_id(&self, id: &JobId) -> Option<JobRecord> {
        self.inner.lock().registry.get(id)
    }

    pub fn get_by_group(&self, group_id: &str) -> Vec<JobRecord> {
        self.inner.lock().registry.list_by_group(group_id)
    }

    pub fn get_by_status(&self, status: JobStatus) -> Vec<JobRecord> {
        self.inner.lock().registry.list_by_status(status)
    }

    pub fn queue_stats(&self) -> QueueStats {
        QueueStats::from_records(self.inner.lock().registry.records())
    }

    /// Number of jobs currently in the active set.
    pub fn active_count(&self) -> usize {
        self.inner.lock().registry.active_count()
    }

    /// Re-read the concurrency setting and apply it to the queue.
    pub fn update_concurrency(&self) -> usize {
        let n = self.inner.settings.concurrent_downloads();
        self.set_concurrency(n);
        n
    }

    /// Change the parallelism cap. Running downloads are not interrupted.
    pub fn set_concurrency(&self, n: usize) {
        self.inner.queue.set_concurrency(n);
        tracing::info!(concurrency = self.inner.queue.concurrency(), "concurrency updated");
    }

    pub fn concurrency(&self) -> usize {
        self.inner.queue.concurrency()
    }

    /// Independent stream of every job event from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.notifier.subscribe()
    }

    /// Replace or clear the primary progress sink.
    pub fn set_sink(&self, sink: Option<Arc<dyn ProgressSink>>) {
        self.inner.notifier.set_sink(sink);
    }

    /// Runtime handle, or why new work is refused.
    pub(crate) fn ensure_running(&self) -> ManagerResult<Handle> {
        match &self.inner.lock().phase {
            Phase::Running(handle) => Ok(handle.clone()),
            Phase::Created => Err(ManagerError::NotInitialized),
            Phase::ShuttingDown => Err(ManagerError::ShuttingDown),
        }
    }

    pub(crate) fn resolver(&self) -> Arc<dyn DestinationResolver> {
        Arc::clone(&self.inner.resolver)
    }
}
