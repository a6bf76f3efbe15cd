//! Progress fan-out.
//!
//! `publish` never blocks: events go into an unbounded channel and a forwarder
//! task hands each one to the optional primary sink, then to every broadcast
//! subscriber. Delivery order matches publish order, so per-job ordering is
//! preserved as long as publishers publish from inside the manager's critical
//! section.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::job::{JobId, JobRecord};

/// One change visible to observers.
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// Snapshot taken right after a state or progress change.
    Updated(JobRecord),
    /// The record was deleted from the registry.
    Removed(JobId),
}

impl JobEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            JobEvent::Updated(r) => r.id,
            JobEvent::Removed(id) => *id,
        }
    }
}

/// The primary UI surface. Errors are logged and otherwise ignored.
pub trait ProgressSink: Send + Sync {
    fn deliver(&self, event: &JobEvent) -> anyhow::Result<()>;
}

impl<F> ProgressSink for F
where
    F: Fn(&JobEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn deliver(&self, event: &JobEvent) -> anyhow::Result<()> {
        self(event)
    }
}

type SinkSlot = Arc<RwLock<Option<Arc<dyn ProgressSink>>>>;

pub struct ProgressNotifier {
    tx: mpsc::UnboundedSender<JobEvent>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<JobEvent>>>,
    sink: SinkSlot,
    broadcast: broadcast::Sender<JobEvent>,
}

impl std::fmt::Debug for ProgressNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressNotifier")
            .field("subscribers", &self.broadcast.receiver_count())
            .finish_non_exhaustive()
    }
}

impl ProgressNotifier {
    /// `buffer` bounds how far a broadcast subscriber may lag before it
    /// starts missing events.
    pub fn new(buffer: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (broadcast, _) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            sink: Arc::new(RwLock::new(None)),
            broadcast,
        }
    }

    /// Replace (or clear) the primary sink.
    pub fn set_sink(&self, sink: Option<Arc<dyn ProgressSink>>) {
        *self.sink.write().unwrap_or_else(PoisonError::into_inner) = sink;
    }

    /// Independent event stream for one observer.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.broadcast.subscribe()
    }

    /// Queue an event for delivery. Safe to call while holding a lock.
    pub fn publish(&self, event: JobEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("progress forwarder is gone; event dropped");
        }
    }

    /// Start the forwarder task. Returns `None` if it was already started.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        let mut rx = self
            .rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        let sink = Arc::clone(&self.sink);
        let broadcast = self.broadcast.clone();
        Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let current = sink.read().unwrap_or_else(PoisonError::into_inner).clone();
                if let Some(sink) = current {
                    if let Err(e) = sink.deliver(&event) {
                        tracing::warn!(job_id = %event.job_id(), "progress sink failed: {e:#}");
                    }
                }
                // No subscribers is not an error.
                let _ = broadcast.send(event);
            }
            tracing::debug!("progress forwarder stopped");
        }))
    }
}
