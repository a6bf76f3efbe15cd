//! Bounded work queue.
//!
//! Admits async tasks and runs at most `concurrency` of them at once. Tasks
//! waiting for a slot are served strictly in submission order; when a running
//! task finishes, its slot is handed straight to the oldest waiter. The limit
//! can be changed at runtime: raising it admits waiters immediately, lowering
//! it lets running tasks drain without preemption.

mod slot;

pub use slot::Slot;

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use slot::PendingSlot;

#[derive(Debug)]
struct QueueState {
    limit: usize,
    running: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

#[derive(Debug)]
pub(crate) struct Shared {
    state: Mutex<QueueState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return one slot and offer freed capacity to waiters.
    pub(crate) fn release(&self) {
        let mut state = self.lock();
        state.running = state.running.saturating_sub(1);
        Self::admit_waiters(&mut state);
    }

    fn admit_waiters(state: &mut QueueState) {
        while state.running < state.limit {
            let Some(waiter) = state.waiters.pop_front() else {
                break;
            };
            // A closed receiver means the waiter gave up; try the next one.
            if waiter.send(()).is_ok() {
                state.running += 1;
            }
        }
    }
}

/// Concurrency-limited FIFO task runner. Cheap to clone; clones share limits.
#[derive(Debug, Clone)]
pub struct BoundedQueue {
    shared: Arc<Shared>,
}

impl BoundedQueue {
    /// Create a queue admitting up to `concurrency` tasks (at least 1).
    pub fn new(concurrency: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    limit: concurrency.max(1),
                    running: 0,
                    waiters: VecDeque::new(),
                }),
            }),
        }
    }

    /// Current admission limit.
    pub fn concurrency(&self) -> usize {
        self.shared.lock().limit
    }

    /// Number of tasks currently holding a slot.
    pub fn running(&self) -> usize {
        self.shared.lock().running
    }

    /// Number of tasks waiting for a slot.
    pub fn waiting(&self) -> usize {
        self.shared.lock().waiters.len()
    }

    /// Change the admission limit. Running tasks are never preempted; if the
    /// limit grows, queued tasks are admitted right away.
    pub fn set_concurrency(&self, concurrency: usize) {
        let mut state = self.shared.lock();
        state.limit = concurrency.max(1);
        Shared::admit_waiters(&mut state);
        tracing::debug!(
            limit = state.limit,
            running = state.running,
            waiting = state.waiters.len(),
            "queue concurrency updated"
        );
    }

    /// Wait for a slot. The slot is returned to the queue when dropped.
    pub async fn acquire(&self) -> Slot {
        self.reserve().await
    }

    /// Run `task` once a slot is free and return its output.
    pub async fn run<F>(&self, task: F) -> F::Output
    where
        F: Future,
    {
        let _slot = self.acquire().await;
        task.await
    }

    /// Enqueue `task` and return a handle resolving to its output.
    ///
    /// The task's place in line is taken synchronously, so tasks submitted
    /// one after another from the same caller start in that order. A task
    /// that returns an error or panics only affects its own handle; its slot
    /// is released either way.
    pub fn submit<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let ticket = self.reserve();
        tokio::spawn(async move {
            let _slot = ticket.await;
            task.await
        })
    }

    /// Take a place in line now; the returned future resolves to the slot.
    fn reserve(&self) -> impl Future<Output = Slot> + Send + 'static {
        let shared = Arc::clone(&self.shared);
        let mut state = self.shared.lock();
        let ready = state.waiters.is_empty() && state.running < state.limit;
        let rx = if ready {
            state.running += 1;
            None
        } else {
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            Some(rx)
        };
        drop(state);
        async move {
            match rx {
                None => Slot::new(shared),
                Some(rx) => PendingSlot::new(rx, shared).await,
            }
        }
    }
}
