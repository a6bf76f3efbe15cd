//! RAII slot handles for the bounded queue.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

use super::Shared;

/// One unit of queue capacity. Released back to the queue when dropped,
/// including when the owning task panics.
#[derive(Debug)]
pub struct Slot {
    shared: Arc<Shared>,
}

impl Slot {
    pub(super) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.shared.release();
    }
}

/// A place in line. Resolves to a [`Slot`] once the queue grants one.
///
/// If dropped after the grant was sent but before it was observed, the
/// granted slot is returned so capacity is never lost.
pub(super) struct PendingSlot {
    rx: Option<oneshot::Receiver<()>>,
    shared: Arc<Shared>,
}

impl PendingSlot {
    pub(super) fn new(rx: oneshot::Receiver<()>, shared: Arc<Shared>) -> Self {
        Self {
            rx: Some(rx),
            shared,
        }
    }
}

impl Future for PendingSlot {
    type Output = Slot;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Slot> {
        let this = self.get_mut();
        let Some(rx) = this.rx.as_mut() else {
            return Poll::Pending;
        };
        match Pin::new(rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(granted) => {
                this.rx = None;
                if granted.is_err() {
                    // Sender vanished without granting; count ourselves in so
                    // the matching release on drop stays balanced.
                    this.shared.lock().running += 1;
                }
                Poll::Ready(Slot::new(Arc::clone(&this.shared)))
            }
        }
    }
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
            if rx.try_recv().is_ok() {
                self.shared.release();
            }
        }
    }
}
