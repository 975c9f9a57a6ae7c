//! Lock-free FIFO of scheduled tasks.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::core::task::QueuedTask;

/// Unbounded multi-producer queue of pending tasks.
///
/// Backed by an unbounded crossbeam channel, whose send and receive paths are
/// lock-free. Any number of threads may push concurrently; popping only
/// happens under the pipeline lock, so there is a single logical consumer.
pub(crate) struct TaskQueue<P> {
    tx: Sender<QueuedTask<P>>,
    rx: Receiver<QueuedTask<P>>,
}

impl<P> TaskQueue<P> {
    pub(crate) fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub(crate) fn push(&self, entry: QueuedTask<P>) {
        // Both ends live in `self`, so the channel can't be disconnected here.
        if self.tx.send(entry).is_err() {
            tracing::error!("task queue disconnected");
        }
    }

    pub(crate) fn try_pop(&self) -> Option<QueuedTask<P>> {
        self.rx.try_recv().ok()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.rx.len()
    }
}
