//! Bridge between the pipeline and an external task scheduler.
//!
//! The pipeline has no thread of its own. When tasks are left over and nothing
//! else is going to process them, it asks a [`TaskScheduler`] to call
//! [`TaskProcessor::process_tasks`] later, from some other thread. A frame call
//! cancels any such pending invocation before it starts.
//!
//! All scheduler calls are made under the bridge mutex, which is only ever
//! acquired with `try_lock`. A caller that loses the race leaves a rerun mark so
//! the holder repeats the request on its behalf.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::util::clock::Nanoseconds;

/// Something whose pending tasks an external scheduler can process.
pub trait TaskProcessor: Send + Sync {
    /// Process pending tasks for as long as the pipeline allows.
    fn process_tasks(&self);
}

/// Shared handle passed to a [`TaskScheduler`].
pub type ProcessorRef = Arc<dyn TaskProcessor>;

/// External scheduler that invokes task processing on its own threads.
///
/// Both methods may be called from any thread, including the real-time frame
/// thread, so they should not block for long.
pub trait TaskScheduler: Send + Sync {
    /// Arrange for `processor.process_tasks()` to be called at or after
    /// `deadline`, in the executor's time base. A deadline of zero means as
    /// soon as possible. Calling again for the same processor replaces the
    /// previous request.
    fn schedule_task_processing(&self, processor: &ProcessorRef, deadline: Nanoseconds);

    /// Withdraw a pending request for `processor`, if any. An invocation that
    /// already started may still run.
    fn cancel_task_processing(&self, processor: &ProcessorRef);
}

impl<S: TaskScheduler + ?Sized> TaskScheduler for Arc<S> {
    fn schedule_task_processing(&self, processor: &ProcessorRef, deadline: Nanoseconds) {
        (**self).schedule_task_processing(processor, deadline);
    }

    fn cancel_task_processing(&self, processor: &ProcessorRef) {
        (**self).cancel_task_processing(processor);
    }
}

/// State of asynchronous task processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BridgeState {
    /// No invocation requested or running.
    NotScheduled = 0,
    /// The scheduler was asked to invoke `process_tasks`.
    Scheduled = 1,
    /// `process_tasks` is running.
    Running = 2,
}

impl BridgeState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::NotScheduled,
            1 => Self::Scheduled,
            _ => Self::Running,
        }
    }
}

/// Outcome of [`AsyncBridge::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cancellation {
    /// State seen by the cancelling caller.
    pub(crate) observed: BridgeState,
    /// Whether the scheduler was told to withdraw its invocation.
    pub(crate) cancelled: bool,
}

pub(crate) struct AsyncBridge<S> {
    scheduler: S,
    lock: Mutex<()>,
    state: AtomicU8,
    rerun: AtomicBool,
}

impl<S: TaskScheduler> AsyncBridge<S> {
    pub(crate) const fn new(scheduler: S) -> Self {
        Self {
            scheduler,
            lock: Mutex::new(()),
            state: AtomicU8::new(BridgeState::NotScheduled as u8),
            rerun: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> BridgeState {
        BridgeState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) const fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Ask the scheduler for an invocation unless one is pending or running.
    ///
    /// `decide` runs under the bridge mutex and returns the deadline to request,
    /// or `None` when no invocation is needed. Returns whether the scheduler was
    /// called.
    pub(crate) fn request<F>(&self, processor: &ProcessorRef, mut decide: F) -> bool
    where
        F: FnMut() -> Option<Nanoseconds>,
    {
        let mut scheduled = false;
        self.rerun.store(true, Ordering::SeqCst);

        while self.rerun.load(Ordering::SeqCst) {
            let Some(_guard) = self.lock.try_lock() else {
                // The holder sees our mark after unlocking and repeats.
                return scheduled;
            };
            self.rerun.store(false, Ordering::SeqCst);

            if self.state() != BridgeState::NotScheduled {
                continue;
            }
            let Some(deadline) = decide() else {
                continue;
            };

            // Published first: the scheduler may invoke the processor before
            // returning.
            self.state.store(BridgeState::Scheduled as u8, Ordering::SeqCst);
            self.scheduler.schedule_task_processing(processor, deadline);
            scheduled = true;
            tracing::trace!(deadline = deadline, "async task processing requested");
        }

        scheduled
    }

    /// Withdraw a pending invocation.
    ///
    /// Losing the mutex to a concurrent request leaves that request in place;
    /// the observed state is still reported so the caller can tell a running
    /// invocation apart.
    pub(crate) fn cancel(&self, processor: &ProcessorRef) -> Cancellation {
        let Some(_guard) = self.lock.try_lock() else {
            return Cancellation {
                observed: self.state(),
                cancelled: false,
            };
        };
        match self.state.compare_exchange(
            BridgeState::Scheduled as u8,
            BridgeState::NotScheduled as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => {
                self.scheduler.cancel_task_processing(processor);
                Cancellation {
                    observed: BridgeState::Scheduled,
                    cancelled: true,
                }
            }
            Err(raw) => Cancellation {
                observed: BridgeState::from_u8(raw),
                cancelled: false,
            },
        }
    }

    /// Enter [`BridgeState::Running`]. Returns `false` if another invocation is
    /// already running.
    pub(crate) fn begin_running(&self) -> bool {
        let running = BridgeState::Running as u8;
        for from in [BridgeState::Scheduled, BridgeState::NotScheduled] {
            if self
                .state
                .compare_exchange(from as u8, running, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return true;
            }
        }
        false
    }

    pub(crate) fn finish_running(&self) {
        let _ = self.state.compare_exchange(
            BridgeState::Running as u8,
            BridgeState::NotScheduled as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}
