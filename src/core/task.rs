//! Tasks, their lifecycle, and completion delivery.
//!
//! A [`Task`] is owned by the caller through an `Arc`. The pipeline keeps a
//! clone only while the task is queued or being processed, and hands the outcome
//! back exactly once per scheduling: either by calling a [`CompletionHandler`]
//! or by releasing the [`CompletionSignal`] a blocked `schedule_and_wait` caller
//! sleeps on.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, Thread};
use std::time::Duration;

use crate::core::PipelineError;

/// Unique task identifier, used in logs and errors.
pub type TaskId = u64;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    /// Created, never scheduled.
    New = 0,
    /// Queued or being processed.
    Scheduled = 1,
    /// Processed; the outcome is final.
    Finished = 2,
}

impl TaskState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::New,
            1 => Self::Scheduled,
            _ => Self::Finished,
        }
    }
}

/// A unit of asynchronous work carrying a payload for the pipeline executor.
///
/// Only the pipeline can move a task through its lifecycle; callers observe
/// the state and read the outcome once it is [`TaskState::Finished`].
pub struct Task<P> {
    id: TaskId,
    state: AtomicU8,
    // Written before `state` becomes Finished.
    success: AtomicBool,
    payload: P,
}

impl<P> Task<P> {
    /// Create a new task around `payload`.
    pub fn new(payload: P) -> Self {
        Self {
            id: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
            state: AtomicU8::new(TaskState::New as u8),
            success: AtomicBool::new(false),
            payload,
        }
    }

    /// Task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Payload passed to the executor.
    #[must_use]
    pub const fn payload(&self) -> &P {
        &self.payload
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether the task reached [`TaskState::Finished`].
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state() == TaskState::Finished
    }

    /// Whether the task finished and succeeded.
    #[must_use]
    pub fn success(&self) -> bool {
        self.is_finished() && self.success.load(Ordering::Acquire)
    }

    /// Enter Scheduled from New, or from Finished to start a new lifecycle.
    pub(crate) fn mark_scheduled(&self) -> Result<(), PipelineError> {
        for from in [TaskState::New, TaskState::Finished] {
            if self
                .state
                .compare_exchange(
                    from as u8,
                    TaskState::Scheduled as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return Ok(());
            }
        }
        Err(PipelineError::TaskAlreadyScheduled(self.id))
    }

    fn finish(&self, success: bool) {
        self.success.store(success, Ordering::Release);
        self.state.store(TaskState::Finished as u8, Ordering::Release);
    }
}

impl<P: fmt::Debug> fmt::Debug for Task<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("success", &self.success.load(Ordering::Acquire))
            .field("payload", &self.payload)
            .finish()
    }
}

/// Receives tasks scheduled with `TaskPipeline::schedule` once they finish.
///
/// Called on whichever thread processed the task, possibly while the pipeline
/// lock is held, so implementations should return quickly and must not call
/// back into the pipeline's frame processing.
pub trait CompletionHandler<P>: Send + Sync {
    /// Called exactly once when `task` becomes finished.
    fn task_finished(&self, task: &Task<P>);
}

impl<P, F> CompletionHandler<P> for F
where
    F: Fn(&Task<P>) + Send + Sync,
{
    fn task_finished(&self, task: &Task<P>) {
        self(task);
    }
}

/// One-shot completion signal for a blocked `schedule_and_wait` caller.
///
/// Releasing never takes a lock: the releasing thread flips one atomic and, if
/// a waiter is parked, unparks it. The first thread to wait registers itself
/// for the wake-up; any other waiter polls.
#[derive(Debug, Default)]
pub struct CompletionSignal {
    state: AtomicU8,
    waiter: OnceLock<Thread>,
}

const SIGNAL_IDLE: u8 = 0;
const SIGNAL_WAITING: u8 = 1;
const SIGNAL_RELEASED: u8 = 2;

/// Park interval for waiters other than the registered one.
const SECONDARY_WAIT_POLL: Duration = Duration::from_millis(1);

impl CompletionSignal {
    /// Create an unreleased signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the signal was released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.state.load(Ordering::Acquire) == SIGNAL_RELEASED
    }

    /// Wake the waiter.
    pub fn release(&self) {
        if self.state.swap(SIGNAL_RELEASED, Ordering::AcqRel) == SIGNAL_WAITING {
            // Registered before the state became WAITING.
            if let Some(waiter) = self.waiter.get() {
                waiter.unpark();
            }
        }
    }

    /// Block until [`release`](Self::release) was called.
    pub fn wait(&self) {
        if self.is_released() {
            return;
        }
        if self.waiter.set(thread::current()).is_err() {
            while !self.is_released() {
                thread::park_timeout(SECONDARY_WAIT_POLL);
            }
            return;
        }
        if self
            .state
            .compare_exchange(SIGNAL_IDLE, SIGNAL_WAITING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        // Spurious wake-ups are possible.
        while !self.is_released() {
            thread::park();
        }
    }
}

/// How a finished task is reported back.
pub(crate) enum Completion<P> {
    Handler(Arc<dyn CompletionHandler<P>>),
    Signal(Arc<CompletionSignal>),
}

/// A scheduled task together with its completion route.
pub(crate) struct QueuedTask<P> {
    task: Arc<Task<P>>,
    completion: Completion<P>,
}

impl<P> QueuedTask<P> {
    pub(crate) const fn new(task: Arc<Task<P>>, completion: Completion<P>) -> Self {
        Self { task, completion }
    }

    pub(crate) fn task(&self) -> &Task<P> {
        &self.task
    }

    /// Publish the outcome and deliver the completion. Consumes the entry, so
    /// delivery happens once.
    pub(crate) fn complete(self, success: bool) {
        self.task.finish(success);
        match self.completion {
            Completion::Handler(handler) => handler.task_finished(&self.task),
            Completion::Signal(signal) => signal.release(),
        }
    }
}
