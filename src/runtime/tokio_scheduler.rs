//! Tokio-backed [`TaskScheduler`].
//!
//! Each request becomes a tokio task that sleeps until the deadline and then
//! runs `process_tasks` on the blocking pool, so task payloads never stall the
//! async workers. A newer request for the same processor replaces the older
//! one.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::core::{ProcessorRef, TaskScheduler};
use crate::util::clock::{duration_until, now_nanos, Nanoseconds};

type Clock = Arc<dyn Fn() -> Nanoseconds + Send + Sync>;

struct PendingJob {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Pending {
    next_generation: u64,
    jobs: HashMap<usize, PendingJob>,
}

/// Schedules task processing on a tokio runtime.
#[derive(Clone)]
pub struct TokioTaskScheduler {
    handle: Handle,
    clock: Clock,
    pending: Arc<Mutex<Pending>>,
}

fn processor_key(processor: &ProcessorRef) -> usize {
    Arc::as_ptr(processor).cast::<()>().addr()
}

impl TokioTaskScheduler {
    /// Create a scheduler on `handle` using the default process clock.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self::with_clock(handle, now_nanos)
    }

    /// Create a scheduler on the runtime the caller is running in.
    ///
    /// # Errors
    ///
    /// Fails when called outside of a tokio runtime.
    pub fn try_current() -> Result<Self, tokio::runtime::TryCurrentError> {
        Ok(Self::new(Handle::try_current()?))
    }

    /// Create a scheduler whose deadlines are read against `clock`. The clock
    /// must match the pipeline executor's timestamps.
    #[must_use]
    pub fn with_clock<C>(handle: Handle, clock: C) -> Self
    where
        C: Fn() -> Nanoseconds + Send + Sync + 'static,
    {
        Self {
            handle,
            clock: Arc::new(clock),
            pending: Arc::new(Mutex::new(Pending::default())),
        }
    }

    /// Number of requests that have not started yet.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.pending.lock().jobs.len()
    }
}

impl TaskScheduler for TokioTaskScheduler {
    fn schedule_task_processing(&self, processor: &ProcessorRef, deadline: Nanoseconds) {
        let key = processor_key(processor);
        let delay = if deadline == 0 {
            std::time::Duration::ZERO
        } else {
            duration_until(deadline, (self.clock)())
        };

        // Spawned under the lock so the job can't look itself up before it is
        // registered.
        let mut pending = self.pending.lock();
        pending.next_generation += 1;
        let generation = pending.next_generation;

        let processor = Arc::clone(processor);
        let registry = Arc::clone(&self.pending);
        let handle = self.handle.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            {
                let mut pending = registry.lock();
                if pending
                    .jobs
                    .get(&key)
                    .is_some_and(|job| job.generation == generation)
                {
                    pending.jobs.remove(&key);
                }
            }
            if let Err(e) = tokio::task::spawn_blocking(move || processor.process_tasks()).await {
                tracing::error!(error = %e, "task processing job failed");
            }
        });

        if let Some(previous) = pending.jobs.insert(key, PendingJob { generation, handle }) {
            previous.handle.abort();
        }
        tracing::debug!(delay_ns = delay.as_nanos(), "task processing job spawned");
    }

    fn cancel_task_processing(&self, processor: &ProcessorRef) {
        let removed = self.pending.lock().jobs.remove(&processor_key(processor));
        if let Some(job) = removed {
            job.handle.abort();
            tracing::debug!("task processing job cancelled");
        }
    }
}

impl fmt::Debug for TokioTaskScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioTaskScheduler")
            .field("pending_requests", &self.pending_requests())
            .finish_non_exhaustive()
    }
}
