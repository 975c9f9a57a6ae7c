//! Task processing statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Snapshot of task processing statistics.
///
/// All counters are monotonic. Fields are read one by one, so a snapshot taken
/// while processing calls are running may mix values from slightly different
/// moments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Total number of tasks processed.
    pub task_processed_total: u64,
    /// Tasks processed directly inside `schedule` or `schedule_and_wait`.
    pub task_processed_in_place: u64,
    /// Tasks processed inside `process_frame_and_tasks`.
    pub task_processed_in_frame: u64,
    /// Times task processing outside a frame call gave way to a frame call.
    pub preemptions: u64,
    /// Times the external scheduler was asked to invoke task processing.
    pub scheduler_calls: u64,
    /// Times a pending external invocation was cancelled.
    pub scheduler_cancellations: u64,
}

impl PipelineStats {
    /// Tasks processed by `process_tasks` invocations.
    #[must_use]
    pub const fn task_processed_async(&self) -> u64 {
        self.task_processed_total
            .saturating_sub(self.task_processed_in_place)
            .saturating_sub(self.task_processed_in_frame)
    }
}

/// Where a task was processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessedBy {
    InPlace,
    InFrame,
    Async,
}

/// Internal counters for pipeline statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct PipelineCounters {
    task_processed_total: AtomicU64,
    task_processed_in_place: AtomicU64,
    task_processed_in_frame: AtomicU64,
    preemptions: AtomicU64,
    scheduler_calls: AtomicU64,
    scheduler_cancellations: AtomicU64,
}

impl PipelineCounters {
    pub(crate) fn task_processed(&self, by: ProcessedBy) {
        self.task_processed_total.fetch_add(1, Ordering::Relaxed);
        match by {
            ProcessedBy::InPlace => {
                self.task_processed_in_place.fetch_add(1, Ordering::Release);
            }
            ProcessedBy::InFrame => {
                self.task_processed_in_frame.fetch_add(1, Ordering::Release);
            }
            ProcessedBy::Async => {}
        }
    }

    pub(crate) fn preempted(&self) {
        self.preemptions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn scheduler_called(&self) {
        self.scheduler_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn scheduler_cancelled(&self) {
        self.scheduler_cancellations.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current statistics.
    pub(crate) fn snapshot(&self) -> PipelineStats {
        // Total is bumped first and read last, so it never trails the
        // per-origin counters in a snapshot.
        let task_processed_in_place = self.task_processed_in_place.load(Ordering::Acquire);
        let task_processed_in_frame = self.task_processed_in_frame.load(Ordering::Acquire);
        PipelineStats {
            task_processed_in_place,
            task_processed_in_frame,
            preemptions: self.preemptions.load(Ordering::Relaxed),
            scheduler_calls: self.scheduler_calls.load(Ordering::Relaxed),
            scheduler_cancellations: self.scheduler_cancellations.load(Ordering::Relaxed),
            task_processed_total: self.task_processed_total.load(Ordering::Relaxed),
        }
    }
}
