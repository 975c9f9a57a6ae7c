//! Task pipeline: frame processing and asynchronous tasks sharing one
//! execution slot.
//!
//! [`TaskPipeline`] owns no thread. Frames are pushed in by a real-time caller
//! through [`TaskPipeline::process_frame_and_tasks`]; tasks are submitted from
//! any thread with [`TaskPipeline::schedule`] or
//! [`TaskPipeline::schedule_and_wait`]. A single pipeline lock serializes every
//! frame and task. Frame calls are the only callers allowed to block on it; all
//! other entry points use `try_lock` and leave the work to whoever holds the
//! lock, who re-checks the queue after releasing it.
//!
//! Tasks run in one of three places:
//!
//! - in place, inside `schedule*`, when the queue was empty and the lock is free
//! - in frame, in windows between sub-frames of a frame call
//! - asynchronously, when a [`TaskScheduler`] invokes
//!   [`TaskProcessor::process_tasks`]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, trace, warn};

use crate::audio::Frame;
use crate::config::PipelineConfig;
use crate::core::bridge::{AsyncBridge, BridgeState, ProcessorRef, TaskProcessor, TaskScheduler};
use crate::core::executor::PipelineExecutor;
use crate::core::precise::{SampleCounter, TaskWindow, TimeSlicer};
use crate::core::queue::TaskQueue;
use crate::core::stats::{PipelineCounters, PipelineStats, ProcessedBy};
use crate::core::task::{Completion, CompletionHandler, CompletionSignal, QueuedTask, Task};
use crate::core::PipelineError;
use crate::util::clock::{nanos_to_duration, Nanoseconds};
use crate::util::seqlock::TimestampCell;

/// State only touched while holding the pipeline lock.
#[derive(Debug)]
struct ProcessingState {
    counter: SampleCounter,
}

/// Frame processing plus interleaved asynchronous tasks.
///
/// Always lives in an [`Arc`], since the pipeline hands itself to the
/// scheduler as a [`ProcessorRef`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use prometheus_task_pipeline::audio::Frame;
/// use prometheus_task_pipeline::config::PipelineConfig;
/// use prometheus_task_pipeline::core::{
///     PipelineExecutor, ProcessorRef, Task, TaskPipeline, TaskScheduler,
/// };
/// use prometheus_task_pipeline::util::Nanoseconds;
///
/// struct Mixer;
///
/// impl PipelineExecutor for Mixer {
///     type Payload = u32;
///
///     fn process_frame(&self, _frame: &mut Frame<'_>) -> bool {
///         true
///     }
///
///     fn process_task(&self, volume: &u32) -> bool {
///         *volume <= 100
///     }
/// }
///
/// struct Inline;
///
/// impl TaskScheduler for Inline {
///     fn schedule_task_processing(&self, processor: &ProcessorRef, _deadline: Nanoseconds) {
///         processor.process_tasks();
///     }
///
///     fn cancel_task_processing(&self, _processor: &ProcessorRef) {}
/// }
///
/// let pipeline = TaskPipeline::new(PipelineConfig::default(), Mixer, Inline).unwrap();
///
/// let task = Arc::new(Task::new(80));
/// assert!(pipeline.schedule_and_wait(&task).unwrap());
///
/// let mut samples = vec![0.0; 960];
/// assert!(pipeline.process_frame_and_tasks(&mut Frame::new(&mut samples)));
/// assert_eq!(pipeline.stats().task_processed_total, 1);
/// ```
pub struct TaskPipeline<E: PipelineExecutor, S: TaskScheduler> {
    config: PipelineConfig,
    executor: E,
    slicer: TimeSlicer,
    bridge: AsyncBridge<S>,
    pipeline_lock: Mutex<ProcessingState>,
    queue: TaskQueue<E::Payload>,
    pending_tasks: AtomicUsize,
    pending_frames: AtomicUsize,
    next_frame_deadline: TimestampCell,
    counters: PipelineCounters,
    self_ref: Weak<Self>,
}

impl<E, S> TaskPipeline<E, S>
where
    E: PipelineExecutor,
    S: TaskScheduler + 'static,
{
    /// Create a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: PipelineConfig, executor: E, scheduler: S) -> Result<Arc<Self>, PipelineError> {
        config.validate().map_err(PipelineError::InvalidConfig)?;
        let slicer = TimeSlicer::new(&config);

        info!(
            sample_rate = config.sample_rate,
            channels = slicer.spec().num_channels(),
            precise = slicer.is_precise(),
            "task pipeline created"
        );

        Ok(Arc::new_cyclic(|self_ref| Self {
            executor,
            pipeline_lock: Mutex::new(ProcessingState {
                counter: SampleCounter::new(slicer.min_samples()),
            }),
            slicer,
            bridge: AsyncBridge::new(scheduler),
            queue: TaskQueue::new(),
            pending_tasks: AtomicUsize::new(0),
            pending_frames: AtomicUsize::new(0),
            next_frame_deadline: TimestampCell::new(0),
            counters: PipelineCounters::default(),
            self_ref: self_ref.clone(),
            config,
        }))
    }

    /// Schedule `task`; `handler` is called once it finishes.
    ///
    /// Returns without waiting. The task may be processed before this returns,
    /// in which case `handler` runs on this thread.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::TaskAlreadyScheduled`] if the task is queued or
    /// being processed.
    pub fn schedule(
        &self,
        task: &Arc<Task<E::Payload>>,
        handler: Arc<dyn CompletionHandler<E::Payload>>,
    ) -> Result<(), PipelineError> {
        self.submit(task, Completion::Handler(handler))
    }

    /// Schedule `task` and block until it finishes. Returns the task outcome.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::TaskAlreadyScheduled`] if the task is queued or
    /// being processed.
    pub fn schedule_and_wait(&self, task: &Arc<Task<E::Payload>>) -> Result<bool, PipelineError> {
        let signal = Arc::new(CompletionSignal::new());
        self.submit(task, Completion::Signal(Arc::clone(&signal)))?;
        signal.wait();
        Ok(task.success())
    }

    /// Process pending tasks if allowed right now.
    ///
    /// Normally invoked by the [`TaskScheduler`], but safe to call at any time
    /// from any thread. Never blocks: returns early when a frame call is
    /// pending, the lock is taken, or the next frame deadline is too close.
    pub fn process_tasks(&self) {
        if !self.bridge.begin_running() {
            debug!("async task processing already running");
            return;
        }

        self.maybe_process_tasks(ProcessedBy::Async);
        self.bridge.finish_running();

        // Requests made while running were skipped; pick them up here.
        if self.pending_tasks.load(Ordering::SeqCst) != 0 {
            self.request_async_processing();
        }
    }

    /// Process one frame and run pending tasks between its sub-frames.
    ///
    /// Blocks until the pipeline lock is acquired. Returns `false` if
    /// processing of any part of the frame failed; queued tasks are unaffected.
    pub fn process_frame_and_tasks(&self, frame: &mut Frame<'_>) -> bool {
        self.pending_frames.fetch_add(1, Ordering::SeqCst);
        let frame_start = self.executor.timestamp();

        let bridge_state = self.cancel_async_processing();
        let mut state = if bridge_state == BridgeState::Running {
            self.lock_after_running(frame.num_samples())
        } else {
            self.pipeline_lock.lock()
        };

        let success = if self.slicer.is_precise() {
            self.process_frame_precise(&mut state, frame, frame_start)
        } else {
            self.process_frame_simple(frame)
        };
        drop(state);

        if self.pending_frames.fetch_sub(1, Ordering::SeqCst) == 1
            && self.pending_tasks.load(Ordering::SeqCst) != 0
        {
            self.request_async_processing();
        }

        trace!(samples = frame.num_samples(), success = success, "frame processed");
        success
    }

    /// Number of tasks scheduled but not yet taken for processing.
    #[must_use]
    pub fn num_pending_tasks(&self) -> usize {
        self.pending_tasks.load(Ordering::SeqCst)
    }

    /// Number of frame calls waiting for or holding the pipeline lock.
    #[must_use]
    pub fn num_pending_frames(&self) -> usize {
        self.pending_frames.load(Ordering::SeqCst)
    }

    /// Snapshot of processing statistics.
    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    /// Deadline of the next sub-frame or frame, as last published by a frame
    /// call. Zero before the first precise frame.
    #[must_use]
    pub fn next_frame_deadline(&self) -> Nanoseconds {
        self.next_frame_deadline.load()
    }

    /// Current state of asynchronous task processing.
    #[must_use]
    pub fn async_state(&self) -> BridgeState {
        self.bridge.state()
    }

    /// Configuration the pipeline was created with.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Time slicing policy in effect.
    #[must_use]
    pub const fn slicer(&self) -> &TimeSlicer {
        &self.slicer
    }

    /// The frame and task executor.
    #[must_use]
    pub const fn executor(&self) -> &E {
        &self.executor
    }

    /// The external task scheduler.
    #[must_use]
    pub const fn scheduler(&self) -> &S {
        self.bridge.scheduler()
    }

    fn submit(
        &self,
        task: &Arc<Task<E::Payload>>,
        completion: Completion<E::Payload>,
    ) -> Result<(), PipelineError> {
        task.mark_scheduled()?;

        // Counted before the push so the counter never trails the queue.
        let was_empty = self.pending_tasks.fetch_add(1, Ordering::SeqCst) == 0;
        self.queue.push(QueuedTask::new(Arc::clone(task), completion));
        trace!(task_id = task.id(), "task scheduled");

        let needs_async = if was_empty {
            self.maybe_process_tasks(ProcessedBy::InPlace)
        } else {
            true
        };
        if needs_async {
            self.request_async_processing();
        }
        Ok(())
    }

    /// Drain tasks outside of a frame call while allowed. Returns whether the
    /// caller should request asynchronous processing.
    fn maybe_process_tasks(&self, by: ProcessedBy) -> bool {
        {
            let Some(_guard) = self.pipeline_lock.try_lock() else {
                // The holder re-checks the queue after unlocking.
                return false;
            };

            while self.pending_tasks.load(Ordering::SeqCst) != 0 {
                if self.pending_frames.load(Ordering::SeqCst) != 0 {
                    self.counters.preempted();
                    debug!("task processing preempted by frame");
                    break;
                }
                let now = self.executor.timestamp();
                if !self.slicer.interframe_allowed(now, self.next_frame_deadline.load()) {
                    break;
                }
                if !self.process_next_task(by) {
                    break;
                }
            }
        }

        self.pending_tasks.load(Ordering::SeqCst) != 0
    }

    /// Pop and process one task. Must be called under the pipeline lock.
    fn process_next_task(&self, by: ProcessedBy) -> bool {
        let Some(entry) = self.queue.try_pop() else {
            return false;
        };
        self.pending_tasks.fetch_sub(1, Ordering::SeqCst);

        let success = self.executor.process_task(entry.task().payload());
        self.counters.task_processed(by);
        trace!(task_id = entry.task().id(), success = success, by = ?by, "task processed");

        entry.complete(success);
        true
    }

    fn process_frame_simple(&self, frame: &mut Frame<'_>) -> bool {
        let success = self.executor.process_frame(frame);
        while self.process_next_task(ProcessedBy::InFrame) {}
        success
    }

    fn process_frame_precise(
        &self,
        state: &mut ProcessingState,
        frame: &mut Frame<'_>,
        frame_start: Nanoseconds,
    ) -> bool {
        let spec = *self.slicer.spec();
        let mut success = true;

        for subframe in self.slicer.plan(frame_start, frame.num_samples()) {
            let len = subframe.range.len();
            let mut piece = frame.sub_frame(subframe.range, &spec);
            success &= self.executor.process_frame(&mut piece);

            self.next_frame_deadline.store(subframe.deadline);
            state.counter.record(len);

            if self.pending_tasks.load(Ordering::SeqCst) != 0 && state.counter.take_opportunity() {
                let now = self.executor.timestamp();
                let window = self.slicer.window(now, subframe.deadline, !subframe.is_last);
                self.drain_window(window);
            }
        }

        success
    }

    fn drain_window(&self, window: TaskWindow) {
        while window.is_open(self.executor.timestamp())
            && self.process_next_task(ProcessedBy::InFrame)
        {}
    }

    /// Acquire the pipeline lock while async processing is running, giving it
    /// a sub-frame's worth of time to notice the frame and yield.
    fn lock_after_running(&self, frame_len: usize) -> MutexGuard<'_, ProcessingState> {
        let wait = self.slicer.subframe_duration(frame_len);
        if let Some(guard) = self.pipeline_lock.try_lock_for(nanos_to_duration(wait)) {
            return guard;
        }
        warn!(wait_ns = wait, "async task processing did not yield to frame in time");
        self.pipeline_lock.lock()
    }

    fn processor(&self) -> Option<ProcessorRef> {
        self.self_ref.upgrade().map(|pipeline| pipeline as ProcessorRef)
    }

    fn request_async_processing(&self) {
        let Some(processor) = self.processor() else {
            return;
        };
        // One request may reach the scheduler more than once when it reruns
        // on behalf of another caller, so calls are counted where decided.
        self.bridge.request(&processor, || {
            if self.pending_frames.load(Ordering::SeqCst) != 0
                || self.pending_tasks.load(Ordering::SeqCst) == 0
                || self.pipeline_lock.is_locked()
            {
                return None;
            }
            let now = self.executor.timestamp();
            self.counters.scheduler_called();
            Some(self.slicer.async_deadline(now, self.next_frame_deadline.load()))
        });
    }

    fn cancel_async_processing(&self) -> BridgeState {
        let Some(processor) = self.processor() else {
            return self.bridge.state();
        };
        let cancellation = self.bridge.cancel(&processor);
        if cancellation.cancelled {
            self.counters.scheduler_cancelled();
        }
        cancellation.observed
    }
}

impl<E, S> TaskProcessor for TaskPipeline<E, S>
where
    E: PipelineExecutor,
    S: TaskScheduler + 'static,
{
    fn process_tasks(&self) {
        Self::process_tasks(self);
    }
}

impl<E: PipelineExecutor, S: TaskScheduler> Drop for TaskPipeline<E, S> {
    fn drop(&mut self) {
        let pending = *self.pending_tasks.get_mut();
        if pending != 0 {
            warn!(pending_tasks = pending, "task pipeline dropped with unprocessed tasks");
        }
    }
}
