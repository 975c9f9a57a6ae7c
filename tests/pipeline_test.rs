//! Integration tests for TaskPipeline scheduling and completion
//!
//! These tests validate:
//! - In-place processing on the submitting thread
//! - FIFO processing through the external scheduler
//! - Exactly-once completion across all processing paths
//! - Failure reporting for tasks and frames
//! - Simple (non-precise) mode ordering and preemption

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use prometheus_task_pipeline::audio::Frame;
use prometheus_task_pipeline::config::{PipelineConfig, TaskConfig};
use prometheus_task_pipeline::core::{
    BridgeState, CompletionHandler, PipelineError, PipelineExecutor, ProcessorRef, Task, TaskId,
    TaskPipeline, TaskScheduler, TaskState,
};
use prometheus_task_pipeline::util::Nanoseconds;

// ============================================================================
// HELPER TYPES
// ============================================================================

const START: Nanoseconds = 1_000_000_000;
const MARGIN: Nanoseconds = 100_000;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Frame(usize),
    Task(u32),
}

#[derive(Debug)]
enum Job {
    Run(u32),
    Fail(u32),
    Gate(u32),
}

impl Job {
    const fn id(&self) -> u32 {
        match self {
            Self::Run(id) | Self::Fail(id) | Self::Gate(id) => *id,
        }
    }
}

/// Executor with a manual clock that records everything it processes.
struct Recorder {
    clock: AtomicI64,
    events: Mutex<Vec<Event>>,
    fail_frames: AtomicBool,
    entered: Sender<()>,
    gate: Receiver<()>,
}

impl PipelineExecutor for Recorder {
    type Payload = Job;

    fn timestamp(&self) -> Nanoseconds {
        self.clock.load(Ordering::SeqCst)
    }

    fn process_frame(&self, frame: &mut Frame<'_>) -> bool {
        self.events.lock().push(Event::Frame(frame.num_samples()));
        !self.fail_frames.load(Ordering::SeqCst)
    }

    fn process_task(&self, job: &Job) -> bool {
        if let Job::Gate(_) = job {
            self.entered.send(()).unwrap();
            self.gate.recv().unwrap();
        }
        self.events.lock().push(Event::Task(job.id()));
        !matches!(job, Job::Fail(_))
    }
}

/// Scheduler that remembers the last request and fires only when told to.
#[derive(Default)]
struct ManualScheduler {
    requests: Mutex<Vec<Nanoseconds>>,
    cancels: AtomicUsize,
    processor: Mutex<Option<ProcessorRef>>,
}

impl ManualScheduler {
    fn fire(&self) {
        let processor = self.processor.lock().take();
        if let Some(processor) = processor {
            processor.process_tasks();
        }
    }
}

impl TaskScheduler for ManualScheduler {
    fn schedule_task_processing(&self, processor: &ProcessorRef, deadline: Nanoseconds) {
        self.requests.lock().push(deadline);
        *self.processor.lock() = Some(Arc::clone(processor));
    }

    fn cancel_task_processing(&self, _processor: &ProcessorRef) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.processor.lock().take();
    }
}

type Pipeline = TaskPipeline<Recorder, ManualScheduler>;

struct Harness {
    pipeline: Arc<Pipeline>,
    entered: Receiver<()>,
    gate: Sender<()>,
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn config(precise: bool) -> PipelineConfig {
    PipelineConfig {
        sample_rate: 48_000,
        channel_mask: 0b1,
        tasks: TaskConfig {
            enable_precise_task_scheduling: precise,
            min_samples_between_tasks: 240,
            max_samples_between_tasks: 480,
            task_processing_margin_ns: MARGIN,
            max_inframe_task_processing_ns: 0,
        },
    }
}

fn harness(precise: bool) -> Harness {
    let (entered_tx, entered_rx) = bounded(1);
    let (gate_tx, gate_rx) = bounded(1);
    let executor = Recorder {
        clock: AtomicI64::new(START),
        events: Mutex::new(Vec::new()),
        fail_frames: AtomicBool::new(false),
        entered: entered_tx,
        gate: gate_rx,
    };
    Harness {
        pipeline: TaskPipeline::new(config(precise), executor, ManualScheduler::default()).unwrap(),
        entered: entered_rx,
        gate: gate_tx,
    }
}

fn run_frame(pipeline: &Pipeline, samples: usize) -> bool {
    let mut buf = vec![0.0; samples];
    pipeline.process_frame_and_tasks(&mut Frame::new(&mut buf))
}

/// Move the clock inside the margin before the next frame deadline, where
/// submitted tasks are queued instead of processed.
fn park_inside_margin(pipeline: &Pipeline) {
    run_frame(pipeline, 480);
    let deadline = pipeline.next_frame_deadline();
    pipeline
        .executor()
        .clock
        .store(deadline - MARGIN / 2, Ordering::SeqCst);
}

/// Move the clock past the interval around the next frame deadline.
fn reopen(pipeline: &Pipeline) {
    let deadline = pipeline.next_frame_deadline();
    pipeline
        .executor()
        .clock
        .store(deadline + MARGIN, Ordering::SeqCst);
}

fn noop_handler() -> Arc<dyn CompletionHandler<Job>> {
    Arc::new(|_: &Task<Job>| {})
}

fn task_events(pipeline: &Pipeline) -> Vec<u32> {
    pipeline
        .executor()
        .events
        .lock()
        .iter()
        .filter_map(|e| match e {
            Event::Task(id) => Some(*id),
            Event::Frame(_) => None,
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[test]
fn test_schedule_and_wait_in_place() {
    let h = harness(true);
    let task = Arc::new(Task::new(Job::Run(1)));

    assert!(h.pipeline.schedule_and_wait(&task).unwrap());
    assert_eq!(task.state(), TaskState::Finished);

    let stats = h.pipeline.stats();
    assert_eq!(stats.task_processed_in_place, 1);
    assert_eq!(stats.task_processed_total, 1);
    assert_eq!(stats.scheduler_calls, 0);
    assert!(h.pipeline.scheduler().requests.lock().is_empty());
}

#[test]
fn test_queued_tasks_run_async_in_fifo_order() {
    let h = harness(true);
    park_inside_margin(&h.pipeline);
    let deadline = h.pipeline.next_frame_deadline();

    let tasks: Vec<_> = (0..5).map(|i| Arc::new(Task::new(Job::Run(i)))).collect();
    for task in &tasks {
        h.pipeline.schedule(task, noop_handler()).unwrap();
    }
    assert_eq!(h.pipeline.num_pending_tasks(), 5);
    assert_eq!(h.pipeline.async_state(), BridgeState::Scheduled);
    // Hint points past the interval around the deadline; one request only.
    assert_eq!(
        h.pipeline.scheduler().requests.lock().as_slice(),
        &[deadline + MARGIN]
    );

    reopen(&h.pipeline);
    h.pipeline.scheduler().fire();

    assert_eq!(task_events(&h.pipeline), vec![0, 1, 2, 3, 4]);
    assert!(tasks.iter().all(|t| t.success()));
    let stats = h.pipeline.stats();
    assert_eq!(stats.task_processed_async(), 5);
    assert_eq!(stats.scheduler_calls, 1);
    assert_eq!(h.pipeline.num_pending_tasks(), 0);
    assert_eq!(h.pipeline.async_state(), BridgeState::NotScheduled);
}

#[test]
fn test_each_task_completed_exactly_once() {
    let h = harness(true);
    let deliveries: Arc<Mutex<HashMap<TaskId, usize>>> = Arc::default();
    let handler: Arc<dyn CompletionHandler<Job>> = {
        let deliveries = Arc::clone(&deliveries);
        Arc::new(move |task: &Task<Job>| {
            assert!(task.is_finished());
            *deliveries.lock().entry(task.id()).or_default() += 1;
        })
    };
    let mut tasks = Vec::new();
    let mut submit = |id: u32| {
        let task = Arc::new(Task::new(Job::Run(id)));
        h.pipeline.schedule(&task, Arc::clone(&handler)).unwrap();
        tasks.push(task);
    };

    // In place.
    for id in 0..3 {
        submit(id);
    }
    // In frame.
    park_inside_margin(&h.pipeline);
    for id in 3..6 {
        submit(id);
    }
    run_frame(&h.pipeline, 480);
    // Async.
    park_inside_margin(&h.pipeline);
    for id in 6..8 {
        submit(id);
    }
    reopen(&h.pipeline);
    h.pipeline.scheduler().fire();

    let deliveries = deliveries.lock();
    assert_eq!(deliveries.len(), 8);
    assert!(deliveries.values().all(|&n| n == 1));
    assert!(tasks.iter().all(|t| t.success()));

    let stats = h.pipeline.stats();
    assert_eq!(stats.task_processed_in_place, 3);
    assert_eq!(stats.task_processed_in_frame, 3);
    assert_eq!(stats.task_processed_async(), 2);
    assert_eq!(
        stats.task_processed_total,
        stats.task_processed_in_place + stats.task_processed_in_frame + stats.task_processed_async()
    );
    assert!(stats.scheduler_cancellations >= 1);
    assert_eq!(
        h.pipeline.scheduler().cancels.load(Ordering::SeqCst) as u64,
        stats.scheduler_cancellations
    );
}

#[test]
fn test_failed_task_reports_failure() {
    let h = harness(true);
    let task = Arc::new(Task::new(Job::Fail(9)));
    assert!(!h.pipeline.schedule_and_wait(&task).unwrap());
    assert!(task.is_finished());
    assert!(!task.success());
    assert_eq!(h.pipeline.stats().task_processed_total, 1);
}

#[test]
fn test_finished_task_can_be_rescheduled() {
    let h = harness(true);
    let task = Arc::new(Task::new(Job::Run(1)));
    assert!(h.pipeline.schedule_and_wait(&task).unwrap());
    assert!(h.pipeline.schedule_and_wait(&task).unwrap());
    assert_eq!(task_events(&h.pipeline), vec![1, 1]);
}

#[test]
fn test_queued_task_cannot_be_scheduled_twice() {
    let h = harness(true);
    park_inside_margin(&h.pipeline);
    let task = Arc::new(Task::new(Job::Run(1)));
    h.pipeline.schedule(&task, noop_handler()).unwrap();

    assert_eq!(
        h.pipeline.schedule(&task, noop_handler()),
        Err(PipelineError::TaskAlreadyScheduled(task.id()))
    );
    assert_eq!(h.pipeline.num_pending_tasks(), 1);
}

#[test]
fn test_frame_failure_keeps_tasks() {
    let h = harness(true);
    park_inside_margin(&h.pipeline);
    let tasks: Vec<_> = (0..3).map(|i| Arc::new(Task::new(Job::Run(i)))).collect();
    for task in &tasks {
        h.pipeline.schedule(task, noop_handler()).unwrap();
    }

    h.pipeline.executor().fail_frames.store(true, Ordering::SeqCst);
    assert!(!run_frame(&h.pipeline, 4_800));

    // Every sub-frame was still processed and the queue drained.
    let frames = h
        .pipeline
        .executor()
        .events
        .lock()
        .iter()
        .filter(|e| matches!(e, Event::Frame(_)))
        .count();
    assert_eq!(frames, 1 + 10);
    assert!(tasks.iter().all(|t| t.success()));
    assert_eq!(h.pipeline.num_pending_tasks(), 0);
}

#[test]
fn test_simple_mode_processes_frame_before_tasks() {
    let h = harness(false);
    let pipeline = Arc::clone(&h.pipeline);

    // Hold the pipeline lock with an in-place task.
    let blocker = {
        let pipeline = Arc::clone(&pipeline);
        thread::spawn(move || {
            let task = Arc::new(Task::new(Job::Gate(0)));
            pipeline.schedule_and_wait(&task).unwrap()
        })
    };
    h.entered.recv().unwrap();

    let queued: Vec<_> = (1..=3).map(|i| Arc::new(Task::new(Job::Run(i)))).collect();
    for task in &queued {
        pipeline.schedule(task, noop_handler()).unwrap();
    }
    assert_eq!(pipeline.num_pending_tasks(), 3);

    let framer = {
        let pipeline = Arc::clone(&pipeline);
        thread::spawn(move || run_frame(&pipeline, 4_800))
    };
    while pipeline.num_pending_frames() == 0 {
        thread::yield_now();
    }
    h.gate.send(()).unwrap();

    assert!(blocker.join().unwrap());
    assert!(framer.join().unwrap());

    assert_eq!(
        *pipeline.executor().events.lock(),
        vec![
            Event::Task(0),
            Event::Frame(4_800),
            Event::Task(1),
            Event::Task(2),
            Event::Task(3),
        ]
    );
    let stats = pipeline.stats();
    assert_eq!(stats.preemptions, 1);
    assert_eq!(stats.task_processed_in_place, 1);
    assert_eq!(stats.task_processed_in_frame, 3);
    assert_eq!(stats.scheduler_calls, 0);
}
