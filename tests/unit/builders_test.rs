//! Tests for builder modules

use std::time::Duration;

use prometheus_task_pipeline::audio::Frame;
use prometheus_task_pipeline::builders::PipelineBuilder;
use prometheus_task_pipeline::config::PipelineConfig;
use prometheus_task_pipeline::core::{PipelineError, PipelineExecutor, ProcessorRef, TaskScheduler};
use prometheus_task_pipeline::util::Nanoseconds;

struct Noop;

impl PipelineExecutor for Noop {
    type Payload = ();

    fn process_frame(&self, _frame: &mut Frame<'_>) -> bool {
        true
    }

    fn process_task(&self, _payload: &()) -> bool {
        true
    }
}

struct NoScheduler;

impl TaskScheduler for NoScheduler {
    fn schedule_task_processing(&self, _processor: &ProcessorRef, _deadline: Nanoseconds) {}

    fn cancel_task_processing(&self, _processor: &ProcessorRef) {}
}

#[test]
fn test_pipeline_builder_defaults() {
    let builder = PipelineBuilder::new();
    assert_eq!(builder.config(), &PipelineConfig::default());
}

#[test]
fn test_pipeline_builder_builds_configured_pipeline() {
    let pipeline = PipelineBuilder::new()
        .with_sample_rate(44_100)
        .with_channel_mask(0b1)
        .with_max_inframe_task_processing(Duration::from_micros(10))
        .build(Noop, NoScheduler)
        .unwrap();

    assert_eq!(pipeline.config().sample_rate, 44_100);
    assert_eq!(pipeline.config().tasks.max_inframe_task_processing_ns, 10_000);
    assert!(pipeline.slicer().is_precise());
}

#[test]
fn test_pipeline_builder_rejects_invalid_config() {
    let result = PipelineBuilder::new()
        .with_samples_between_tasks(500, 100)
        .build(Noop, NoScheduler);
    assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
}
