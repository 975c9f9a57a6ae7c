//! Tests for error types

use prometheus_task_pipeline::core::PipelineError;

#[test]
fn test_task_already_scheduled_error() {
    let err = PipelineError::TaskAlreadyScheduled(42);
    assert_eq!(format!("{err}"), "task 42 is already scheduled");
}

#[test]
fn test_invalid_config_error() {
    let err = PipelineError::InvalidConfig("channel_mask must enable at least one channel".to_string());
    assert_eq!(
        format!("{err}"),
        "invalid configuration: channel_mask must enable at least one channel"
    );
}

#[test]
fn test_error_converts_to_anyhow() {
    let err: anyhow::Error = PipelineError::TaskAlreadyScheduled(1).into();
    assert!(err.downcast_ref::<PipelineError>().is_some());
}
