//! Tests for configuration loading and validation

use prometheus_task_pipeline::config::{PipelineConfig, TaskConfig};

#[test]
fn test_default_config_validation() {
    let config = PipelineConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.sample_rate, 48_000);
    assert!(config.tasks.enable_precise_task_scheduling);
}

#[test]
fn test_zero_channel_mask_rejected() {
    let config = PipelineConfig {
        channel_mask: 0,
        ..PipelineConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_negative_margin_rejected() {
    let config = PipelineConfig {
        tasks: TaskConfig {
            task_processing_margin_ns: -1,
            ..TaskConfig::default()
        },
        ..PipelineConfig::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.contains("task_processing_margin_ns"));
}

#[test]
fn test_from_json_str() {
    let json = r#"{
        "sample_rate": 44100,
        "channel_mask": 1,
        "tasks": {
            "enable_precise_task_scheduling": false,
            "min_samples_between_tasks": 100,
            "max_samples_between_tasks": 200
        }
    }"#;
    let config = PipelineConfig::from_json_str(json).unwrap();
    assert_eq!(config.sample_rate, 44_100);
    assert_eq!(config.channel_mask, 1);
    assert!(!config.tasks.enable_precise_task_scheduling);
    assert_eq!(config.tasks.min_samples_between_tasks, 100);
    assert_eq!(
        config.tasks.task_processing_margin_ns,
        TaskConfig::default().task_processing_margin_ns
    );
}

#[test]
fn test_from_json_str_rejects_invalid() {
    assert!(PipelineConfig::from_json_str("not json").is_err());

    let err = PipelineConfig::from_json_str(r#"{ "channel_mask": 0 }"#).unwrap_err();
    assert!(err.contains("channel_mask"));
}

#[test]
fn test_from_json_file() {
    let path = std::env::temp_dir().join(format!("task_pipeline_config_{}.json", std::process::id()));
    std::fs::write(&path, r#"{ "sample_rate": 96000 }"#).unwrap();

    let config = PipelineConfig::from_json_file(&path).unwrap();
    assert_eq!(config.sample_rate, 96_000);
    std::fs::remove_file(&path).unwrap();

    let missing = PipelineConfig::from_json_file(&path).unwrap_err();
    assert!(format!("{missing:#}").contains("reading pipeline config"));
}

#[test]
fn test_from_env() {
    std::env::set_var("TASK_PIPELINE_SAMPLE_RATE", "16000");
    std::env::set_var("TASK_PIPELINE_PRECISE_SCHEDULING", "false");
    std::env::set_var("TASK_PIPELINE_MARGIN_NS", "250000");

    let config = PipelineConfig::from_env().unwrap();
    assert_eq!(config.sample_rate, 16_000);
    assert!(!config.tasks.enable_precise_task_scheduling);
    assert_eq!(config.tasks.task_processing_margin_ns, 250_000);

    std::env::set_var("TASK_PIPELINE_SAMPLE_RATE", "fast");
    let err = PipelineConfig::from_env().unwrap_err();
    assert!(err.to_string().contains("TASK_PIPELINE_SAMPLE_RATE"));

    for name in ["SAMPLE_RATE", "PRECISE_SCHEDULING", "MARGIN_NS"] {
        std::env::remove_var(format!("TASK_PIPELINE_{name}"));
    }
}

#[test]
fn test_config_serializes_to_json() {
    let config = PipelineConfig::default();
    let json = serde_json::to_value(config).unwrap();
    assert_eq!(json["sample_rate"], 48_000);
    assert_eq!(json["tasks"]["max_samples_between_tasks"], 48);
}
