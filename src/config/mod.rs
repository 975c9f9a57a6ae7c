//! Configuration models for the pipeline and its task scheduling policy.

pub mod pipeline;

pub use pipeline::{PipelineConfig, TaskConfig};
