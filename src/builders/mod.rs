//! Builders to construct pipelines from configuration.

/// Fluent construction of [`TaskPipeline`](crate::core::TaskPipeline).
pub mod pipeline_builder;

pub use pipeline_builder::PipelineBuilder;
