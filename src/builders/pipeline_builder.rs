//! Fluent builder over [`PipelineConfig`].

use std::sync::Arc;
use std::time::Duration;

use crate::audio::ChannelMask;
use crate::config::PipelineConfig;
use crate::core::{PipelineError, PipelineExecutor, TaskPipeline, TaskScheduler};
use crate::util::clock::Nanoseconds;

/// Builds a [`TaskPipeline`], starting from [`PipelineConfig::default`] or a
/// loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
}

fn to_nanos(duration: Duration) -> Nanoseconds {
    Nanoseconds::try_from(duration.as_nanos()).unwrap_or(Nanoseconds::MAX)
}

impl PipelineBuilder {
    /// Start from the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration, e.g. one read with
    /// [`PipelineConfig::from_env`].
    #[must_use]
    pub const fn from_config(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Set the sample rate; zero disables precise scheduling.
    #[must_use]
    pub const fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    /// Set the channel mask.
    #[must_use]
    pub const fn with_channel_mask(mut self, channel_mask: ChannelMask) -> Self {
        self.config.channel_mask = channel_mask;
        self
    }

    /// Enable or disable precise task scheduling.
    #[must_use]
    pub const fn with_precise_scheduling(mut self, enabled: bool) -> Self {
        self.config.tasks.enable_precise_task_scheduling = enabled;
        self
    }

    /// Per-channel sample bounds between task processing opportunities.
    #[must_use]
    pub const fn with_samples_between_tasks(mut self, min: usize, max: usize) -> Self {
        self.config.tasks.min_samples_between_tasks = min;
        self.config.tasks.max_samples_between_tasks = max;
        self
    }

    /// Distance to a frame deadline at which task processing stops.
    #[must_use]
    pub fn with_task_processing_margin(mut self, margin: Duration) -> Self {
        self.config.tasks.task_processing_margin_ns = to_nanos(margin);
        self
    }

    /// Cap for a single task window between sub-frames; zero removes the cap.
    #[must_use]
    pub fn with_max_inframe_task_processing(mut self, limit: Duration) -> Self {
        self.config.tasks.max_inframe_task_processing_ns = to_nanos(limit);
        self
    }

    /// Configuration built so far.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Validate the configuration and create the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if validation fails.
    pub fn build<E, S>(self, executor: E, scheduler: S) -> Result<Arc<TaskPipeline<E, S>>, PipelineError>
    where
        E: PipelineExecutor,
        S: TaskScheduler + 'static,
    {
        TaskPipeline::new(self.config, executor, scheduler)
    }
}
