//! Pipeline and task scheduling configuration structures.

use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::audio::{ChannelMask, SampleSpec};
use crate::core::AppResult;
use crate::util::clock::Nanoseconds;

/// Environment variable prefix read by [`PipelineConfig::from_env`].
pub const ENV_PREFIX: &str = "TASK_PIPELINE_";

/// Task scheduling policy.
///
/// Sample counts are per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Confine task processing to computed time windows. When disabled, every
    /// frame is processed whole and the queue is drained right after it.
    pub enable_precise_task_scheduling: bool,
    /// Samples that must be processed before tasks get another opportunity to run.
    pub min_samples_between_tasks: usize,
    /// Largest sub-frame processed without a task opportunity; zero disables
    /// frame splitting.
    pub max_samples_between_tasks: usize,
    /// Task draining stops this long before a frame deadline. Outside frame
    /// calls, tasks are not processed within this distance of the deadline.
    pub task_processing_margin_ns: Nanoseconds,
    /// Upper bound for a single task window between two sub-frames; zero
    /// removes the bound.
    pub max_inframe_task_processing_ns: Nanoseconds,
}

impl Default for TaskConfig {
    fn default() -> Self {
        // 200us and 1ms at 48kHz.
        Self {
            enable_precise_task_scheduling: true,
            min_samples_between_tasks: 10,
            max_samples_between_tasks: 48,
            task_processing_margin_ns: 100_000,
            max_inframe_task_processing_ns: 20_000,
        }
    }
}

impl TaskConfig {
    /// Validate task scheduling values.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_samples_between_tasks != 0
            && self.min_samples_between_tasks > self.max_samples_between_tasks
        {
            return Err(format!(
                "min_samples_between_tasks ({}) must not exceed max_samples_between_tasks ({})",
                self.min_samples_between_tasks, self.max_samples_between_tasks
            ));
        }
        if self.task_processing_margin_ns < 0 {
            return Err("task_processing_margin_ns must not be negative".into());
        }
        if self.max_inframe_task_processing_ns < 0 {
            return Err("max_inframe_task_processing_ns must not be negative".into());
        }
        Ok(())
    }
}

/// Root pipeline configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Samples per second per channel; zero disables precise scheduling.
    pub sample_rate: u32,
    /// Enabled channels of processed frames.
    pub channel_mask: ChannelMask,
    /// Task scheduling policy.
    pub tasks: TaskConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channel_mask: 0b11,
            tasks: TaskConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Sample specification of processed frames.
    #[must_use]
    pub const fn sample_spec(&self) -> SampleSpec {
        SampleSpec::new(self.sample_rate, self.channel_mask)
    }

    /// Validate all values.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.channel_mask == 0 {
            return Err("channel_mask must enable at least one channel".into());
        }
        self.tasks
            .validate()
            .map_err(|e| format!("tasks invalid: {e}"))
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a message if parsing or validation fails.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Fails if the file can't be read, parsed, or validated.
    pub fn from_json_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config {}", path.display()))?;
        Self::from_json_str(&raw)
            .map_err(|e| anyhow!(e))
            .with_context(|| format!("loading pipeline config {}", path.display()))
    }

    /// Build configuration from `TASK_PIPELINE_*` environment variables on top
    /// of the defaults. A `.env` file in the working directory is loaded first
    /// if present.
    ///
    /// Recognized variables: `SAMPLE_RATE`, `CHANNEL_MASK`, `PRECISE_SCHEDULING`,
    /// `MIN_SAMPLES_BETWEEN_TASKS`, `MAX_SAMPLES_BETWEEN_TASKS`, `MARGIN_NS`,
    /// `MAX_INFRAME_NS`.
    ///
    /// # Errors
    ///
    /// Fails if a variable can't be parsed or the result is invalid.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();

        let mut cfg = Self::default();
        if let Some(v) = env_value("SAMPLE_RATE")? {
            cfg.sample_rate = v;
        }
        if let Some(v) = env_value("CHANNEL_MASK")? {
            cfg.channel_mask = v;
        }
        if let Some(v) = env_value("PRECISE_SCHEDULING")? {
            cfg.tasks.enable_precise_task_scheduling = v;
        }
        if let Some(v) = env_value("MIN_SAMPLES_BETWEEN_TASKS")? {
            cfg.tasks.min_samples_between_tasks = v;
        }
        if let Some(v) = env_value("MAX_SAMPLES_BETWEEN_TASKS")? {
            cfg.tasks.max_samples_between_tasks = v;
        }
        if let Some(v) = env_value("MARGIN_NS")? {
            cfg.tasks.task_processing_margin_ns = v;
        }
        if let Some(v) = env_value("MAX_INFRAME_NS")? {
            cfg.tasks.max_inframe_task_processing_ns = v;
        }

        cfg.validate().map_err(|e| anyhow!(e))?;
        Ok(cfg)
    }
}

fn env_value<T>(name: &str) -> AppResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let key = format!("{ENV_PREFIX}{name}");
    match std::env::var(&key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("{key}={raw:?}: {e}")),
        Err(_) => Ok(None),
    }
}
