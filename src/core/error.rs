//! Error types for pipeline operations.

use thiserror::Error;

use crate::core::TaskId;

/// Errors produced by pipeline components.
///
/// Frame and task failures are not errors: they are reported as boolean
/// outcomes. These variants cover API misuse and bad configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// The task is already queued or being processed.
    #[error("task {0} is already scheduled")]
    TaskAlreadyScheduled(TaskId),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
