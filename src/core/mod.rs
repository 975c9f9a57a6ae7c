//! Core scheduling: tasks, the pipeline, precise time slicing and the async
//! bridge.

/// External scheduler bridge and its state machine.
pub mod bridge;
/// Error types.
pub mod error;
/// Capabilities supplied by the concrete pipeline.
pub mod executor;
/// The task pipeline.
pub mod pipeline;
/// Sub-frame planning and task windows.
pub mod precise;
mod queue;
/// Processing statistics.
pub mod stats;
/// Tasks and completion delivery.
pub mod task;

pub use bridge::{BridgeState, ProcessorRef, TaskProcessor, TaskScheduler};
pub use error::{AppResult, PipelineError};
pub use executor::PipelineExecutor;
pub use pipeline::TaskPipeline;
pub use precise::{Subframe, SubframePlan, TaskWindow, TimeSlicer};
pub use stats::PipelineStats;
pub use task::{CompletionHandler, CompletionSignal, Task, TaskId, TaskState};
