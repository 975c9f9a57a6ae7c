//! # Prometheus Task Pipeline
//!
//! A thread-less pipeline that multiplexes real-time frame processing with
//! asynchronous tasks on a single execution slot.
//!
//! Audio-style pipelines have one hard real-time caller that pushes frames on a
//! fixed cadence, and any number of control threads that want to change
//! pipeline state: adjust a gain, attach an endpoint, query a metric. Running
//! those changes concurrently with frame processing would need fine-grained
//! locking inside every component. This crate instead serializes both kinds of
//! work behind one lock and slots tasks into the gaps between frames.
//!
//! ## Key Features
//!
//! - **No private thread**: all work runs on caller threads
//! - **Frame priority**: task processing yields the moment a frame call arrives
//! - **Precise scheduling**: frames are split into sub-frames, and tasks only run
//!   in windows that end a safety margin before the next sub-frame is due
//! - **In-place fast path**: a task submitted into an idle pipeline runs
//!   immediately on the submitting thread
//! - **Async bridge**: leftover tasks are handed to an external scheduler, e.g.
//!   [`runtime::TokioTaskScheduler`]
//! - **Exactly-once completion**: a handler call or a wake-up of the blocked
//!   `schedule_and_wait` caller
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use prometheus_task_pipeline::builders::PipelineBuilder;
//! use prometheus_task_pipeline::core::Task;
//! use prometheus_task_pipeline::runtime::TokioTaskScheduler;
//!
//! let pipeline = PipelineBuilder::new()
//!     .with_sample_rate(48_000)
//!     .with_samples_between_tasks(240, 480)
//!     .build(my_executor, TokioTaskScheduler::try_current()?)?;
//!
//! // Control thread
//! let task = Arc::new(Task::new(SetGain(0.5)));
//! let ok = pipeline.schedule_and_wait(&task)?;
//!
//! // Real-time thread
//! let ok = pipeline.process_frame_and_tasks(&mut Frame::new(&mut samples));
//! ```
//!
//! For complete examples, see:
//! - `tests/pipeline_test.rs` - Scheduling and completion
//! - `tests/precise_scheduling_test.rs` - Sub-frame interleaving

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Audio frames and sample specifications.
pub mod audio;
/// Builders to construct pipelines from configuration.
pub mod builders;
/// Configuration models for the pipeline and task scheduling.
pub mod config;
/// Core scheduling: tasks, pipeline, precise time slicing, async bridge.
pub mod core;
/// Runtime adapters for external task schedulers.
pub mod runtime;
/// Shared utilities.
pub mod util;
