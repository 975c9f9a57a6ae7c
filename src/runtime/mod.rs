//! Runtime adapters that drive asynchronous task processing.

#[cfg(feature = "tokio-runtime")]
pub mod tokio_scheduler;

#[cfg(feature = "tokio-runtime")]
pub use tokio_scheduler::TokioTaskScheduler;
