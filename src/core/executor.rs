//! Capabilities the concrete pipeline plugs into the scheduling core.

use crate::audio::Frame;
use crate::util::clock::{now_nanos, Nanoseconds};

/// Clock, frame processing and task processing of a concrete pipeline.
///
/// The core calls `process_frame` and `process_task` only while holding the
/// pipeline lock, so the two never run concurrently with each other or with
/// themselves. `timestamp` is called without the lock from any thread.
///
/// # Example
///
/// ```rust
/// use prometheus_task_pipeline::audio::Frame;
/// use prometheus_task_pipeline::core::PipelineExecutor;
///
/// struct Gain;
///
/// impl PipelineExecutor for Gain {
///     type Payload = f32;
///
///     fn process_frame(&self, frame: &mut Frame<'_>) -> bool {
///         for s in frame.samples_mut() {
///             *s *= 0.5;
///         }
///         true
///     }
///
///     fn process_task(&self, gain: &f32) -> bool {
///         gain.is_finite()
///     }
/// }
/// ```
pub trait PipelineExecutor: Send + Sync + 'static {
    /// Task payload type handled by [`process_task`](Self::process_task).
    type Payload: Send + Sync + 'static;

    /// Current time in nanoseconds. Must be monotonic and share its time base
    /// with the external task scheduler.
    fn timestamp(&self) -> Nanoseconds {
        now_nanos()
    }

    /// Process one frame or sub-frame. Returns `false` on failure.
    fn process_frame(&self, frame: &mut Frame<'_>) -> bool;

    /// Process one task payload. Returns `false` on failure.
    fn process_task(&self, payload: &Self::Payload) -> bool;
}
