//! Audio primitives consumed by the pipeline: sample specification and frames.

pub mod frame;
pub mod sample_spec;

pub use frame::{Frame, Sample};
pub use sample_spec::{ChannelMask, SampleSpec};
