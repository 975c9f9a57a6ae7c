//! Borrowed frame of interleaved samples.

use std::ops::Range;

use super::SampleSpec;
use crate::util::clock::Nanoseconds;

/// Raw sample type.
pub type Sample = f32;

/// A chunk of interleaved samples handed to the pipeline for processing.
///
/// The pipeline never interprets samples. When precise scheduling splits a frame,
/// the executor receives sub-frames that borrow consecutive parts of the
/// caller's buffer.
#[derive(Debug)]
pub struct Frame<'a> {
    samples: &'a mut [Sample],
    capture_timestamp: Nanoseconds,
}

impl<'a> Frame<'a> {
    /// Wrap a sample buffer. The capture timestamp starts unset (zero).
    pub fn new(samples: &'a mut [Sample]) -> Self {
        Self {
            samples,
            capture_timestamp: 0,
        }
    }

    /// Attach the capture time of the first sample.
    #[must_use]
    pub fn with_capture_timestamp(mut self, capture_timestamp: Nanoseconds) -> Self {
        self.capture_timestamp = capture_timestamp;
        self
    }

    /// Number of interleaved samples.
    #[must_use]
    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    /// Samples of this frame.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &*self.samples
    }

    /// Mutable samples of this frame.
    pub fn samples_mut(&mut self) -> &mut [Sample] {
        &mut *self.samples
    }

    /// Capture time of the first sample, or zero if unknown.
    #[must_use]
    pub const fn capture_timestamp(&self) -> Nanoseconds {
        self.capture_timestamp
    }

    /// Borrow `range` as a sub-frame.
    ///
    /// A known capture timestamp is shifted by the duration of the skipped
    /// samples.
    ///
    /// # Panics
    ///
    /// Panics if `range` is out of bounds.
    pub fn sub_frame(&mut self, range: Range<usize>, spec: &SampleSpec) -> Frame<'_> {
        let capture_timestamp = if self.capture_timestamp == 0 {
            0
        } else {
            self.capture_timestamp + spec.samples_to_ns(range.start)
        };
        Frame {
            samples: &mut self.samples[range],
            capture_timestamp,
        }
    }
}
