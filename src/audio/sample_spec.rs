//! Sample rate and channel layout, and conversions between samples and time.
//!
//! Frames carry interleaved samples, so a frame of `n` samples with `c`
//! channels lasts `n / c / sample_rate` seconds. Configuration values that talk
//! about "samples between tasks" are per channel.

use serde::{Deserialize, Serialize};

use crate::util::clock::{Nanoseconds, NANOS_PER_SECOND};

/// Bit mask of enabled channels; one bit per channel.
pub type ChannelMask = u32;

/// Sample rate plus channel mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSpec {
    sample_rate: u32,
    channel_mask: ChannelMask,
}

impl SampleSpec {
    /// Create a spec. A zero sample rate is allowed and means "timing unknown".
    #[must_use]
    pub const fn new(sample_rate: u32, channel_mask: ChannelMask) -> Self {
        Self {
            sample_rate,
            channel_mask,
        }
    }

    /// Samples per second per channel.
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Enabled channels.
    #[must_use]
    pub const fn channel_mask(&self) -> ChannelMask {
        self.channel_mask
    }

    /// Number of enabled channels.
    #[must_use]
    pub const fn num_channels(&self) -> usize {
        self.channel_mask.count_ones() as usize
    }

    /// Whether durations can be computed from sample counts.
    #[must_use]
    pub const fn is_timed(&self) -> bool {
        self.sample_rate != 0 && self.channel_mask != 0
    }

    /// Interleaved sample count holding `per_channel` samples on every channel.
    #[must_use]
    pub const fn per_channel_to_interleaved(&self, per_channel: usize) -> usize {
        per_channel.saturating_mul(self.num_channels())
    }

    /// Duration of `num_samples` interleaved samples; zero if untimed.
    #[must_use]
    pub fn samples_to_ns(&self, num_samples: usize) -> Nanoseconds {
        if !self.is_timed() {
            return 0;
        }
        let per_channel = (num_samples / self.num_channels()) as u128;
        let ns = per_channel * NANOS_PER_SECOND as u128 / u128::from(self.sample_rate);
        Nanoseconds::try_from(ns).unwrap_or(Nanoseconds::MAX)
    }

    /// Interleaved sample count that fits in `duration`; zero if untimed.
    #[must_use]
    pub fn ns_to_samples(&self, duration: Nanoseconds) -> usize {
        if !self.is_timed() || duration <= 0 {
            return 0;
        }
        let per_channel =
            duration as u128 * u128::from(self.sample_rate) / NANOS_PER_SECOND as u128;
        usize::try_from(per_channel)
            .map_or(usize::MAX, |n| self.per_channel_to_interleaved(n))
    }
}
