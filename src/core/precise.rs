//! Precise task scheduling: where task processing fits around frames.
//!
//! A frame call splits its frame into sub-frames no longer than
//! `max_samples_between_tasks` and opens a task window after each of them. Each
//! window closes `task_processing_margin_ns` before the boundary at which the
//! following sub-frame (or, after the last one, the next frame) is due. Windows
//! only open once at least `min_samples_between_tasks` samples were processed
//! since the previous window, which keeps overhead low with tiny frames.
//!
//! Outside frame calls, tasks may run unless the clock is within the margin of
//! the next frame deadline on either side.

use std::ops::Range;

use crate::audio::SampleSpec;
use crate::config::PipelineConfig;
use crate::util::clock::Nanoseconds;

/// Time slicing policy derived from [`PipelineConfig`].
#[derive(Debug, Clone)]
pub struct TimeSlicer {
    spec: SampleSpec,
    precise: bool,
    min_samples: usize,
    max_samples: usize,
    margin: Nanoseconds,
    max_inframe: Nanoseconds,
}

impl TimeSlicer {
    /// Derive the policy. Precise scheduling is only active when enabled, the
    /// sample spec is timed, and the maximum sub-frame size is non-zero.
    #[must_use]
    pub fn new(config: &PipelineConfig) -> Self {
        let spec = config.sample_spec();
        let tasks = &config.tasks;
        Self {
            spec,
            precise: tasks.enable_precise_task_scheduling
                && spec.is_timed()
                && tasks.max_samples_between_tasks != 0,
            min_samples: spec.per_channel_to_interleaved(tasks.min_samples_between_tasks),
            max_samples: spec.per_channel_to_interleaved(tasks.max_samples_between_tasks),
            margin: tasks.task_processing_margin_ns,
            max_inframe: tasks.max_inframe_task_processing_ns,
        }
    }

    /// Whether frames are split and task processing is confined to windows.
    #[must_use]
    pub const fn is_precise(&self) -> bool {
        self.precise
    }

    /// Sample specification of processed frames.
    #[must_use]
    pub const fn spec(&self) -> &SampleSpec {
        &self.spec
    }

    /// Interleaved samples that must accumulate before a task window opens.
    #[must_use]
    pub const fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Duration of `num_samples` interleaved samples.
    #[must_use]
    pub fn duration(&self, num_samples: usize) -> Nanoseconds {
        self.spec.samples_to_ns(num_samples)
    }

    /// Duration of the first sub-frame of a frame of `frame_len` samples.
    #[must_use]
    pub fn subframe_duration(&self, frame_len: usize) -> Nanoseconds {
        if self.precise {
            self.duration(frame_len.min(self.max_samples))
        } else {
            self.duration(frame_len)
        }
    }

    /// Split a frame of `frame_len` samples that started at `frame_start`.
    ///
    /// Without precise scheduling the whole frame is a single sub-frame.
    #[must_use]
    pub fn plan(&self, frame_start: Nanoseconds, frame_len: usize) -> SubframePlan {
        SubframePlan {
            spec: self.spec,
            max_samples: if self.precise { self.max_samples } else { 0 },
            frame_start,
            frame_len,
            pos: 0,
            done: false,
        }
    }

    /// Whether task processing outside a frame call is allowed at `now`.
    #[must_use]
    pub const fn interframe_allowed(&self, now: Nanoseconds, next_frame_deadline: Nanoseconds) -> bool {
        if !self.precise {
            return true;
        }
        now < next_frame_deadline.saturating_sub(self.margin)
            || now >= next_frame_deadline.saturating_add(self.margin)
    }

    /// Hint for the external scheduler: zero if tasks may run now, otherwise
    /// the end of the interval around the next frame deadline.
    #[must_use]
    pub const fn async_deadline(&self, now: Nanoseconds, next_frame_deadline: Nanoseconds) -> Nanoseconds {
        if self.interframe_allowed(now, next_frame_deadline) {
            0
        } else {
            next_frame_deadline.saturating_add(self.margin)
        }
    }

    /// Task window opened at `now` ahead of `boundary`.
    ///
    /// Windows between sub-frames are additionally capped by
    /// `max_inframe_task_processing_ns`; the window after the last sub-frame is
    /// not.
    #[must_use]
    pub fn window(&self, now: Nanoseconds, boundary: Nanoseconds, between_subframes: bool) -> TaskWindow {
        let mut closes_at = boundary.saturating_sub(self.margin);
        if between_subframes && self.max_inframe > 0 {
            closes_at = closes_at.min(now.saturating_add(self.max_inframe));
        }
        TaskWindow { closes_at }
    }
}

/// Interval during which a frame call may drain tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskWindow {
    closes_at: Nanoseconds,
}

impl TaskWindow {
    /// Moment after which no further task may be started.
    #[must_use]
    pub const fn closes_at(&self) -> Nanoseconds {
        self.closes_at
    }

    /// Whether another task may be started at `now`.
    #[must_use]
    pub const fn is_open(&self, now: Nanoseconds) -> bool {
        now < self.closes_at
    }
}

/// One piece of a split frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subframe {
    /// Interleaved sample range within the frame.
    pub range: Range<usize>,
    /// When the samples after this sub-frame are due: the next sub-frame's
    /// expected start, or the next frame's for the last one.
    pub deadline: Nanoseconds,
    /// Whether this is the last sub-frame of the frame.
    pub is_last: bool,
}

/// Iterator over the sub-frames of one frame.
///
/// Always yields at least one sub-frame, even for an empty frame.
#[derive(Debug, Clone)]
pub struct SubframePlan {
    spec: SampleSpec,
    max_samples: usize,
    frame_start: Nanoseconds,
    frame_len: usize,
    pos: usize,
    done: bool,
}

impl Iterator for SubframePlan {
    type Item = Subframe;

    fn next(&mut self) -> Option<Subframe> {
        if self.done {
            return None;
        }
        let remaining = self.frame_len - self.pos;
        let len = if self.max_samples == 0 {
            remaining
        } else {
            remaining.min(self.max_samples)
        };
        let range = self.pos..self.pos + len;
        self.pos += len;
        self.done = self.pos == self.frame_len;

        // Measured from the frame start rather than accumulated, so rounding
        // never drifts and the last deadline equals the frame deadline.
        Some(Subframe {
            range,
            deadline: self.frame_start.saturating_add(self.spec.samples_to_ns(self.pos)),
            is_last: self.done,
        })
    }
}

/// Running count of samples processed since the last task window.
#[derive(Debug)]
pub(crate) struct SampleCounter {
    min_samples: usize,
    processed: usize,
    threshold_reached: bool,
}

impl SampleCounter {
    pub(crate) const fn new(min_samples: usize) -> Self {
        Self {
            min_samples,
            processed: 0,
            threshold_reached: min_samples == 0,
        }
    }

    pub(crate) fn record(&mut self, samples: usize) {
        self.processed = self.processed.saturating_add(samples);
        if self.processed >= self.min_samples {
            self.threshold_reached = true;
        }
    }

    /// Consume the opportunity if enough samples accumulated.
    pub(crate) fn take_opportunity(&mut self) -> bool {
        if !self.threshold_reached {
            return false;
        }
        self.processed = 0;
        self.threshold_reached = self.min_samples == 0;
        true
    }
}
