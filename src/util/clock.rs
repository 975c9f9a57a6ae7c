//! Monotonic nanosecond clock shared by the pipeline and runtime adapters.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Signed nanosecond timestamp or interval.
///
/// Timestamps produced by [`now_nanos`] count from the first time the clock was
/// read in this process, so they are small and never negative.
pub type Nanoseconds = i64;

/// Nanoseconds in one second.
pub const NANOS_PER_SECOND: Nanoseconds = 1_000_000_000;

fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Current monotonic time in nanoseconds.
#[must_use]
pub fn now_nanos() -> Nanoseconds {
    Nanoseconds::try_from(epoch().elapsed().as_nanos()).unwrap_or(Nanoseconds::MAX)
}

/// Time left from `now` until `deadline`, zero if the deadline already passed.
#[must_use]
pub fn duration_until(deadline: Nanoseconds, now: Nanoseconds) -> Duration {
    u64::try_from(deadline.saturating_sub(now)).map_or(Duration::ZERO, Duration::from_nanos)
}

/// Convert a non-negative nanosecond interval into a [`Duration`].
#[must_use]
pub fn nanos_to_duration(interval: Nanoseconds) -> Duration {
    duration_until(interval, 0)
}
