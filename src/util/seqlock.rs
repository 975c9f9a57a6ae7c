//! Tear-free 64-bit timestamp cells.
//!
//! The next-frame deadline is written by the frame-processing thread and read by
//! any thread deciding whether task processing is allowed right now. Neither side
//! may block. Where the target has native 64-bit atomics the cell is a plain
//! `AtomicI64`; elsewhere it falls back to [`Seqlock`], which stores the value as
//! two 32-bit halves guarded by a sequence counter.

use std::hint::spin_loop;
#[cfg(target_has_atomic = "64")]
use std::sync::atomic::AtomicI64;
use std::sync::atomic::{fence, AtomicU32, Ordering};

use crate::util::clock::Nanoseconds;

/// Timestamp cell used by the pipeline, selected per target.
#[cfg(target_has_atomic = "64")]
pub type TimestampCell = AtomicTimestamp;

/// Timestamp cell used by the pipeline, selected per target.
#[cfg(not(target_has_atomic = "64"))]
pub type TimestampCell = Seqlock;

/// Sequence-lock protected 64-bit value built from 32-bit atomics.
///
/// Writers bump the sequence to an odd value, write both halves, and bump it
/// again. Readers retry until they observe the same even sequence before and
/// after reading the halves. Concurrent writers are serialized by spinning on
/// the odd sequence, which never happens in the pipeline because the deadline
/// is only written under the pipeline lock.
#[derive(Debug)]
pub struct Seqlock {
    seq: AtomicU32,
    lo: AtomicU32,
    hi: AtomicU32,
}

impl Seqlock {
    /// Create a cell holding `value`.
    #[must_use]
    pub const fn new(value: Nanoseconds) -> Self {
        let bits = value as u64;
        Self {
            seq: AtomicU32::new(0),
            lo: AtomicU32::new(bits as u32),
            hi: AtomicU32::new((bits >> 32) as u32),
        }
    }

    /// Publish a new value.
    pub fn store(&self, value: Nanoseconds) {
        let mut seq = self.seq.load(Ordering::Relaxed);
        loop {
            if seq & 1 == 1 {
                spin_loop();
                seq = self.seq.load(Ordering::Relaxed);
                continue;
            }
            match self.seq.compare_exchange_weak(
                seq,
                seq.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => seq = actual,
            }
        }
        fence(Ordering::Release);

        let bits = value as u64;
        self.lo.store(bits as u32, Ordering::Relaxed);
        self.hi.store((bits >> 32) as u32, Ordering::Relaxed);

        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Read the value once; `None` if a write was in progress.
    #[must_use]
    pub fn try_load(&self) -> Option<Nanoseconds> {
        let before = self.seq.load(Ordering::Acquire);
        if before & 1 == 1 {
            return None;
        }
        let lo = self.lo.load(Ordering::Relaxed);
        let hi = self.hi.load(Ordering::Relaxed);
        fence(Ordering::Acquire);
        let after = self.seq.load(Ordering::Relaxed);

        (before == after).then(|| ((u64::from(hi) << 32) | u64::from(lo)) as Nanoseconds)
    }

    /// Read a consistent value, retrying while a write is in progress.
    #[must_use]
    pub fn load(&self) -> Nanoseconds {
        loop {
            if let Some(value) = self.try_load() {
                return value;
            }
            spin_loop();
        }
    }
}

impl Default for Seqlock {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Native 64-bit atomic timestamp with the same interface as [`Seqlock`].
#[cfg(target_has_atomic = "64")]
#[derive(Debug, Default)]
pub struct AtomicTimestamp(AtomicI64);

#[cfg(target_has_atomic = "64")]
impl AtomicTimestamp {
    /// Create a cell holding `value`.
    #[must_use]
    pub const fn new(value: Nanoseconds) -> Self {
        Self(AtomicI64::new(value))
    }

    /// Publish a new value.
    pub fn store(&self, value: Nanoseconds) {
        self.0.store(value, Ordering::Release);
    }

    /// Read the value; never fails on this target.
    #[must_use]
    pub fn try_load(&self) -> Option<Nanoseconds> {
        Some(self.load())
    }

    /// Read the current value.
    #[must_use]
    pub fn load(&self) -> Nanoseconds {
        self.0.load(Ordering::Acquire)
    }
}
