//! Tests for utility functions

use std::time::Duration;

use prometheus_task_pipeline::audio::SampleSpec;
use prometheus_task_pipeline::util::{duration_until, nanos_to_duration, now_nanos, Seqlock};

#[test]
fn test_clock_is_monotonic() {
    let a = now_nanos();
    std::thread::sleep(Duration::from_millis(1));
    let b = now_nanos();
    assert!(b > a);
}

#[test]
fn test_duration_until() {
    assert_eq!(duration_until(1_500, 1_000), Duration::from_nanos(500));
    assert_eq!(duration_until(1_000, 1_500), Duration::ZERO);
    assert_eq!(nanos_to_duration(-5), Duration::ZERO);
}

#[test]
fn test_seqlock_store_load() {
    let cell = Seqlock::new(7);
    assert_eq!(cell.load(), 7);
    cell.store(-123_456_789_012);
    assert_eq!(cell.load(), -123_456_789_012);
    assert_eq!(cell.try_load(), Some(-123_456_789_012));
}

#[test]
fn test_sample_spec_conversions() {
    let spec = SampleSpec::new(48_000, 0b11);
    assert_eq!(spec.num_channels(), 2);
    assert_eq!(spec.per_channel_to_interleaved(480), 960);
    assert_eq!(spec.samples_to_ns(960), 10_000_000);
    assert_eq!(spec.ns_to_samples(10_000_000), 960);
    assert!(!SampleSpec::new(0, 0b1).is_timed());
}

#[test]
fn test_init_tracing_is_idempotent() {
    prometheus_task_pipeline::util::init_tracing();
    prometheus_task_pipeline::util::init_tracing();
    tracing::info!("tracing initialized twice");
}
