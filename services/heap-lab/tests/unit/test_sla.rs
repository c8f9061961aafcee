//! Unit tests for SLA violation tracking: cascading thresholds, the rolling
//! window, and reset semantics

use heap_lab::sla::SlaTracker;
use heaplab_common::MILLIS_PER_MIN;
use pretty_assertions::assert_eq;
use rstest::*;

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

#[rstest]
fn fifteen_ms_hits_only_the_10ms_counter() {
    let tracker = SlaTracker::default();
    tracker.record_operation(15);
    let stats = tracker.stats();
    assert_eq!(stats.total_operations, 1);
    assert_eq!(stats.violations_over_10ms, 1);
    assert_eq!(stats.violations_over_50ms, 0);
    assert_eq!(stats.violations_over_100ms, 0);
}

#[rstest]
fn one_hundred_five_ms_cascades_into_all_three_counters() {
    let tracker = SlaTracker::default();
    tracker.record_operation(105);
    let stats = tracker.stats();
    assert_eq!(stats.violations_over_10ms, 1);
    assert_eq!(stats.violations_over_50ms, 1);
    assert_eq!(stats.violations_over_100ms, 1);
    assert_eq!(stats.recent_violations, 1);
}

#[rstest]
fn thresholds_are_strictly_greater_than() {
    let tracker = SlaTracker::default();
    tracker.record_operation(10);
    tracker.record_operation(50);
    tracker.record_operation(100);
    let stats = tracker.stats();
    assert_eq!(stats.total_operations, 3);
    // 10 ms is not a violation; 50 and 100 ms violate only lower tiers.
    assert_eq!(stats.violations_over_10ms, 2);
    assert_eq!(stats.violations_over_50ms, 1);
    assert_eq!(stats.violations_over_100ms, 0);
}

#[rstest]
fn violation_rate_is_percentage_of_all_operations() {
    let tracker = SlaTracker::default();
    assert_eq!(tracker.stats().violation_rate_pct, 0.0);

    tracker.record_operation(5);
    tracker.record_operation(5);
    tracker.record_operation(5);
    tracker.record_operation(20);
    let stats = tracker.stats();
    assert_eq!(stats.total_operations, 4);
    assert!((stats.violation_rate_pct - 25.0).abs() < f64::EPSILON);
}

#[rstest]
fn counters_are_monotonic_until_reset() {
    let tracker = SlaTracker::default();
    let mut last = 0;
    for duration in [15u64, 5, 60, 110, 8, 200] {
        tracker.record_operation(duration);
        let current = tracker.stats().violations_over_10ms;
        assert!(current >= last);
        last = current;
    }

    tracker.reset();
    let stats = tracker.stats();
    assert_eq!(stats.total_operations, 0);
    assert_eq!(stats.violations_over_10ms, 0);
    assert_eq!(stats.violations_over_50ms, 0);
    assert_eq!(stats.violations_over_100ms, 0);
    assert_eq!(stats.recent_violations, 0);
    assert_eq!(stats.violation_rate_pct, 0.0);
}

#[rstest]
fn recent_violations_is_a_true_rolling_window() {
    let tracker = SlaTracker::new(5);
    let now = now_ms();

    // A violation from seven minutes ago falls outside the window.
    tracker.record_operation_at_ms(80, now - 7 * MILLIS_PER_MIN);
    tracker.record_operation_at_ms(80, now);

    let stats = tracker.stats();
    assert_eq!(stats.violations_over_50ms, 2);
    assert_eq!(stats.recent_violations, 1);
}

#[rstest]
fn old_buckets_are_pruned_as_violations_arrive() {
    let tracker = SlaTracker::new(5);
    let start = now_ms() - 20 * MILLIS_PER_MIN;

    // Walk forward one violation per minute; the window never exceeds five.
    for minute in 0..20 {
        tracker.record_operation_at_ms(30, start + minute * MILLIS_PER_MIN);
    }
    assert_eq!(tracker.stats().violations_over_10ms, 20);
    assert!(tracker.stats().recent_violations <= 5);
}
