//! SLA violation tracking over the pause-event stream
//!
//! Thresholds cascade: a pause over 100 ms counts against the 100, 50, and
//! 10 ms counters; over 50 ms against 50 and 10; over 10 ms against 10 only.
//! All-time counters are monotonically non-decreasing until `reset`. Recent
//! violations are kept in minute buckets pruned to a trailing window.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use heaplab_common::{
    MILLIS_PER_MIN, SLA_THRESHOLD_10MS, SLA_THRESHOLD_50MS, SLA_THRESHOLD_100MS,
    SLA_WINDOW_MINUTES,
};
use serde::Serialize;

/// All-time totals plus the rolling recent-violation count
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SlaSnapshot {
    /// All operations classified, violating or not
    pub total_operations: u64,
    /// All-time pauses over 10 ms
    pub violations_over_10ms: u64,
    /// All-time pauses over 50 ms
    pub violations_over_50ms: u64,
    /// All-time pauses over 100 ms
    pub violations_over_100ms: u64,
    /// `violations_over_10ms / total_operations * 100`; zero when nothing
    /// has been recorded
    pub violation_rate_pct: f64,
    /// Violations within the trailing window
    pub recent_violations: u64,
}

/// Derived view over the same event stream the recorder consumes
pub struct SlaTracker {
    window_minutes: u64,
    total_operations: AtomicU64,
    over_10ms: AtomicU64,
    over_50ms: AtomicU64,
    over_100ms: AtomicU64,
    minute_buckets: DashMap<u64, AtomicU64>,
}

impl Default for SlaTracker {
    fn default() -> Self {
        Self::new(SLA_WINDOW_MINUTES)
    }
}

impl SlaTracker {
    /// Tracker with the given rolling-window length
    pub fn new(window_minutes: u64) -> Self {
        Self {
            window_minutes,
            total_operations: AtomicU64::new(0),
            over_10ms: AtomicU64::new(0),
            over_50ms: AtomicU64::new(0),
            over_100ms: AtomicU64::new(0),
            minute_buckets: DashMap::new(),
        }
    }

    /// Classify one observed latency against the wall clock.
    pub fn record_operation(&self, latency_ms: u64) {
        let now_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
        self.record_operation_at_ms(latency_ms, now_ms);
    }

    /// Classify one observed latency at the event's own wall-clock time.
    pub fn record_operation_at_ms(&self, latency_ms: u64, at_epoch_ms: u64) {
        self.total_operations.fetch_add(1, Ordering::Relaxed);
        if latency_ms <= SLA_THRESHOLD_10MS {
            return;
        }
        self.over_10ms.fetch_add(1, Ordering::Relaxed);
        if latency_ms > SLA_THRESHOLD_50MS {
            self.over_50ms.fetch_add(1, Ordering::Relaxed);
        }
        if latency_ms > SLA_THRESHOLD_100MS {
            self.over_100ms.fetch_add(1, Ordering::Relaxed);
        }

        let minute = at_epoch_ms / MILLIS_PER_MIN;
        self.minute_buckets
            .entry(minute)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
        self.prune(minute);
    }

    /// Drop buckets older than the trailing window so the map never grows
    /// without bound.
    fn prune(&self, now_minute: u64) {
        self.minute_buckets
            .retain(|&minute, _| now_minute.saturating_sub(minute) < self.window_minutes);
    }

    /// Violations within the trailing window, pruned as of now.
    pub fn recent_violations(&self) -> u64 {
        let now_minute = chrono::Utc::now().timestamp_millis().max(0) as u64 / MILLIS_PER_MIN;
        self.prune(now_minute);
        self.minute_buckets
            .iter()
            .map(|bucket| bucket.load(Ordering::Relaxed))
            .sum()
    }

    /// All-time totals, violation rate, and the rolling recent count
    pub fn stats(&self) -> SlaSnapshot {
        let total = self.total_operations.load(Ordering::Acquire);
        let over_10 = self.over_10ms.load(Ordering::Acquire);
        let rate = if total == 0 {
            0.0
        } else {
            over_10 as f64 / total as f64 * 100.0
        };
        SlaSnapshot {
            total_operations: total,
            violations_over_10ms: over_10,
            violations_over_50ms: self.over_50ms.load(Ordering::Acquire),
            violations_over_100ms: self.over_100ms.load(Ordering::Acquire),
            violation_rate_pct: rate,
            recent_violations: self.recent_violations(),
        }
    }

    /// Zero every counter and empty the rolling window.
    pub fn reset(&self) {
        self.total_operations.store(0, Ordering::Release);
        self.over_10ms.store(0, Ordering::Release);
        self.over_50ms.store(0, Ordering::Release);
        self.over_100ms.store(0, Ordering::Release);
        self.minute_buckets.clear();
    }
}
