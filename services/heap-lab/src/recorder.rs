//! Pause/latency recorder: bounded histories and nearest-rank percentiles
//!
//! Consumes stop-the-world pause events from the host runtime (already
//! filtered by the event adapter), keeps a bounded FIFO of recent durations
//! per collector, and computes percentile snapshots on demand from a sorted
//! copy. Mutated concurrently by the event consumer and read concurrently by
//! stats queries; reset must be safe against in-flight recording.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use heaplab_common::RecorderConfig;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use sysinfo::System;

/// A stop-the-world pause as recorded. Produced by the host runtime via the
/// event adapter; this system only observes it.
#[derive(Debug, Clone)]
pub struct PauseEvent {
    /// Collector name, e.g. "G1 Young Generation"
    pub collector: String,
    /// Action label, e.g. "end of minor GC"
    pub action: String,
    /// Cause label, e.g. "Allocation Failure"
    pub cause: String,
    /// Client-visible pause duration
    pub duration_ms: u64,
    /// Wall-clock time the event was observed
    pub at_epoch_ms: u64,
    /// Sub-phase timings within the pause, when the runtime can supply them
    pub phases: Option<FxHashMap<String, u64>>,
}

/// Nearest-rank percentiles over one collector's retained window.
/// All zero when the history is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PercentileSnapshot {
    /// 50th percentile pause in milliseconds
    pub p50: u64,
    /// 95th percentile pause in milliseconds
    pub p95: u64,
    /// 99th percentile pause in milliseconds
    pub p99: u64,
    /// 99.9th percentile pause in milliseconds
    pub p999: u64,
    /// Largest pause in the window
    pub max: u64,
}

impl PercentileSnapshot {
    /// `index = clamp(ceil(p * n) - 1, 0, n - 1)` over a sorted sample.
    pub fn from_sorted(sorted: &[u64]) -> Self {
        Self {
            p50: nearest_rank(sorted, 0.50),
            p95: nearest_rank(sorted, 0.95),
            p99: nearest_rank(sorted, 0.99),
            p999: nearest_rank(sorted, 0.999),
            max: sorted.last().copied().unwrap_or(0),
        }
    }
}

fn nearest_rank(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let n = sorted.len();
    let idx = ((p * n as f64).ceil() as usize).saturating_sub(1).min(n - 1);
    sorted[idx]
}

/// Per-collector statistics in a pause snapshot
#[derive(Debug, Clone, Serialize)]
pub struct CollectorStats {
    /// Nearest-rank percentiles over the retained window
    pub percentiles: PercentileSnapshot,
    /// All-time event count for this collector
    pub count: u64,
    /// All-time accumulated pause milliseconds
    pub total_pause_ms: u64,
    /// The retained window, oldest first
    pub recent_history: Vec<u64>,
    /// Per-phase percentiles over the retained window. Events without phase
    /// detail contribute a single "Total" phase equal to the pause duration.
    pub phase_breakdown: BTreeMap<String, PercentileSnapshot>,
}

/// Full query-path snapshot for the control layer
#[derive(Debug, Clone, Serialize)]
pub struct PauseSnapshot {
    /// Statistics keyed by collector name
    pub per_collector: BTreeMap<String, CollectorStats>,
    /// All-time recorded pause count across collectors
    pub total_events: u64,
    /// All-time accumulated pause milliseconds across collectors
    pub total_pause_ms: u64,
    /// All-time maximum pause across collectors
    pub max_pause_ms: u64,
    /// Host total memory at snapshot time
    pub total_memory_bytes: u64,
    /// Host used memory at snapshot time
    pub used_memory_bytes: u64,
    /// Host free memory at snapshot time
    pub free_memory_bytes: u64,
}

#[derive(Default)]
struct CollectorHistory {
    samples: Mutex<VecDeque<u64>>,
    phases: Mutex<FxHashMap<String, VecDeque<u64>>>,
    count: AtomicU64,
    total_ms: AtomicU64,
}

/// Event-stream consumer side of the observability pipeline
pub struct PauseRecorder {
    cfg: RecorderConfig,
    histories: DashMap<String, CollectorHistory>,
    total_events: AtomicU64,
    total_pause_ms: AtomicU64,
    max_pause_ms: AtomicU64,
    max_lock: Mutex<()>,
}

impl Default for PauseRecorder {
    fn default() -> Self {
        Self::new(RecorderConfig::default())
    }
}

impl PauseRecorder {
    /// Recorder with the given history bound
    pub fn new(cfg: RecorderConfig) -> Self {
        Self {
            cfg,
            histories: DashMap::new(),
            total_events: AtomicU64::new(0),
            total_pause_ms: AtomicU64::new(0),
            max_pause_ms: AtomicU64::new(0),
            max_lock: Mutex::new(()),
        }
    }

    /// Record one pause event: bounded history append, accumulator updates,
    /// and a double-checked all-time max.
    pub fn record(&self, event: &PauseEvent) {
        let entry = self
            .histories
            .entry(event.collector.clone())
            .or_default();
        {
            let mut samples = entry.samples.lock();
            while samples.len() >= self.cfg.history_bound {
                samples.pop_front();
            }
            samples.push_back(event.duration_ms);
        }
        {
            let mut phases = entry.phases.lock();
            match event.phases.as_ref().filter(|map| !map.is_empty()) {
                Some(map) => {
                    for (phase, duration_ms) in map {
                        push_bounded(
                            phases.entry(phase.clone()).or_default(),
                            *duration_ms,
                            self.cfg.history_bound,
                        );
                    }
                }
                // Intentionally degenerate fallback when the runtime supplies
                // no phase-level detail.
                None => push_bounded(
                    phases.entry("Total".to_string()).or_default(),
                    event.duration_ms,
                    self.cfg.history_bound,
                ),
            }
        }
        entry.count.fetch_add(1, Ordering::Relaxed);
        entry.total_ms.fetch_add(event.duration_ms, Ordering::Relaxed);
        drop(entry);

        self.total_events.fetch_add(1, Ordering::Relaxed);
        self.total_pause_ms
            .fetch_add(event.duration_ms, Ordering::Relaxed);

        // Read-then-lock-then-recheck: the common non-max case stays
        // lock-free.
        if event.duration_ms > self.max_pause_ms.load(Ordering::Acquire) {
            let _guard = self.max_lock.lock();
            if event.duration_ms > self.max_pause_ms.load(Ordering::Acquire) {
                self.max_pause_ms.store(event.duration_ms, Ordering::Release);
            }
        }
    }

    /// Immutable copy of all current state, sorted and reduced to
    /// nearest-rank percentiles. Never fails; empty history yields zeros.
    pub fn snapshot(&self) -> PauseSnapshot {
        let mut per_collector = BTreeMap::new();
        for entry in self.histories.iter() {
            let recent_history: Vec<u64> = entry.samples.lock().iter().copied().collect();
            let mut sorted = recent_history.clone();
            sorted.sort_unstable();

            let mut phase_breakdown = BTreeMap::new();
            for (phase, window) in entry.phases.lock().iter() {
                let mut phase_sorted: Vec<u64> = window.iter().copied().collect();
                phase_sorted.sort_unstable();
                phase_breakdown.insert(phase.clone(), PercentileSnapshot::from_sorted(&phase_sorted));
            }

            per_collector.insert(
                entry.key().clone(),
                CollectorStats {
                    percentiles: PercentileSnapshot::from_sorted(&sorted),
                    count: entry.count.load(Ordering::Acquire),
                    total_pause_ms: entry.total_ms.load(Ordering::Acquire),
                    recent_history,
                    phase_breakdown,
                },
            );
        }

        let (total, used, free) = system_memory();
        PauseSnapshot {
            per_collector,
            total_events: self.total_events.load(Ordering::Acquire),
            total_pause_ms: self.total_pause_ms.load(Ordering::Acquire),
            max_pause_ms: self.max_pause_ms.load(Ordering::Acquire),
            total_memory_bytes: total,
            used_memory_bytes: used,
            free_memory_bytes: free,
        }
    }

    /// Clear all history, counters, and phase data. Safe to call while
    /// events are being recorded: a reader never sees a negative count or an
    /// over-bound history.
    pub fn reset(&self) {
        self.histories.clear();
        self.total_events.store(0, Ordering::Release);
        self.total_pause_ms.store(0, Ordering::Release);
        let _guard = self.max_lock.lock();
        self.max_pause_ms.store(0, Ordering::Release);
    }
}

fn push_bounded(window: &mut VecDeque<u64>, value: u64, bound: usize) {
    while window.len() >= bound {
        window.pop_front();
    }
    window.push_back(value);
}

fn system_memory() -> (u64, u64, u64) {
    let mut sys = System::new();
    sys.refresh_memory();
    (sys.total_memory(), sys.used_memory(), sys.free_memory())
}
