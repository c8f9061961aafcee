//! Single source of truth for sizing, timing, and threshold constants

// Size constants
pub const BYTES_PER_KB: u64 = 1024;
pub const BYTES_PER_MB: u64 = BYTES_PER_KB * 1024;

/// Live-set granule size. Whole granules are added or removed, never partials.
pub const GRANULE_BYTES: u64 = BYTES_PER_MB;

// Time constants
pub const MILLIS_PER_SEC: u64 = 1000;
pub const MILLIS_PER_MIN: u64 = 60_000;

// Allocation loop timing
/// Cadence of the scenario loop.
pub const ITERATION_MS: u64 = 100;
/// Iterations per second at the reference cadence.
pub const ITERATIONS_PER_SEC: u64 = MILLIS_PER_SEC / ITERATION_MS;
/// Parallel allocation workers fanned out per iteration.
pub const ALLOC_WORKERS: usize = 4;
/// Interval between allocation-rate log reports.
pub const RATE_REPORT_SECS: u64 = 5;
/// Chunk size for large transient allocations.
pub const TRANSIENT_CHUNK_BYTES: u64 = 256 * BYTES_PER_KB;
/// Size of a medium-lived buffer queued for promotion.
pub const PROMOTED_BUF_BYTES: u64 = 64 * BYTES_PER_KB;

// Fragmentation scenario buffer bounds (bytes)
pub const FRAG_MIN_BYTES: usize = 100;
pub const FRAG_MAX_BYTES: usize = 1000;

// Cross-generational scenario payload bounds (bytes)
pub const XREF_MIN_BYTES: usize = 1024;
pub const XREF_MAX_BYTES: usize = 4096;

// Pause statistics
/// Bounded pause history retained per collector.
pub const PAUSE_HISTORY_BOUND: usize = 500;

// SLA thresholds (milliseconds)
pub const SLA_THRESHOLD_10MS: u64 = 10;
pub const SLA_THRESHOLD_50MS: u64 = 50;
pub const SLA_THRESHOLD_100MS: u64 = 100;
/// Rolling window for the recent-violation count.
pub const SLA_WINDOW_MINUTES: u64 = 5;
