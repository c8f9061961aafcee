//! Service configuration

use serde::{Deserialize, Serialize};

use crate::constants::{
    ALLOC_WORKERS, ITERATION_MS, PAUSE_HISTORY_BOUND, RATE_REPORT_SECS, SLA_WINDOW_MINUTES,
};

/// Allocation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Scenario loop cadence in milliseconds
    pub iteration_ms: u64,
    /// Number of parallel allocation workers per iteration
    pub alloc_workers: usize,
    /// Seconds between allocation-rate log reports
    pub rate_report_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            iteration_ms: ITERATION_MS,
            alloc_workers: ALLOC_WORKERS,
            rate_report_secs: RATE_REPORT_SECS,
        }
    }
}

/// Pause recorder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Maximum pause samples retained per collector
    pub history_bound: usize,
    /// Rolling window for recent SLA violations, in minutes
    pub sla_window_minutes: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            history_bound: PAUSE_HISTORY_BOUND,
            sla_window_minutes: SLA_WINDOW_MINUTES,
        }
    }
}
