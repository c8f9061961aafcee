//! Scenario registry and allocation-mode model
//!
//! Pure configuration data, immutable after startup. The registry enumerates
//! every pressure scenario the engine can run together with its tunable
//! parameters; the control layer looks modes up by name (case-insensitive)
//! and turns `UnknownScenario` into a user-facing rejection.

use heaplab_common::{BYTES_PER_MB, MILLIS_PER_SEC, PressureError};
use serde::{Deserialize, Serialize};

/// Kind of allocation pressure a scenario applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScenarioType {
    /// No synthetic pressure
    Off,
    /// Constant allocation rate against a fixed live set
    Steady,
    /// Constant rate while the live set ramps linearly to a final size
    Growing,
    /// Half transient garbage, half medium-lived buffers promoted each tick
    Promotion,
    /// Many small randomly sized transient buffers
    Fragmentation,
    /// Old-generation holders repeatedly pointed at young buffers
    CrossRef,
}

/// A scenario bound to its tunable parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AllocationMode {
    /// Which pressure algorithm this mode drives
    pub scenario: ScenarioType,
    /// Registry identifier, e.g. `STEADY_LOAD`
    pub name: &'static str,
    /// Target allocation rate in MB per second
    pub rate_mb_per_sec: u64,
    /// Target live-set size in MB (the ramp endpoint for `Growing`)
    pub live_set_mb: u64,
    /// Live-set size at the start of the ramp; only meaningful for `Growing`
    pub growth_start_mb: u64,
    /// Ramp duration in seconds; only meaningful for `Growing`
    pub growth_duration_secs: u64,
    /// Human-readable summary for the control surface
    pub description: &'static str,
}

impl AllocationMode {
    /// Target allocation rate in bytes per second; deterministic, no randomness
    pub fn bytes_per_second(&self) -> u64 {
        self.rate_mb_per_sec * BYTES_PER_MB
    }

    /// Per-iteration byte budget at the given cadence
    pub fn bytes_per_iteration(&self, iteration_ms: u64) -> u64 {
        self.bytes_per_second() * iteration_ms / MILLIS_PER_SEC
    }

    /// Target live-set size in bytes
    pub fn target_live_bytes(&self) -> u64 {
        self.live_set_mb * BYTES_PER_MB
    }

    /// True for the quiescent `OFF` mode
    pub fn is_off(&self) -> bool {
        self.scenario == ScenarioType::Off
    }
}

/// The quiescent mode every process starts in. Rate and live set are zero.
pub const OFF_MODE: AllocationMode = AllocationMode {
    scenario: ScenarioType::Off,
    name: "OFF",
    rate_mb_per_sec: 0,
    live_set_mb: 0,
    growth_start_mb: 0,
    growth_duration_secs: 0,
    description: "No synthetic allocation pressure",
};

static MODES: [AllocationMode; 6] = [
    OFF_MODE,
    AllocationMode {
        scenario: ScenarioType::Steady,
        name: "STEADY_LOAD",
        rate_mb_per_sec: 200,
        live_set_mb: 512,
        growth_start_mb: 0,
        growth_duration_secs: 0,
        description: "Constant allocation rate against a fixed 512 MB live set",
    },
    AllocationMode {
        scenario: ScenarioType::Growing,
        name: "GROWING_HEAP",
        rate_mb_per_sec: 100,
        live_set_mb: 2048,
        growth_start_mb: 100,
        growth_duration_secs: 60,
        description: "Live set ramps linearly from 100 MB to 2048 MB over 60 s",
    },
    AllocationMode {
        scenario: ScenarioType::Promotion,
        name: "PROMOTION_STORM",
        rate_mb_per_sec: 300,
        live_set_mb: 1024,
        growth_start_mb: 0,
        growth_duration_secs: 0,
        description: "Steady flow of medium-lived buffers promoted into the live set",
    },
    AllocationMode {
        scenario: ScenarioType::Fragmentation,
        name: "FRAGMENTATION",
        rate_mb_per_sec: 150,
        live_set_mb: 512,
        growth_start_mb: 0,
        growth_duration_secs: 0,
        description: "Many small randomly sized transient buffers (100-1000 bytes)",
    },
    AllocationMode {
        scenario: ScenarioType::CrossRef,
        name: "CROSS_GEN_REFS",
        rate_mb_per_sec: 100,
        live_set_mb: 256,
        growth_start_mb: 0,
        growth_duration_secs: 0,
        description: "Old-generation holders repeatedly overwritten with young buffers",
    },
];

/// Immutable table of every available mode
#[derive(Debug, Clone, Default)]
pub struct ScenarioRegistry;

impl ScenarioRegistry {
    /// Build the registry. The mode table is compiled in and never changes.
    pub fn new() -> Self {
        Self
    }

    /// Case-insensitive lookup by mode name
    pub fn lookup(&self, name: &str) -> Result<&'static AllocationMode, PressureError> {
        MODES
            .iter()
            .find(|mode| mode.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| PressureError::UnknownScenario {
                requested: name.to_string(),
                valid: self.names(),
            })
    }

    /// All modes, `OFF` first
    pub fn modes(&self) -> &'static [AllocationMode] {
        &MODES
    }

    /// Valid mode identifiers, in registry order
    pub fn names(&self) -> Vec<String> {
        MODES.iter().map(|mode| mode.name.to_string()).collect()
    }
}
