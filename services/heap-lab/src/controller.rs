//! Scenario controller: mode lifecycle, generation fencing, cadence loop
//!
//! One `ScenarioController` exists per process (constructed once at startup
//! and shared via `Arc`). Mode switches go through a single exclusive path:
//! bump the generation so any stale loop abandons its next checkpoint, reset
//! the shared gauges, then spawn a fresh loop bound to the new mode and
//! generation. There is no scenario-to-scenario edge; every switch takes the
//! same cleanup path as going through `OFF`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use heaplab_common::{BYTES_PER_MB, EngineConfig, MILLIS_PER_SEC, PressureError};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info};

use crate::engine::{EngineState, run_tick};
use crate::registry::{AllocationMode, OFF_MODE, ScenarioRegistry};

fn epoch_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Current mode and liveness, as reported to the control layer
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    /// Current mode name
    pub mode: String,
    /// Whether a scenario loop is active
    pub running: bool,
    /// Configured allocation rate of the current mode
    pub rate_mb_per_sec: u64,
}

/// One registry entry, as reported by `list_modes`
#[derive(Debug, Clone, Serialize)]
pub struct ModeInfo {
    /// Registry identifier
    pub name: String,
    /// Human-readable summary
    pub description: String,
    /// Configured allocation rate
    pub rate_mb_per_sec: u64,
}

/// Process-wide scenario state and lifecycle
pub struct ScenarioController {
    registry: ScenarioRegistry,
    cfg: EngineConfig,
    current: RwLock<AllocationMode>,
    running: AtomicBool,
    generation: AtomicU64,
    started_at_ms: AtomicU64,
    switch_lock: Mutex<()>,
    bytes_counter: Arc<AtomicU64>,
    allocated_total: AtomicU64,
    live_set_gauge: Arc<AtomicU64>,
}

impl ScenarioController {
    /// Construct the process-wide controller, starting in `OFF`.
    pub fn new(cfg: EngineConfig) -> Arc<Self> {
        Arc::new(Self {
            registry: ScenarioRegistry::new(),
            cfg,
            current: RwLock::new(OFF_MODE),
            running: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            started_at_ms: AtomicU64::new(0),
            switch_lock: Mutex::new(()),
            bytes_counter: Arc::new(AtomicU64::new(0)),
            allocated_total: AtomicU64::new(0),
            live_set_gauge: Arc::new(AtomicU64::new(0)),
        })
    }

    /// The immutable scenario registry
    pub fn registry(&self) -> &ScenarioRegistry {
        &self.registry
    }

    /// Engine timing configuration
    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Case-insensitive mode switch for the control surface.
    pub fn set_mode_by_name(
        self: &Arc<Self>,
        name: &str,
    ) -> Result<AllocationMode, PressureError> {
        let mode = *self.registry.lookup(name)?;
        self.set_mode(mode);
        Ok(mode)
    }

    /// Switch scenarios. No-op when the mode is unchanged; otherwise the
    /// previous loop is fenced out, all scenario-local gauges are reset, and
    /// a fresh loop starts unless the new mode is `OFF`.
    pub fn set_mode(self: &Arc<Self>, mode: AllocationMode) {
        let _guard = self.switch_lock.lock();
        if *self.current.read() == mode {
            return;
        }

        // Fence: a loop iteration that observes a stale generation abandons
        // its tick, so nothing below races with the outgoing scenario.
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.running.store(false, Ordering::Release);
        self.bytes_counter.store(0, Ordering::Release);
        self.allocated_total.store(0, Ordering::Release);
        self.live_set_gauge.store(0, Ordering::Release);

        *self.current.write() = mode;
        self.started_at_ms.store(epoch_ms(), Ordering::Release);

        if mode.is_off() {
            info!("scenario engine stopped");
            return;
        }

        self.running.store(true, Ordering::Release);
        let ctrl = Arc::clone(self);
        tokio::spawn(run_scenario_loop(ctrl, mode, generation));
        info!(
            scenario = mode.name,
            rate_mb_per_sec = mode.rate_mb_per_sec,
            live_set_mb = mode.live_set_mb,
            "scenario started"
        );
    }

    /// Transition to `OFF`; identical cleanup path to any other switch.
    pub fn stop(self: &Arc<Self>) {
        self.set_mode(OFF_MODE);
    }

    /// The mode currently in effect
    pub fn current_mode(&self) -> AllocationMode {
        *self.current.read()
    }

    /// Whether a scenario loop is active; atomic read
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Monotonic switch counter; stale loops compare against it
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Wall-clock epoch milliseconds of the last mode switch
    pub fn started_at_epoch_ms(&self) -> u64 {
        self.started_at_ms.load(Ordering::Acquire)
    }

    /// Bytes currently retained by the active scenario's live set. Zeroed on
    /// every mode switch, before any new allocation occurs.
    pub fn live_set_bytes(&self) -> u64 {
        self.live_set_gauge.load(Ordering::Acquire)
    }

    /// Bytes allocated by the active scenario since its last switch.
    /// Monotonic within a scenario's lifetime; zeroed on every switch.
    pub fn allocated_bytes_total(&self) -> u64 {
        self.allocated_total.load(Ordering::Acquire)
    }

    /// Current mode and liveness for the control surface
    pub fn status(&self) -> EngineStatus {
        let mode = self.current_mode();
        EngineStatus {
            mode: mode.name.to_string(),
            running: self.is_running(),
            rate_mb_per_sec: mode.rate_mb_per_sec,
        }
    }

    /// Every registered mode, for enumeration endpoints
    pub fn list_modes(&self) -> Vec<ModeInfo> {
        self.registry
            .modes()
            .iter()
            .map(|mode| ModeInfo {
                name: mode.name.to_string(),
                description: mode.description.to_string(),
                rate_mb_per_sec: mode.rate_mb_per_sec,
            })
            .collect()
    }
}

/// The cadence loop for one scenario instance. Exits as soon as it observes
/// a stale generation; worst-case latency to honor a switch is one tick.
async fn run_scenario_loop(ctrl: Arc<ScenarioController>, mode: AllocationMode, generation: u64) {
    let cfg = ctrl.cfg.clone();
    let cadence = Duration::from_millis(cfg.iteration_ms);
    let report_every = Duration::from_secs(cfg.rate_report_secs);
    let mut state = EngineState::new(&mode);
    let mut last_report = Instant::now();

    loop {
        if ctrl.generation() != generation || !ctrl.is_running() {
            break;
        }
        let tick_started = Instant::now();
        let elapsed_ms = epoch_ms().saturating_sub(ctrl.started_at_epoch_ms());

        let counter_before = ctrl.bytes_counter.load(Ordering::Acquire);
        run_tick(&mut state, &mode, &cfg, &ctrl.bytes_counter, elapsed_ms).await;
        let tick_bytes = ctrl
            .bytes_counter
            .load(Ordering::Acquire)
            .saturating_sub(counter_before);

        // Post-fan-out checkpoint: a stale tick publishes nothing. The
        // switch lock makes check-then-store atomic against `set_mode`, so
        // a switch landing mid-tick cannot have its gauge reset overwritten.
        {
            let _publish = ctrl.switch_lock.lock();
            if ctrl.generation() != generation {
                break;
            }
            ctrl.allocated_total.fetch_add(tick_bytes, Ordering::AcqRel);
            ctrl.live_set_gauge
                .store(state.live_set.total_bytes(), Ordering::Release);
        }

        if last_report.elapsed() >= report_every {
            let bytes = ctrl.bytes_counter.swap(0, Ordering::AcqRel);
            let window_ms = last_report.elapsed().as_millis().max(1) as u64;
            info!(
                scenario = mode.name,
                mb_per_sec = bytes * MILLIS_PER_SEC / (BYTES_PER_MB * window_ms),
                live_set_mb = state.live_set.total_bytes() / BYTES_PER_MB,
                "allocation rate"
            );
            last_report = Instant::now();
        }

        // Degrade gracefully under load instead of compounding drift.
        tokio::time::sleep(cadence.saturating_sub(tick_started.elapsed())).await;
    }

    debug!(scenario = mode.name, generation, "scenario loop exited");
}
