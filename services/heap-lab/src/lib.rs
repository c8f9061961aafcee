//! # Heap-Lab Pressure Service
//!
//! A controllable allocation-pressure generator coupled with a pause/latency
//! observability pipeline, for making a managed host's memory-reclamation
//! behavior visible under reproducible synthetic load:
//!
//! - **Scenario engine**: five allocation algorithms (steady load, growing
//!   heap, promotion storm, fragmentation, cross-generational references),
//!   each manufacturing a specific object-graph shape and allocation rate on
//!   a fixed cadence.
//! - **Pause recorder**: ingests the host's collection events, filters
//!   concurrent-cycle noise, keeps bounded per-collector histories, and
//!   reduces them to nearest-rank percentile snapshots.
//! - **SLA tracker**: cascading 10/50/100 ms violation counters with a
//!   rolling five-minute window.
//!
//! The two sides share no state; they correlate only through wall-clock
//! time. The web/transport layer that fronts this service is external and
//! drives everything through in-process calls.

#![warn(missing_docs)]

pub mod controller;
pub mod engine;
pub mod events;
pub mod recorder;
pub mod registry;
pub mod sla;

// Re-exports for convenience
pub use crate::controller::{EngineStatus, ModeInfo, ScenarioController};
pub use crate::engine::{EngineState, LiveSet, RefHolderPool, ramp_target_bytes};
pub use crate::events::{CollectionEvent, is_cycle_bucket, spawn_event_consumer};
pub use crate::recorder::{PauseEvent, PauseRecorder, PauseSnapshot, PercentileSnapshot};
pub use crate::registry::{AllocationMode, OFF_MODE, ScenarioRegistry, ScenarioType};
pub use crate::sla::{SlaSnapshot, SlaTracker};
