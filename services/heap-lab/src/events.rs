//! Collection-event ingestion: adapter type, pause filtering, consumer task
//!
//! The host runtime's notification mechanism is abstracted to an inbound
//! mpsc channel of [`CollectionEvent`]s; a consumer task drains it into the
//! recorder and SLA tracker. Whether an event is a real stop-the-world pause
//! is decided by the `is_stw_pause` capability flag when the runtime adapter
//! supplies one; the collector-name heuristic survives only as the fallback
//! for adapters that cannot.

use std::sync::Arc;
use std::time::Duration;

use heaplab_common::PressureError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::recorder::{PauseEvent, PauseRecorder};
use crate::sla::SlaTracker;

/// Raw collection event as delivered by a runtime-specific adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionEvent {
    /// Collector name as reported by the host runtime
    pub collector: String,
    /// Action label as reported by the host runtime
    pub action: String,
    /// Cause label as reported by the host runtime
    pub cause: String,
    /// Reported duration; cycle length for concurrent buckets
    pub duration_ms: u64,
    /// Wall-clock time the event was observed
    pub at_epoch_ms: u64,
    /// Capability flag: the adapter's authoritative answer to "is this a
    /// stop-the-world pause". `None` falls back to the name heuristic.
    #[serde(default)]
    pub is_stw_pause: Option<bool>,
    /// Sub-phase timings, when the runtime can supply them
    #[serde(default)]
    pub phases: Option<FxHashMap<String, u64>>,
}

impl CollectionEvent {
    /// Decode an adapter payload; malformed events are skipped upstream.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, PressureError> {
        serde_json::from_value(value.clone())
            .map_err(|err| PressureError::EventParse(err.to_string()))
    }

    /// True when this event represents client-visible pause time and should
    /// enter the statistics.
    pub fn is_pause(&self) -> bool {
        match self.is_stw_pause {
            Some(flag) => flag,
            None => !is_cycle_bucket(&self.collector),
        }
    }
}

impl From<CollectionEvent> for PauseEvent {
    fn from(event: CollectionEvent) -> Self {
        Self {
            collector: event.collector,
            action: event.action,
            cause: event.cause,
            duration_ms: event.duration_ms,
            at_epoch_ms: event.at_epoch_ms,
            phases: event.phases,
        }
    }
}

/// Accounting buckets whose reported duration is concurrent-cycle length,
/// not client-visible pause time.
const CYCLE_BUCKETS: &[&str] = &["ZGC Cycles", "Shenandoah Cycles", "G1 Concurrent GC"];

/// Name heuristic for concurrent-cycle buckets: a known cycle identifier, or
/// a "cycles" marker without a "pauses" marker. Case-insensitive.
pub fn is_cycle_bucket(name: &str) -> bool {
    if CYCLE_BUCKETS
        .iter()
        .any(|bucket| bucket.eq_ignore_ascii_case(name))
    {
        return true;
    }
    let lower = name.to_ascii_lowercase();
    lower.contains("cycles") && !lower.contains("pauses")
}

/// Per-event handling shared by every consumer: filter cycle buckets, then
/// feed the recorder and the SLA tracker.
fn ingest(event: CollectionEvent, recorder: &PauseRecorder, sla: &SlaTracker) {
    if !event.is_pause() {
        debug!(
            collector = %event.collector,
            duration_ms = event.duration_ms,
            "skipping concurrent-cycle bucket"
        );
        return;
    }
    let pause = PauseEvent::from(event);
    sla.record_operation_at_ms(pause.duration_ms, pause.at_epoch_ms);
    recorder.record(&pause);
}

/// Drain the inbound event channel into the recorder and SLA tracker until
/// the channel closes. Filtered cycle buckets never reach either.
pub fn spawn_event_consumer(
    mut rx: mpsc::Receiver<CollectionEvent>,
    recorder: Arc<PauseRecorder>,
    sla: Arc<SlaTracker>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            ingest(event, &recorder, &sla);
        }
    })
}

/// Like [`spawn_event_consumer`], but for adapters that deliver raw JSON
/// payloads. A malformed payload is logged and skipped; consumption
/// continues.
pub fn spawn_json_event_consumer(
    mut rx: mpsc::Receiver<serde_json::Value>,
    recorder: Arc<PauseRecorder>,
    sla: Arc<SlaTracker>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            match CollectionEvent::from_json(&payload) {
                Ok(event) => ingest(event, &recorder, &sla),
                Err(err) => warn!(%err, "skipping malformed collection event"),
            }
        }
    })
}

/// Synthetic event source for the demo driver: plausible young-generation
/// pauses, occasional old-generation pauses, and the odd concurrent-cycle
/// bucket that the consumer must filter out.
pub fn spawn_synthetic_emitter(
    tx: mpsc::Sender<CollectionEvent>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rng = StdRng::from_entropy();
        loop {
            let roll: f64 = rng.r#gen();
            let event = if roll < 0.80 {
                synthetic_event(&mut rng, "G1 Young Generation", "end of minor GC", 1, 25)
            } else if roll < 0.95 {
                synthetic_event(&mut rng, "G1 Old Generation", "end of major GC", 20, 150)
            } else {
                synthetic_event(&mut rng, "G1 Concurrent GC", "concurrent cycle", 100, 900)
            };
            if tx.send(event).await.is_err() {
                break;
            }
            tokio::time::sleep(interval).await;
        }
    })
}

fn synthetic_event(
    rng: &mut StdRng,
    collector: &str,
    action: &str,
    min_ms: u64,
    max_ms: u64,
) -> CollectionEvent {
    CollectionEvent {
        collector: collector.to_string(),
        action: action.to_string(),
        cause: "Allocation Failure".to_string(),
        duration_ms: rng.gen_range(min_ms..=max_ms),
        at_epoch_ms: chrono::Utc::now().timestamp_millis().max(0) as u64,
        is_stw_pause: None,
        phases: None,
    }
}
