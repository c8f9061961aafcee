//! Allocation engine: five pressure algorithms and their scenario-local state
//!
//! Each algorithm is a pure function of (mode parameters, elapsed time,
//! mutable scenario-local state). The controller owns the cadence loop and
//! calls [`run_tick`] once per iteration; everything here is touched only by
//! that single active loop and the short-lived workers it fans out, never by
//! the pause recorder.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::queue::SegQueue;
use heaplab_common::{
    BYTES_PER_MB, EngineConfig, FRAG_MAX_BYTES, FRAG_MIN_BYTES, GRANULE_BYTES, MILLIS_PER_SEC,
    PROMOTED_BUF_BYTES, TRANSIENT_CHUNK_BYTES, XREF_MAX_BYTES, XREF_MIN_BYTES,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinSet;
use tracing::warn;

use crate::registry::{AllocationMode, ScenarioType};

const PAGE_BYTES: usize = 4096;

/// Write one byte per page so the allocation is actually committed rather
/// than remaining a copy-on-write zero mapping.
fn touch_pages(buf: &mut [u8]) {
    let mut i = 0;
    while i < buf.len() {
        buf[i] = 1;
        i += PAGE_BYTES;
    }
}

fn alloc_touched(len: usize) -> Box<[u8]> {
    let mut buf = vec![0u8; len];
    touch_pages(&mut buf);
    buf.into_boxed_slice()
}

/// Ordered collection of retained buffers plus a running byte total.
///
/// Steady-state maintenance adds and removes whole granules only, so once
/// converged the total stays within one granule of the target. Promotion may
/// retain arbitrary-sized buffers; those are trimmed FIFO by [`trim_to`].
///
/// [`trim_to`]: LiveSet::trim_to
#[derive(Default)]
pub struct LiveSet {
    entries: VecDeque<Box<[u8]>>,
    total_bytes: u64,
}

impl LiveSet {
    /// An empty live set
    pub fn new() -> Self {
        Self::default()
    }

    /// Running total of retained bytes
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is retained
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every retained buffer
    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_bytes = 0;
    }

    /// Converge on `target_bytes` by adding or evicting whole granules.
    /// Eviction is FIFO: the oldest entry goes first.
    pub fn adjust_to(&mut self, target_bytes: u64) {
        while self.total_bytes + GRANULE_BYTES <= target_bytes {
            self.retain(alloc_touched(GRANULE_BYTES as usize));
        }
        while self.total_bytes > target_bytes && self.total_bytes - target_bytes >= GRANULE_BYTES {
            self.evict_oldest();
        }
    }

    /// Retain an arbitrary buffer (promotion path).
    pub fn retain(&mut self, buf: Box<[u8]>) {
        self.total_bytes += buf.len() as u64;
        self.entries.push_back(buf);
    }

    /// Evict oldest entries until the total is at or below `target_bytes`.
    pub fn trim_to(&mut self, target_bytes: u64) {
        while self.total_bytes > target_bytes {
            if self.evict_oldest().is_none() {
                break;
            }
        }
    }

    fn evict_oldest(&mut self) -> Option<usize> {
        let buf = self.entries.pop_front()?;
        self.total_bytes -= buf.len() as u64;
        Some(buf.len())
    }
}

struct RefHolder {
    _padding: Box<[u8]>,
    slot: Option<Box<[u8]>>,
}

/// Fixed pool of long-lived holders, each with one mutable slot that is
/// repeatedly overwritten to point at a freshly allocated short-lived buffer.
/// The overwrite is the operation under test: an old-to-young reference that
/// forces the host's write-barrier and remembered-set bookkeeping.
pub struct RefHolderPool {
    holders: Vec<Mutex<RefHolder>>,
}

impl RefHolderPool {
    /// One holder (~1 MB padding) per MB of live-set target.
    pub fn with_capacity_mb(mb: u64) -> Self {
        let holders = (0..mb)
            .map(|_| {
                Mutex::new(RefHolder {
                    _padding: alloc_touched(GRANULE_BYTES as usize),
                    slot: None,
                })
            })
            .collect();
        Self { holders }
    }

    /// Number of holders in the pool
    pub fn len(&self) -> usize {
        self.holders.len()
    }

    /// True when the pool has no holders
    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    /// Overwrite the slot of holder `idx`, dropping whatever it held.
    pub fn assign(&self, idx: usize, buf: Box<[u8]>) {
        if let Some(holder) = self.holders.get(idx) {
            holder.lock().slot = Some(buf);
        }
    }

    /// Number of holders currently pointing at a young buffer.
    pub fn occupied(&self) -> usize {
        self.holders
            .iter()
            .filter(|holder| holder.lock().slot.is_some())
            .count()
    }
}

/// Mutable state owned by a single scenario loop. Dropped (and thus fully
/// released) when the loop exits, so a fresh loop always starts empty.
pub struct EngineState {
    /// Retained buffers the scenario keeps reachable on purpose
    pub live_set: LiveSet,
    promoted: Arc<SegQueue<Box<[u8]>>>,
    holders: Option<Arc<RefHolderPool>>,
}

impl EngineState {
    /// Fresh state for one scenario instance; only the cross-generational
    /// scenario carries a holder pool.
    pub fn new(mode: &AllocationMode) -> Self {
        let holders = match mode.scenario {
            ScenarioType::CrossRef => {
                Some(Arc::new(RefHolderPool::with_capacity_mb(mode.live_set_mb)))
            }
            _ => None,
        };
        Self {
            live_set: LiveSet::new(),
            promoted: Arc::new(SegQueue::new()),
            holders,
        }
    }

    /// The cross-generational holder pool, when this scenario has one
    pub fn holder_pool(&self) -> Option<&Arc<RefHolderPool>> {
        self.holders.as_ref()
    }
}

/// Linear live-set ramp for the growing-heap scenario:
/// `target(t) = start + (final - start) * min(1, elapsed / duration)`.
pub fn ramp_target_bytes(
    start_bytes: u64,
    final_bytes: u64,
    duration_secs: u64,
    elapsed_ms: u64,
) -> u64 {
    if duration_secs == 0 || final_bytes <= start_bytes {
        return final_bytes;
    }
    let duration_ms = duration_secs * MILLIS_PER_SEC;
    if elapsed_ms >= duration_ms {
        return final_bytes;
    }
    let span = final_bytes - start_bytes;
    start_bytes + (span as u128 * elapsed_ms as u128 / duration_ms as u128) as u64
}

/// One iteration of the active scenario. `elapsed_ms` is wall-clock time
/// since the scenario began (its recorded start epoch).
pub async fn run_tick(
    state: &mut EngineState,
    mode: &AllocationMode,
    cfg: &EngineConfig,
    bytes_counter: &Arc<AtomicU64>,
    elapsed_ms: u64,
) {
    let budget = mode.bytes_per_iteration(cfg.iteration_ms);
    match mode.scenario {
        ScenarioType::Off => {}
        ScenarioType::Steady => {
            state.live_set.adjust_to(mode.target_live_bytes());
            fan_out_transient(budget, cfg.alloc_workers, bytes_counter).await;
        }
        ScenarioType::Growing => {
            let target = ramp_target_bytes(
                mode.growth_start_mb * BYTES_PER_MB,
                mode.target_live_bytes(),
                mode.growth_duration_secs,
                elapsed_ms,
            );
            state.live_set.adjust_to(target);
            fan_out_transient(budget, cfg.alloc_workers, bytes_counter).await;
        }
        ScenarioType::Promotion => {
            // Half the budget churns as ordinary garbage, half survives long
            // enough to be promoted into the live set this same tick.
            fan_out_transient(budget / 2, cfg.alloc_workers, bytes_counter).await;
            fan_out_promote(
                budget / 2,
                cfg.alloc_workers,
                &state.promoted,
                bytes_counter,
            )
            .await;
            while let Some(buf) = state.promoted.pop() {
                state.live_set.retain(buf);
            }
            state.live_set.trim_to(mode.target_live_bytes());
        }
        ScenarioType::Fragmentation => {
            state.live_set.adjust_to(mode.target_live_bytes());
            fan_out_fragments(budget, cfg.alloc_workers, bytes_counter).await;
        }
        ScenarioType::CrossRef => {
            if let Some(holders) = state.holders.as_ref() {
                fan_out_cross_refs(budget, cfg.alloc_workers, holders, bytes_counter).await;
            }
        }
    }
}

fn per_worker_budget(budget: u64, workers: usize, index: usize) -> u64 {
    let workers = workers.max(1) as u64;
    let share = budget / workers;
    if index == 0 { share + budget % workers } else { share }
}

async fn join_workers(mut set: JoinSet<()>) {
    while let Some(res) = set.join_next().await {
        if let Err(err) = res {
            // A failed worker just contributes less this iteration.
            warn!(%err, "allocation worker failed");
        }
    }
}

/// Transient garbage in large chunks, split across `workers` tasks that are
/// all joined before returning.
pub async fn fan_out_transient(budget: u64, workers: usize, bytes_counter: &Arc<AtomicU64>) {
    let mut set = JoinSet::new();
    for i in 0..workers.max(1) {
        let share = per_worker_budget(budget, workers, i);
        let counter = Arc::clone(bytes_counter);
        set.spawn(async move {
            let mut remaining = share;
            while remaining > 0 {
                let chunk = remaining.min(TRANSIENT_CHUNK_BYTES);
                let buf = alloc_touched(chunk as usize);
                std::hint::black_box(&buf);
                counter.fetch_add(chunk, Ordering::Relaxed);
                remaining -= chunk;
            }
        });
    }
    join_workers(set).await;
}

/// Transient garbage as many small buffers with uniformly random sizes,
/// stressing compaction and free-list fragmentation.
pub async fn fan_out_fragments(budget: u64, workers: usize, bytes_counter: &Arc<AtomicU64>) {
    let mut set = JoinSet::new();
    for i in 0..workers.max(1) {
        let share = per_worker_budget(budget, workers, i);
        let counter = Arc::clone(bytes_counter);
        set.spawn(async move {
            let mut rng = StdRng::from_entropy();
            let mut spent = 0u64;
            while spent < share {
                let len = rng.gen_range(FRAG_MIN_BYTES..=FRAG_MAX_BYTES);
                let buf = alloc_touched(len);
                std::hint::black_box(&buf);
                counter.fetch_add(len as u64, Ordering::Relaxed);
                spent += len as u64;
            }
        });
    }
    join_workers(set).await;
}

/// Medium-lived buffers pushed into the promotion queue; the caller drains
/// the queue into the live set after the join barrier.
pub async fn fan_out_promote(
    budget: u64,
    workers: usize,
    queue: &Arc<SegQueue<Box<[u8]>>>,
    bytes_counter: &Arc<AtomicU64>,
) {
    let mut set = JoinSet::new();
    for i in 0..workers.max(1) {
        let share = per_worker_budget(budget, workers, i);
        let queue = Arc::clone(queue);
        let counter = Arc::clone(bytes_counter);
        set.spawn(async move {
            let mut spent = 0u64;
            while spent < share {
                let len = PROMOTED_BUF_BYTES.min(share - spent).max(1);
                queue.push(alloc_touched(len as usize));
                counter.fetch_add(len, Ordering::Relaxed);
                spent += len;
            }
        });
    }
    join_workers(set).await;
}

/// Short-lived young buffers assigned into randomly chosen holders' slots.
pub async fn fan_out_cross_refs(
    budget: u64,
    workers: usize,
    holders: &Arc<RefHolderPool>,
    bytes_counter: &Arc<AtomicU64>,
) {
    if holders.is_empty() {
        return;
    }
    let mut set = JoinSet::new();
    for i in 0..workers.max(1) {
        let share = per_worker_budget(budget, workers, i);
        let holders = Arc::clone(holders);
        let counter = Arc::clone(bytes_counter);
        set.spawn(async move {
            let mut rng = StdRng::from_entropy();
            let mut spent = 0u64;
            while spent < share {
                let len = rng.gen_range(XREF_MIN_BYTES..=XREF_MAX_BYTES);
                let idx = rng.gen_range(0..holders.len());
                holders.assign(idx, alloc_touched(len));
                counter.fetch_add(len as u64, Ordering::Relaxed);
                spent += len as u64;
            }
        });
    }
    join_workers(set).await;
}
