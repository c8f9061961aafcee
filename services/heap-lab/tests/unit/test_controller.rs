//! Unit tests for the scenario controller: lifecycle, generation fencing,
//! and cleanup on every mode switch

use std::time::Duration;

use heap_lab::controller::ScenarioController;
use heap_lab::registry::{AllocationMode, ScenarioType};
use heaplab_common::{BYTES_PER_MB, EngineConfig, PressureError};
use pretty_assertions::assert_eq;

fn fast_config() -> EngineConfig {
    EngineConfig {
        iteration_ms: 20,
        alloc_workers: 4,
        rate_report_secs: 60,
    }
}

fn tiny_mode(scenario: ScenarioType, live_mb: u64) -> AllocationMode {
    AllocationMode {
        scenario,
        name: "TEST_TINY",
        rate_mb_per_sec: 1,
        live_set_mb: live_mb,
        growth_start_mb: 0,
        growth_duration_secs: 0,
        description: "test fixture",
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn controller_starts_off_and_not_running() {
    let controller = ScenarioController::new(fast_config());
    assert_eq!(controller.current_mode().name, "OFF");
    assert!(!controller.is_running());
    assert_eq!(controller.live_set_bytes(), 0);
    assert_eq!(controller.generation(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn set_mode_by_name_is_case_insensitive_and_starts_the_loop() {
    let controller = ScenarioController::new(fast_config());
    let mode = controller
        .set_mode_by_name("cross_gen_refs")
        .expect("known scenario");
    assert_eq!(mode.name, "CROSS_GEN_REFS");
    assert!(controller.is_running());
    assert!(controller.started_at_epoch_ms() > 0);
    controller.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unknown_scenario_is_rejected_without_side_effects() {
    let controller = ScenarioController::new(fast_config());
    let err = controller.set_mode_by_name("NOT_A_SCENARIO").unwrap_err();
    assert!(matches!(err, PressureError::UnknownScenario { .. }));
    assert!(!controller.is_running());
    assert_eq!(controller.current_mode().name, "OFF");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn setting_the_same_mode_is_a_no_op() {
    let controller = ScenarioController::new(fast_config());
    let mode = tiny_mode(ScenarioType::Steady, 2);
    controller.set_mode(mode);
    let generation = controller.generation();
    controller.set_mode(mode);
    assert_eq!(controller.generation(), generation);
    controller.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn steady_loop_converges_on_the_live_set_target() {
    let controller = ScenarioController::new(fast_config());
    controller.set_mode(tiny_mode(ScenarioType::Steady, 4));

    // A few cadence ticks are enough to converge.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(controller.live_set_bytes(), 4 * BYTES_PER_MB);
    controller.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn switching_off_empties_live_structures_immediately() {
    let controller = ScenarioController::new(fast_config());
    controller.set_mode(tiny_mode(ScenarioType::Steady, 4));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(controller.live_set_bytes() > 0);

    controller.stop();
    // The gauge is reset inside the switch, before any new allocation.
    assert_eq!(controller.live_set_bytes(), 0);
    assert!(!controller.is_running());
    assert_eq!(controller.current_mode().name, "OFF");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_switch_bumps_the_generation_and_resets_gauges() {
    let controller = ScenarioController::new(fast_config());
    controller.set_mode(tiny_mode(ScenarioType::Steady, 2));
    assert_eq!(controller.generation(), 1);
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Scenario-to-scenario switch takes the same cleanup path as OFF. A
    // zero live-set target keeps the gauge at zero after the reset.
    controller.set_mode(tiny_mode(ScenarioType::Fragmentation, 0));
    assert_eq!(controller.generation(), 2);
    assert_eq!(controller.live_set_bytes(), 0);
    assert!(controller.is_running());

    controller.stop();
    assert_eq!(controller.generation(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn allocated_bytes_accumulate_and_reset_on_switch() {
    let controller = ScenarioController::new(fast_config());
    controller.set_mode(tiny_mode(ScenarioType::Steady, 1));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(controller.allocated_bytes_total() > 0);

    controller.stop();
    assert_eq!(controller.allocated_bytes_total(), 0);
    // No stale tick revives the counter after the switch.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(controller.allocated_bytes_total(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn allocated_total_keeps_counting_across_rate_reports() {
    let controller = ScenarioController::new(EngineConfig {
        iteration_ms: 20,
        alloc_workers: 4,
        // Swap the windowed rate counter on every tick; the all-time
        // counter must be unaffected.
        rate_report_secs: 0,
    });
    controller.set_mode(tiny_mode(ScenarioType::Steady, 1));
    tokio::time::sleep(Duration::from_millis(200)).await;
    let first = controller.allocated_bytes_total();
    assert!(first > 0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(controller.allocated_bytes_total() > first);
    controller.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stop_hammering_never_leaves_a_stale_gauge() {
    let controller = ScenarioController::new(fast_config());
    for _ in 0..20 {
        controller.set_mode(tiny_mode(ScenarioType::Steady, 2));
        tokio::time::sleep(Duration::from_millis(5)).await;
        controller.stop();
        assert_eq!(controller.live_set_bytes(), 0);
        // Any tick in flight during the switch must reach its publish
        // checkpoint, observe the stale generation, and publish nothing.
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(controller.live_set_bytes(), 0);
        assert_eq!(controller.allocated_bytes_total(), 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn status_and_list_modes_report_registry_data() {
    let controller = ScenarioController::new(fast_config());
    let status = controller.status();
    assert_eq!(status.mode, "OFF");
    assert!(!status.running);
    assert_eq!(status.rate_mb_per_sec, 0);

    let modes = controller.list_modes();
    assert_eq!(modes.len(), 6);
    assert!(modes.iter().any(|m| m.name == "PROMOTION_STORM"));

    controller.set_mode_by_name("STEADY_LOAD").expect("known");
    let status = controller.status();
    assert_eq!(status.mode, "STEADY_LOAD");
    assert!(status.running);
    assert_eq!(status.rate_mb_per_sec, 200);
    controller.stop();
}
