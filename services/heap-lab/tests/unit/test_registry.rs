//! Unit tests for the scenario registry and allocation-mode model

use heap_lab::registry::{OFF_MODE, ScenarioRegistry, ScenarioType};
use heaplab_common::{BYTES_PER_MB, PressureError};
use pretty_assertions::assert_eq;
use rstest::*;

#[rstest]
fn registry_enumerates_all_six_modes() {
    let registry = ScenarioRegistry::new();
    let modes = registry.modes();
    assert_eq!(modes.len(), 6);
    assert_eq!(modes[0], OFF_MODE);
    assert_eq!(
        registry.names(),
        vec![
            "OFF",
            "STEADY_LOAD",
            "GROWING_HEAP",
            "PROMOTION_STORM",
            "FRAGMENTATION",
            "CROSS_GEN_REFS",
        ]
    );
}

#[rstest]
fn off_mode_has_zero_rate_and_live_set() {
    assert_eq!(OFF_MODE.scenario, ScenarioType::Off);
    assert_eq!(OFF_MODE.rate_mb_per_sec, 0);
    assert_eq!(OFF_MODE.live_set_mb, 0);
    assert!(OFF_MODE.is_off());
}

#[rstest]
#[case("STEADY_LOAD")]
#[case("steady_load")]
#[case("Steady_Load")]
fn lookup_is_case_insensitive(#[case] name: &str) {
    let registry = ScenarioRegistry::new();
    let mode = registry.lookup(name).expect("known scenario");
    assert_eq!(mode.scenario, ScenarioType::Steady);
    assert_eq!(mode.name, "STEADY_LOAD");
}

#[rstest]
fn lookup_rejects_unknown_names_and_reports_valid_ones() {
    let registry = ScenarioRegistry::new();
    let err = registry.lookup("TURBO_MODE").unwrap_err();
    match &err {
        PressureError::UnknownScenario { requested, valid } => {
            assert_eq!(requested, "TURBO_MODE");
            assert_eq!(valid.len(), 6);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let msg = err.to_string();
    assert!(msg.contains("TURBO_MODE"));
    assert!(msg.contains("STEADY_LOAD"));
}

#[rstest]
fn bytes_per_second_is_the_deterministic_rate_formula() {
    let registry = ScenarioRegistry::new();
    for mode in registry.modes() {
        assert_eq!(mode.bytes_per_second(), mode.rate_mb_per_sec * BYTES_PER_MB);
        // 10 iterations per second at the reference 100 ms cadence
        assert_eq!(mode.bytes_per_iteration(100), mode.bytes_per_second() / 10);
    }
}

#[rstest]
fn steady_load_parameters() {
    let registry = ScenarioRegistry::new();
    let mode = registry.lookup("STEADY_LOAD").expect("known scenario");
    assert_eq!(mode.rate_mb_per_sec, 200);
    assert_eq!(mode.live_set_mb, 512);
}

#[rstest]
fn growing_heap_ramp_parameters() {
    let registry = ScenarioRegistry::new();
    let mode = registry.lookup("GROWING_HEAP").expect("known scenario");
    assert_eq!(mode.scenario, ScenarioType::Growing);
    assert_eq!(mode.growth_start_mb, 100);
    assert_eq!(mode.live_set_mb, 2048);
    assert_eq!(mode.growth_duration_secs, 60);
}
