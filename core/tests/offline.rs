use idlekeep_core::{
    config::{SimConfig, HOUR_MS},
    engine::Engine,
    event::{EngineEvent, EventKind},
    offline::{self, OfflineReport},
    state::{GameState, Generator},
};
use std::sync::{Arc, Mutex};

// ── Helpers ──────────────────────────────────────────────────────────────────

/// A state producing exactly 100 currency per second, last ticked at 0.
fn hundred_per_second() -> (GameState, SimConfig) {
    let config = SimConfig::default_test();
    let mut state = GameState::new(&config.catalog, 0);
    state.generators = vec![Generator {
        id: "mint".into(),
        count: 1,
        base_rate: 100.0,
        base_cost: 10.0,
        cost_growth: 1.15,
    }];
    (state, config)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn one_hour_at_100_per_second() {
    let (state, config) = hundred_per_second();
    let report = offline::calculate(&state, &config.engine, HOUR_MS);
    assert_eq!(
        report,
        OfflineReport {
            time_away: HOUR_MS,
            time_processed: HOUR_MS,
            gained: 360_000.0,
            was_capped: false,
        }
    );
}

#[test]
fn hundred_hours_is_capped_at_72() {
    let (state, config) = hundred_per_second();
    let report = offline::calculate(&state, &config.engine, 100 * HOUR_MS);
    assert_eq!(report.time_away, 100 * HOUR_MS);
    assert_eq!(report.time_processed, 72 * HOUR_MS);
    assert_eq!(report.gained, 100.0 * 72.0 * 3600.0);
    assert!(report.was_capped);
}

#[test]
fn clock_behind_save_grants_nothing() {
    let report = offline::catch_up(100.0, -5_000, 72 * HOUR_MS);
    assert_eq!(report.time_processed, 0);
    assert_eq!(report.gained, 0.0);
    assert!(!report.was_capped);
}

#[test]
fn engine_credits_and_reports_offline_progress() {
    let (state, config) = hundred_per_second();
    let mut engine = Engine::new(config, state);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    engine.on(EventKind::OfflineProgress, move |e| sink.lock().unwrap().push(e.clone()));

    let report = engine.apply_offline_progress(HOUR_MS).unwrap();
    assert_eq!(report.gained, 360_000.0);
    assert_eq!(engine.state().currency, 360_000.0);
    assert_eq!(engine.state().stats.total_earned, 360_000.0);
    assert_eq!(engine.state().last_tick_timestamp, HOUR_MS);
    assert_eq!(engine.pending_offline(), Some(&report));
    assert_eq!(seen.lock().unwrap().as_slice(), &[EngineEvent::OfflineProgress { report }]);

    assert_eq!(engine.acknowledge_offline(), Some(report));
    assert!(engine.pending_offline().is_none());

    // The first tick afterwards integrates only from the catch-up point.
    let tick = engine.tick(HOUR_MS + 1_000).unwrap();
    assert_eq!(tick.elapsed, 1_000);
}

#[test]
fn disabled_setting_only_advances_timestamp() {
    let (mut state, config) = hundred_per_second();
    state.settings.offline_progress = false;
    let mut engine = Engine::new(config, state);

    assert!(engine.apply_offline_progress(HOUR_MS).is_none());
    assert_eq!(engine.state().currency, 0.0);
    assert_eq!(engine.state().last_tick_timestamp, HOUR_MS);
}

/// Catch-up uses the rate at the moment of the last tick: an event that
/// was live then counts for the whole absence.
#[test]
fn single_rate_uses_state_as_loaded() {
    let (state, config) = hundred_per_second();
    let mut engine = Engine::new(config, state);
    engine.start_timed_event("golden_hour", 0).unwrap();

    let report = engine.apply_offline_progress(HOUR_MS).unwrap();
    assert_eq!(report.gained, 7.0 * 360_000.0);
}

/// Tick integration clamps elapsed time to the same cap.
#[test]
fn tick_elapsed_is_clamped() {
    let (state, config) = hundred_per_second();
    let mut engine = Engine::new(config, state);

    let report = engine.tick(100 * HOUR_MS).unwrap();
    assert_eq!(report.elapsed, 72 * HOUR_MS);

    // A clock rewind integrates nothing and never subtracts.
    let before = engine.state().currency;
    let report = engine.tick(50 * HOUR_MS).unwrap();
    assert_eq!(report.elapsed, 0);
    assert_eq!(engine.state().currency, before);
}

/// A negative cap from a hand-edited config integrates nothing instead of
/// taking the tick down.
#[test]
fn negative_cap_ticks_without_elapsed_time() {
    let (state, mut config) = hundred_per_second();
    config.engine.offline_cap_ms = -1;
    let mut engine = Engine::new(config, state);

    let report = engine.tick(250).unwrap();
    assert_eq!(report.elapsed, 0);
    assert_eq!(engine.state().last_tick_timestamp, 250);
}
