use idlekeep_core::{
    config::SimConfig,
    engine::Engine,
    error::Rejection,
    event::{EngineEvent, EventKind},
    event_subsystem,
};
use std::sync::{Arc, Mutex};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn make_engine(chance: f64) -> Engine {
    let mut config = SimConfig::default_test();
    config.engine.event_activation_chance = chance;
    Engine::fresh(config, 0)
}

fn record(engine: &mut Engine, kind: EventKind) -> Arc<Mutex<Vec<EngineEvent>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    engine.on(kind, move |e| sink.lock().unwrap().push(e.clone()));
    log
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// An event is live strictly before its end time and gone at it.
#[test]
fn expiry_happens_exactly_at_end_time() {
    let mut engine = make_engine(0.0);
    engine.start_timed_event("golden_hour", 0).unwrap();
    let end = engine.state().active_events[0].end_time;
    assert_eq!(end, 77_000);

    engine.tick(end - 1).unwrap();
    assert_eq!(engine.state().active_events.len(), 1);

    let report = engine.tick(end).unwrap();
    assert!(engine.state().active_events.is_empty());
    assert!(report
        .events
        .contains(&EngineEvent::TimedEventExpired { id: "golden_hour".into(), end_time: end }));
}

/// A suspended engine sweeps everything that ended while it was away.
#[test]
fn long_gap_sweeps_all_expired() {
    let mut engine = make_engine(0.0);
    engine.start_timed_event("golden_hour", 0).unwrap();
    engine.start_timed_event("click_frenzy", 0).unwrap();
    let expired = record(&mut engine, EventKind::EventExpired);

    engine.tick(60 * 60 * 1000).unwrap();
    assert!(engine.state().active_events.is_empty());
    assert_eq!(expired.lock().unwrap().len(), 2);
}

#[test]
fn same_id_refreshes_instead_of_duplicating() {
    let mut engine = make_engine(0.0);
    let started = record(&mut engine, EventKind::EventStarted);

    engine.start_timed_event("golden_hour", 0).unwrap();
    engine.start_timed_event("golden_hour", 10_000).unwrap();

    let active = &engine.state().active_events;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].end_time, 87_000);

    let started = started.lock().unwrap();
    assert_eq!(started.len(), 2);
    assert!(matches!(started[1], EngineEvent::TimedEventStarted { refreshed: true, end_time: 87_000, .. }));
}

#[test]
fn refresh_never_shortens() {
    let config = SimConfig::default_test();
    let mut state = idlekeep_core::state::GameState::new(&config.catalog, 0);
    let long = config.catalog.events[0].clone();
    let mut short = long.clone();
    short.duration_ms = 1_000;

    event_subsystem::activate(&mut state, &long, 0);
    event_subsystem::activate(&mut state, &short, 5_000);
    assert_eq!(state.active_events[0].end_time, 77_000);
}

#[test]
fn unknown_event_is_rejected() {
    let mut engine = make_engine(0.0);
    assert!(engine.start_timed_event("meteor_shower", 0).is_err());
}

/// Starting an event is an accepted change like any action: a state that
/// fails validation is left exactly as it was.
#[test]
fn started_event_is_checked_against_invariants() {
    let mut engine = make_engine(0.0);
    let mut broken = engine.snapshot();
    broken.currency = -5.0;
    engine.replace_state(broken.clone());
    let started = record(&mut engine, EventKind::EventStarted);

    let result = engine.start_timed_event("golden_hour", 0);
    assert!(matches!(result, Err(Rejection::InvariantViolated(_))));
    assert_eq!(engine.state(), &broken);
    assert!(started.lock().unwrap().is_empty());
}

/// Rolls run on their own cadence: none before the interval has passed,
/// and at most one per tick no matter how long the tick was.
#[test]
fn rolls_follow_their_own_cadence() {
    let mut engine = make_engine(1.0);
    let started = record(&mut engine, EventKind::EventStarted);

    let mut now = 0;
    for _ in 0..119 {
        now += 250;
        engine.tick(now).unwrap();
    }
    assert!(started.lock().unwrap().is_empty(), "no roll before 30s");

    engine.tick(now + 250).unwrap();
    assert_eq!(started.lock().unwrap().len(), 1);

    // Ten intervals in one tick still give a single roll.
    engine.tick(now + 250 + 300_000).unwrap();
    assert_eq!(started.lock().unwrap().len(), 2);
}

#[test]
fn zero_chance_never_activates() {
    let mut engine = make_engine(0.0);
    let mut now = 0;
    for _ in 0..100 {
        now += 30_000;
        engine.tick(now).unwrap();
    }
    assert!(engine.state().active_events.is_empty());
}

#[test]
fn live_event_boosts_tick_income() {
    let mut plain = make_engine(0.0);
    let mut boosted = make_engine(0.0);
    for engine in [&mut plain, &mut boosted] {
        let mut s = engine.snapshot();
        s.generators[1].count = 10;
        engine.replace_state(s);
    }
    boosted.start_timed_event("golden_hour", 0).unwrap();

    let a = plain.tick(1_000).unwrap().earned;
    let b = boosted.tick(1_000).unwrap().earned;
    assert!((b - a * 7.0).abs() < 1e-9, "expected ×7: {a} vs {b}");
}
