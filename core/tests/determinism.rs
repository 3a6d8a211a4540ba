//! THE MOST IMPORTANT TEST IN THE PROJECT.
//!
//! Two engines, same seed, same operations.
//! They must produce identical state trajectories and notifications.
//! Any divergence is a blocker. Do not merge until fixed.

use idlekeep_core::{
    command::PlayerCommand,
    config::SimConfig,
    engine::Engine,
    event::EngineEvent,
};

fn build_engine(seed: u64) -> Engine {
    let mut config = SimConfig::default_test();
    config.engine.seed = Some(seed);
    config.engine.event_activation_chance = 0.5;
    config.engine.event_roll_interval_ms = 5_000;
    Engine::fresh(config, 0)
}

/// Drive an engine through a fixed script and collect every state (as JSON)
/// and notification along the way.
fn run_script(engine: &mut Engine, ticks: u32) -> (Vec<String>, Vec<EngineEvent>) {
    let mut states = Vec::new();
    let mut events = Vec::new();
    let mut now = 0;
    for i in 0..ticks {
        for _ in 0..3 {
            let _ = engine.execute(&PlayerCommand::Click, now);
        }
        if i % 7 == 0 {
            let _ = engine.execute(&PlayerCommand::BuyGenerator { id: "cursor".into(), quantity: 2 }, now);
        }
        now += 1_000;
        let report = engine.tick(now).expect("tick");
        events.extend(report.events);
        states.push(serde_json::to_string(engine.state()).expect("serialize"));
    }
    (states, events)
}

#[test]
fn same_seed_produces_identical_trajectories() {
    const SEED: u64 = 0xDEAD_BEEF_CAFE_1234;
    const TICKS: u32 = 600; // ten minutes of play

    let mut engine_a = build_engine(SEED);
    let mut engine_b = build_engine(SEED);

    let (states_a, events_a) = run_script(&mut engine_a, TICKS);
    let (states_b, events_b) = run_script(&mut engine_b, TICKS);

    assert_eq!(events_a, events_b, "notification logs diverged");
    for (i, (a, b)) in states_a.iter().zip(states_b.iter()).enumerate() {
        assert_eq!(a, b, "State diverged at tick {i}:\n  A: {a}\n  B: {b}");
    }
    assert!(!events_a.is_empty(), "no timed events fired; the roll is not being exercised");
}

#[test]
fn different_seeds_produce_different_rolls() {
    let mut engine_a = build_engine(42);
    let mut engine_b = build_engine(99);

    let (_, events_a) = run_script(&mut engine_a, 600);
    let (_, events_b) = run_script(&mut engine_b, 600);

    // With different seeds the event rolls should diverge.
    // This test verifies that seed differences are actually observable.
    assert_ne!(events_a, events_b, "Different seeds produced identical rolls; seed is not being used");
}
