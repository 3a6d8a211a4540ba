use idlekeep_core::{
    config::{EngineConfig, SimConfig},
    production::{self, scaled_cost},
    state::{ActiveEvent, Effect, GameState, UpgradeLevel},
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn fresh() -> (GameState, EngineConfig) {
    let config = SimConfig::default_test();
    (GameState::new(&config.catalog, 0), config.engine)
}

fn idx(state: &GameState, id: &str) -> usize {
    state.generators.iter().position(|g| g.id == id).unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// cost = floor(base × growth^owned)
#[test]
fn cost_formula_matches_reference_values() {
    assert_eq!(scaled_cost(10.0, 1.15, 5), 20.0);
    assert_eq!(scaled_cost(15.0, 1.15, 0), 15.0);
    assert_eq!(scaled_cost(100.0, 2.0, 3), 800.0);
}

#[test]
fn generator_cost_grows_with_count() {
    let (mut state, _) = fresh();
    let farm = idx(&state, "farm");
    let first = production::generator_cost(&state.generators[farm]);
    state.generators[farm].count = 10;
    let later = production::generator_cost(&state.generators[farm]);
    assert_eq!(first, 100.0);
    assert!(later > first, "cost must grow: {first} → {later}");
}

#[test]
fn output_is_rate_times_count() {
    let (mut state, config) = fresh();
    let farm = idx(&state, "farm");
    state.generators[farm].count = 3;
    let out = production::primary_output(&state, &config, 0);
    assert!((out - 3.0).abs() < 1e-9, "3 farms at 1.0/s, got {out}");
}

#[test]
fn generator_upgrade_applies_once_per_tier() {
    let (mut state, config) = fresh();
    let farm = idx(&state, "farm");
    state.generators[farm].count = 1;
    let soil = state.upgrades.iter().position(|u| u.id == "better_soil").unwrap();
    state.upgrades[soil].level = UpgradeLevel::Tiered { tier: 2, max_tier: 2 };

    assert_eq!(production::generator_multiplier(&state, "farm", 0), 4.0);
    assert_eq!(production::generator_multiplier(&state, "cursor", 0), 1.0);
    assert!((production::primary_output(&state, &config, 0) - 4.0).abs() < 1e-9);
}

#[test]
fn live_events_multiply_until_their_end_time() {
    let (mut state, config) = fresh();
    state.active_events.push(ActiveEvent {
        id: "golden_hour".into(),
        effect: Effect::GlobalMultiplier { magnitude: 7.0 },
        end_time: 1_000,
        duration: 1_000,
    });
    assert_eq!(production::global_multiplier(&state, &config, 999), 7.0);
    assert_eq!(production::global_multiplier(&state, &config, 1_000), 1.0);
}

#[test]
fn different_event_ids_stack_multiplicatively() {
    let (mut state, config) = fresh();
    for (id, m) in [("a", 2.0), ("b", 3.0)] {
        state.active_events.push(ActiveEvent {
            id: id.into(),
            effect: Effect::GlobalMultiplier { magnitude: m },
            end_time: 10_000,
            duration: 10_000,
        });
    }
    assert_eq!(production::global_multiplier(&state, &config, 0), 6.0);
}

#[test]
fn prestige_level_raises_global_multiplier() {
    let (mut state, config) = fresh();
    state.prestige_level = 5.0;
    let m = production::global_multiplier(&state, &config, 0);
    assert!((m - 1.1).abs() < 1e-12, "5 levels × 0.02, got {m}");
}

#[test]
fn active_theme_adds_its_bonus() {
    let (mut state, config) = fresh();
    let i = idx(&state, "farm");
    state.generators[i].count = 10;
    let base = production::primary_output(&state, &config, 0);
    state.themes[0].unlocked = true;
    state.themes[0].active = true;
    let themed = production::primary_output(&state, &config, 0);
    assert!((themed - base * 1.05).abs() < 1e-9);
}

#[test]
fn upkeep_is_floored_at_minimum_rate() {
    let (mut state, config) = fresh();
    state.secondary_generators[0].count = 10; // 4.0/s upkeep, nothing produced
    let rates = production::net_rates(&state, &config, 0);
    assert!((rates.upkeep - 4.0).abs() < 1e-9);
    assert_eq!(rates.primary, config.min_primary_rate);
    assert!((rates.progression - 5.0).abs() < 1e-9);
}

#[test]
fn upkeep_reduction_scales_upkeep() {
    let (mut state, config) = fresh();
    state.secondary_generators[0].count = 10;
    let lean = state.secondary_upgrades.iter().position(|u| u.id == "lean_labs").unwrap();
    state.secondary_upgrades[lean].level = UpgradeLevel::Tiered { tier: 1, max_tier: 2 };
    let rates = production::net_rates(&state, &config, 0);
    assert!((rates.upkeep - 2.0).abs() < 1e-9);
}

#[test]
fn click_power_uses_click_upgrades_and_events() {
    let (mut state, config) = fresh();
    assert_eq!(production::click_power(&state, &config, 0), 1.0);
    state.upgrades[0].level = UpgradeLevel::Tiered { tier: 1, max_tier: 3 };
    assert_eq!(production::click_power(&state, &config, 0), 2.0);
    state.active_events.push(ActiveEvent {
        id: "click_frenzy".into(),
        effect: Effect::ClickMultiplier { magnitude: 777.0 },
        end_time: 13_000,
        duration: 13_000,
    });
    assert_eq!(production::click_power(&state, &config, 0), 1554.0);
}

#[test]
fn rates_are_pure() {
    let (mut state, config) = fresh();
    let i = idx(&state, "factory");
    state.generators[i].count = 2;
    let before = state.clone();
    let a = production::net_rates(&state, &config, 500);
    let b = production::net_rates(&state, &config, 500);
    assert_eq!(a, b);
    assert_eq!(state, before);
}
