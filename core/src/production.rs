//! Production model: pure functions of the current GameState.
//!
//! RULE: nothing in here mutates state or touches I/O. Identical inputs
//! always give identical rates, which offline catch-up and replay rely on.
//!
//! `now` is only used to decide which timed events are live.

use crate::{
    config::EngineConfig,
    state::{Effect, GameState, Generator, SecondaryGenerator, Upgrade},
    types::Millis,
};

/// `floor(base_cost * growth^owned)`.
pub fn scaled_cost(base_cost: f64, growth: f64, owned: u64) -> f64 {
    (base_cost * growth.powf(owned as f64)).floor()
}

pub fn generator_cost(g: &Generator) -> f64 {
    scaled_cost(g.base_cost, g.cost_growth, g.count)
}

pub fn secondary_generator_cost(g: &SecondaryGenerator) -> f64 {
    scaled_cost(g.base_cost, g.cost_growth, g.count)
}

/// Price of the next level of an upgrade.
pub fn upgrade_cost(u: &Upgrade) -> f64 {
    scaled_cost(u.base_cost, u.cost_growth, u.level.levels() as u64)
}

/// An upgrade applies its magnitude once per level it holds.
fn upgrade_factor(u: &Upgrade) -> f64 {
    u.effect.magnitude().powi(u.level.levels() as i32)
}

fn live_event_effects(state: &GameState, now: Millis) -> impl Iterator<Item = &Effect> {
    state
        .active_events
        .iter()
        .filter(move |e| e.is_live(now))
        .map(|e| &e.effect)
}

/// Product of every upgrade and live event factor whose effect passes `select`.
fn combined_factor<F>(state: &GameState, upgrades: &[Upgrade], now: Millis, select: F) -> f64
where
    F: Fn(&Effect) -> bool,
{
    let from_upgrades: f64 = upgrades
        .iter()
        .filter(|u| select(&u.effect))
        .map(upgrade_factor)
        .product();
    let from_events: f64 = live_event_effects(state, now)
        .filter(|e| select(e))
        .map(Effect::magnitude)
        .product();
    from_upgrades * from_events
}

/// Upgrades and events aimed at one generator.
pub fn generator_multiplier(state: &GameState, generator_id: &str, now: Millis) -> f64 {
    combined_factor(state, &state.upgrades, now, |e| {
        matches!(e, Effect::GeneratorMultiplier { target, .. } if target == generator_id)
    })
}

/// Global upgrades and events, scaled by the prestige bonus.
pub fn global_multiplier(state: &GameState, config: &EngineConfig, now: Millis) -> f64 {
    let prestige = 1.0 + state.prestige_level * config.prestige_bonus_per_level;
    combined_factor(state, &state.upgrades, now, |e| matches!(e, Effect::GlobalMultiplier { .. }))
        * prestige
}

pub fn theme_multiplier(state: &GameState) -> f64 {
    state.active_theme().map_or(1.0, |t| t.bonus_multiplier)
}

/// Output of one generator per second.
pub fn generator_output(state: &GameState, config: &EngineConfig, g: &Generator, now: Millis) -> f64 {
    g.base_rate
        * g.count as f64
        * generator_multiplier(state, &g.id, now)
        * global_multiplier(state, config, now)
        * theme_multiplier(state)
}

/// Gross primary production per second, before upkeep.
pub fn primary_output(state: &GameState, config: &EngineConfig, now: Millis) -> f64 {
    state
        .generators
        .iter()
        .map(|g| generator_output(state, config, g, now))
        .sum()
}

pub fn click_power(state: &GameState, config: &EngineConfig, now: Millis) -> f64 {
    config.base_click_power
        * combined_factor(state, &state.upgrades, now, |e| matches!(e, Effect::ClickMultiplier { .. }))
}

/// Progression currency produced per second by the secondary economy.
pub fn secondary_output(state: &GameState, now: Millis) -> f64 {
    let raw: f64 = state
        .secondary_generators
        .iter()
        .map(|g| g.base_rate * g.count as f64)
        .sum();
    raw * combined_factor(state, &state.secondary_upgrades, now, |e| {
        matches!(e, Effect::SecondaryMultiplier { .. })
    })
}

/// Primary currency consumed per second by owned secondary generators.
pub fn upkeep(state: &GameState, now: Millis) -> f64 {
    let raw: f64 = state
        .secondary_generators
        .iter()
        .map(|g| g.upkeep * g.count as f64)
        .sum();
    raw * combined_factor(state, &state.secondary_upgrades, now, |e| {
        matches!(e, Effect::UpkeepReduction { .. })
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetRates {
    /// Gross primary production before upkeep.
    pub gross_primary: f64,
    pub upkeep:        f64,
    /// Effective primary rate, never below the configured minimum.
    pub primary:       f64,
    pub progression:   f64,
}

pub fn net_rates(state: &GameState, config: &EngineConfig, now: Millis) -> NetRates {
    let gross_primary = primary_output(state, config, now);
    let upkeep = upkeep(state, now);
    NetRates {
        gross_primary,
        upkeep,
        primary: (gross_primary - upkeep).max(config.min_primary_rate),
        progression: secondary_output(state, now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_formula_floors() {
        assert_eq!(scaled_cost(10.0, 1.15, 5), 20.0);
        assert_eq!(scaled_cost(10.0, 1.15, 0), 10.0);
    }
}
