//! Action processor: pure player intents.
//!
//! Every intent takes the current state by reference and returns either a
//! complete replacement state or a Rejection. An intent never mutates its
//! input, so a rejection always leaves the engine's state untouched.

use crate::{
    config::EngineConfig,
    error::{ActionResult, Rejection},
    production,
    state::{Currency, GameState, SettingKey, Upgrade},
    types::Millis,
};

/// Read-only inputs an intent may need beyond the state itself.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub config: &'a EngineConfig,
    pub now:    Millis,
}

fn spend(state: &mut GameState, currency: Currency, cost: f64) -> ActionResult<()> {
    let available = state.balance(currency);
    if available < cost {
        return Err(Rejection::InsufficientFunds { currency, needed: cost, available });
    }
    *state.balance_mut(currency) = available - cost;
    Ok(())
}

fn unknown(kind: &'static str, id: &str) -> Rejection {
    Rejection::UnknownId { kind, id: id.to_string() }
}

/// Manual click. Returns the amount earned.
pub fn click(state: &GameState, ctx: &ActionContext<'_>) -> ActionResult<(GameState, f64)> {
    let mut next = state.clone();
    let earned = production::click_power(state, ctx.config, ctx.now);
    next.earn(earned);
    next.stats.total_clicks += 1;
    Ok((next, earned))
}

/// Buy exactly one unit of a primary generator.
pub fn buy_generator(state: &GameState, id: &str) -> ActionResult<GameState> {
    let idx = state
        .generators
        .iter()
        .position(|g| g.id == id)
        .ok_or_else(|| unknown("generator", id))?;
    let cost = production::generator_cost(&state.generators[idx]);

    let mut next = state.clone();
    spend(&mut next, Currency::Primary, cost)?;
    next.generators[idx].count += 1;
    Ok(next)
}

/// Buy one unit of a secondary generator, paid in primary currency.
pub fn buy_secondary_generator(state: &GameState, id: &str) -> ActionResult<GameState> {
    let idx = state
        .secondary_generators
        .iter()
        .position(|g| g.id == id)
        .ok_or_else(|| unknown("secondary generator", id))?;
    let cost = production::secondary_generator_cost(&state.secondary_generators[idx]);

    let mut next = state.clone();
    spend(&mut next, Currency::Primary, cost)?;
    next.secondary_generators[idx].count += 1;
    Ok(next)
}

/// Best-effort bulk purchase: up to `quantity` single-unit attempts, each
/// starting from the previous result. Stops at the first failure and
/// reports how many units were bought. Fails only if none were.
pub fn repeat_purchase<F>(
    state: &GameState,
    quantity: u32,
    mut buy_one: F,
) -> ActionResult<(GameState, u32)>
where
    F: FnMut(&GameState) -> ActionResult<GameState>,
{
    if quantity == 0 {
        return Err(Rejection::InvalidQuantity);
    }
    let mut current = state.clone();
    let mut bought = 0;
    for _ in 0..quantity {
        match buy_one(&current) {
            Ok(next) => {
                current = next;
                bought += 1;
            }
            Err(reason) if bought == 0 => return Err(reason),
            Err(reason) => {
                log::debug!("bulk purchase stopped at {bought}/{quantity}: {reason}");
                break;
            }
        }
    }
    Ok((current, bought))
}

pub fn buy_generators(state: &GameState, id: &str, quantity: u32) -> ActionResult<(GameState, u32)> {
    repeat_purchase(state, quantity, |s| buy_generator(s, id))
}

pub fn buy_secondary_generators(
    state: &GameState,
    id: &str,
    quantity: u32,
) -> ActionResult<(GameState, u32)> {
    repeat_purchase(state, quantity, |s| buy_secondary_generator(s, id))
}

fn level_up(upgrades: &mut [Upgrade], id: &str) -> ActionResult<(usize, f64)> {
    let idx = upgrades
        .iter()
        .position(|u| u.id == id)
        .ok_or_else(|| unknown("upgrade", id))?;
    let upgrade = &mut upgrades[idx];
    let cost = production::upgrade_cost(upgrade);
    let next_level = upgrade
        .level
        .next()
        .ok_or_else(|| Rejection::AlreadyMaxed { id: id.to_string() })?;
    upgrade.level = next_level;
    upgrade.purchased = true;
    Ok((idx, cost))
}

/// Buy the next tier (or level) of a primary upgrade. Returns the new level.
pub fn buy_upgrade(state: &GameState, id: &str) -> ActionResult<(GameState, u32)> {
    let mut next = state.clone();
    let (idx, cost) = level_up(&mut next.upgrades, id)?;
    spend(&mut next, Currency::Primary, cost)?;
    let level = next.upgrades[idx].level.levels();
    Ok((next, level))
}

/// Secondary upgrades are paid in progression currency.
pub fn buy_secondary_upgrade(state: &GameState, id: &str) -> ActionResult<(GameState, u32)> {
    let mut next = state.clone();
    let (idx, cost) = level_up(&mut next.secondary_upgrades, id)?;
    spend(&mut next, Currency::Progression, cost)?;
    let level = next.secondary_upgrades[idx].level.levels();
    Ok((next, level))
}

pub fn unlock_theme(state: &GameState, id: &str) -> ActionResult<GameState> {
    let idx = state
        .themes
        .iter()
        .position(|t| t.id == id)
        .ok_or_else(|| unknown("theme", id))?;
    if state.themes[idx].unlocked {
        return Err(Rejection::AlreadyUnlocked { id: id.to_string() });
    }
    let mut next = state.clone();
    spend(&mut next, Currency::Premium, state.themes[idx].unlock_cost)?;
    next.themes[idx].unlocked = true;
    Ok(next)
}

/// Make `id` the single active theme.
pub fn activate_theme(state: &GameState, id: &str) -> ActionResult<GameState> {
    let theme = state
        .themes
        .iter()
        .find(|t| t.id == id)
        .ok_or_else(|| unknown("theme", id))?;
    if !theme.unlocked {
        return Err(Rejection::ThemeLocked { id: id.to_string() });
    }
    let mut next = state.clone();
    for t in &mut next.themes {
        t.active = t.id == id;
    }
    Ok(next)
}

pub fn deactivate_theme(state: &GameState) -> ActionResult<GameState> {
    let mut next = state.clone();
    for t in &mut next.themes {
        t.active = false;
    }
    Ok(next)
}

/// Prestige levels a reset would grant right now.
pub fn prestige_gain(state: &GameState, config: &EngineConfig) -> f64 {
    if config.prestige_threshold <= 0.0 {
        return 0.0;
    }
    (state.currency / config.prestige_threshold).sqrt().floor()
}

/// Partial reset. Adds the gain to the prestige counter and awards the
/// same amount of premium currency after the reset. Returns the gain.
pub fn prestige(state: &GameState, config: &EngineConfig) -> ActionResult<(GameState, f64)> {
    let gain = prestige_gain(state, config);
    if gain < 1.0 {
        return Err(Rejection::NothingToPrestige {
            needed: config.prestige_threshold,
            available: state.currency,
        });
    }
    let mut next = state.clone();
    next.prestige_reset();
    next.prestige_level += gain;
    next.premium_currency += gain;
    Ok((next, gain))
}

pub fn set_setting(state: &GameState, key: SettingKey, value: bool) -> ActionResult<GameState> {
    let mut next = state.clone();
    next.settings.set(key, value);
    Ok(next)
}
