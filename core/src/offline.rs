//! Offline catch-up: the one-time grant for time spent closed.
//!
//! Runs once at load, before the scheduler starts. Uses the rate implied by
//! the state exactly as loaded (events are judged live at the moment of the
//! last tick); the rate is not re-integrated across the absence.

use crate::{
    config::EngineConfig,
    production,
    state::GameState,
    types::{Millis, MS_PER_SECOND},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OfflineReport {
    pub time_away:      Millis,
    pub time_processed: Millis,
    pub gained:         f64,
    pub was_capped:     bool,
}

/// Grant for `time_away` at a fixed `rate` per second, capped at `cap`.
pub fn catch_up(rate: f64, time_away: Millis, cap: Millis) -> OfflineReport {
    let time_away = time_away.max(0);
    let time_processed = time_away.min(cap);
    OfflineReport {
        time_away,
        time_processed,
        gained: rate * (time_processed as f64 / MS_PER_SECOND),
        was_capped: time_away > cap,
    }
}

/// Catch-up for `state` if the player returns at `now`.
pub fn calculate(state: &GameState, config: &EngineConfig, now: Millis) -> OfflineReport {
    let loaded_at = state.last_tick_timestamp;
    let rate = production::net_rates(state, config, loaded_at).primary;
    catch_up(rate, now - loaded_at, config.offline_cap_ms)
}
