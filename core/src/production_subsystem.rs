use crate::{
    error::SimResult,
    event::EngineEvent,
    production,
    rng::SubsystemRng,
    state::GameState,
    subsystem::{SimSubsystem, TickContext},
    types::MS_PER_SECOND,
};

/// Integrates the production model over each tick's real elapsed time.
///
/// Rates are evaluated once, at the start of the interval. A throttled or
/// suspended host that skips firings simply hands us a longer interval.
#[derive(Debug, Default)]
pub struct ProductionSubsystem;

impl ProductionSubsystem {
    pub fn new() -> Self {
        Self
    }
}

impl SimSubsystem for ProductionSubsystem {
    fn name(&self) -> &'static str { "production" }

    fn update(
        &mut self,
        ctx: &TickContext<'_>,
        state: &mut GameState,
        _rng: &mut SubsystemRng,
    ) -> SimResult<Vec<EngineEvent>> {
        if ctx.elapsed <= 0 {
            return Ok(vec![]);
        }

        let rates = production::net_rates(state, ctx.config, ctx.previous);
        let seconds = ctx.elapsed as f64 / MS_PER_SECOND;

        state.earn(rates.primary * seconds);
        state.progression_currency += rates.progression * seconds;

        log::trace!(
            "now={} production: elapsed={}ms primary={:.3}/s progression={:.3}/s upkeep={:.3}/s",
            ctx.now,
            ctx.elapsed,
            rates.primary,
            rates.progression,
            rates.upkeep
        );
        Ok(vec![])
    }
}
