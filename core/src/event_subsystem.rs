//! Event scheduler: starts timed effects on a weighted roll and sweeps
//! the expired ones.
//!
//! Expiry is decided purely by absolute end time, so an engine that was
//! suspended for an hour sweeps everything that ended in the meantime on
//! its next tick instead of counting down stale timers.

use crate::{
    config::EventDefinition,
    error::SimResult,
    event::EngineEvent,
    rng::SubsystemRng,
    state::{ActiveEvent, GameState},
    subsystem::{SimSubsystem, TickContext},
    types::Millis,
};

#[derive(Debug, Default)]
pub struct EventSubsystem {
    /// Simulated time since the last roll.
    since_roll: Millis,
}

impl EventSubsystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn roll(
        &self,
        ctx: &TickContext<'_>,
        state: &mut GameState,
        rng: &mut SubsystemRng,
    ) -> Option<EngineEvent> {
        let table = &ctx.catalog.events;
        if table.is_empty() || !rng.chance(ctx.config.event_activation_chance) {
            return None;
        }
        let weights: Vec<f64> = table.iter().map(|d| d.weight).collect();
        let def = &table[rng.weighted_index(&weights)?];
        Some(activate(state, def, ctx.now))
    }
}

impl SimSubsystem for EventSubsystem {
    fn name(&self) -> &'static str { "events" }

    fn update(
        &mut self,
        ctx: &TickContext<'_>,
        state: &mut GameState,
        rng: &mut SubsystemRng,
    ) -> SimResult<Vec<EngineEvent>> {
        let mut events: Vec<EngineEvent> = sweep_expired(state, ctx.now)
            .into_iter()
            .map(|e| EngineEvent::TimedEventExpired { id: e.id, end_time: e.end_time })
            .collect();

        // One roll at most per tick; a long gap does not buy extra rolls.
        let interval = ctx.config.event_roll_interval_ms;
        self.since_roll += ctx.elapsed;
        if interval > 0 && self.since_roll >= interval {
            self.since_roll %= interval;
            if let Some(started) = self.roll(ctx, state, rng) {
                events.push(started);
            }
        }
        Ok(events)
    }
}

/// Remove every event whose end time is at or before `now`.
pub fn sweep_expired(state: &mut GameState, now: Millis) -> Vec<ActiveEvent> {
    let (expired, live): (Vec<_>, Vec<_>) = std::mem::take(&mut state.active_events)
        .into_iter()
        .partition(|e| !e.is_live(now));
    state.active_events = live;
    for e in &expired {
        log::debug!("now={now} events: '{}' expired (end_time={})", e.id, e.end_time);
    }
    expired
}

/// Start `def` at `now`. Events of different ids stack; an id that is
/// already live has its end time pushed out instead of being duplicated.
pub fn activate(state: &mut GameState, def: &EventDefinition, now: Millis) -> EngineEvent {
    let end_time = now + def.duration_ms;

    if let Some(existing) = state.active_events.iter_mut().find(|e| e.id == def.id) {
        existing.end_time = existing.end_time.max(end_time);
        existing.duration = def.duration_ms;
        log::debug!("now={now} events: '{}' refreshed until {}", def.id, existing.end_time);
        return EngineEvent::TimedEventStarted {
            id: def.id.clone(),
            end_time: existing.end_time,
            refreshed: true,
        };
    }

    state.active_events.push(ActiveEvent {
        id: def.id.clone(),
        effect: def.effect.clone(),
        end_time,
        duration: def.duration_ms,
    });
    log::info!("now={now} events: '{}' started until {end_time}", def.id);
    EngineEvent::TimedEventStarted { id: def.id.clone(), end_time, refreshed: false }
}
