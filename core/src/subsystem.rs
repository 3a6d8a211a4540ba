//! Subsystem trait.
//!
//! RULE: every per-tick system implements SimSubsystem.
//! The engine calls update() on each registered subsystem in registration
//! order, every tick. Execution order is fixed and documented in engine.rs.

use crate::{
    config::{ContentCatalog, EngineConfig},
    error::SimResult,
    event::EngineEvent,
    rng::SubsystemRng,
    state::GameState,
    types::Millis,
};

/// What a subsystem knows about the tick it is running in.
pub struct TickContext<'a> {
    pub now:      Millis,
    /// `last_tick_timestamp` before this tick.
    pub previous: Millis,
    /// Real elapsed time being integrated, already clamped.
    pub elapsed:  Millis,
    pub config:   &'a EngineConfig,
    pub catalog:  &'a ContentCatalog,
}

/// The contract every subsystem must fulfill.
pub trait SimSubsystem: Send {
    /// Unique stable name for this subsystem.
    fn name(&self) -> &'static str;

    /// Called once per tick by the engine.
    ///
    /// - `ctx`:   timing and read-only configuration
    /// - `state`: the engine's state, mutable for the duration of the tick
    /// - `rng`:   this subsystem's deterministic stream
    ///
    /// Returns notifications to deliver once the tick completes.
    fn update(
        &mut self,
        ctx: &TickContext<'_>,
        state: &mut GameState,
        rng: &mut SubsystemRng,
    ) -> SimResult<Vec<EngineEvent>>;
}
