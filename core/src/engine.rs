//! The simulation engine: owns the GameState and everything that may
//! change it.
//!
//! EXECUTION ORDER per tick (fixed, documented, never reordered):
//!   1. Production subsystem  (integrate real elapsed time)
//!   2. Event subsystem       (sweep expired, periodic roll)
//!
//! RULES:
//!   - Only execute_action/execute, start_timed_event and tick() replace or
//!     mutate the state outside of load-time setup.
//!   - Each tick and each action runs to completion before the next starts;
//!     callers share an Engine behind a single lock (see scheduler.rs).
//!   - All randomness flows through the RngBank.
//!   - Subscribers are told after every accepted change.

use crate::{
    action::ActionContext,
    command::{CommandReceipt, PlayerCommand},
    config::{ContentCatalog, EngineConfig, SimConfig},
    error::{ActionResult, Rejection, SimResult},
    event::{EngineEvent, EventKind},
    event_subsystem::{self, EventSubsystem},
    observer::{Observers, SubscriptionId},
    offline::{self, OfflineReport},
    production_subsystem::ProductionSubsystem,
    rng::{RngBank, SubsystemRng, SubsystemSlot},
    state::GameState,
    subsystem::{SimSubsystem, TickContext},
    types::Millis,
};

type StateListener = dyn Fn(&GameState) + Send;
type EventHandler = dyn Fn(&EngineEvent) + Send;

/// Summary of one integration step.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub now:     Millis,
    pub elapsed: Millis,
    pub earned:  f64,
    pub events:  Vec<EngineEvent>,
}

pub struct Engine {
    config:          EngineConfig,
    catalog:         ContentCatalog,
    state:           GameState,
    rng_bank:        RngBank,
    subsystems:      Vec<(Box<dyn SimSubsystem>, SubsystemRng)>,
    listeners:       Observers<StateListener>,
    handlers:        Observers<EventHandler>,
    pending_offline: Option<OfflineReport>,
    ticks:           u64,
}

impl Engine {
    /// Build an engine around `state` with every subsystem registered.
    /// Catalog entries the state does not know yet are appended.
    pub fn new(config: SimConfig, mut state: GameState) -> Self {
        let SimConfig { engine: config, catalog } = config;
        let added = state.sync_with_catalog(&catalog);
        if added > 0 {
            log::info!("engine: added {added} catalog entries missing from the loaded state");
        }

        let seed = config.seed.unwrap_or_else(|| chrono::Utc::now().timestamp_millis() as u64);
        let mut engine = Self {
            config,
            catalog,
            state,
            rng_bank:        RngBank::new(seed),
            subsystems:      Vec::new(),
            listeners:       Observers::new(),
            handlers:        Observers::new(),
            pending_offline: None,
            ticks:           0,
        };

        // EXECUTION ORDER (fixed, never reordered).
        engine.register(SubsystemSlot::Production, Box::new(ProductionSubsystem::new()));
        engine.register(SubsystemSlot::Events, Box::new(EventSubsystem::new()));
        engine
    }

    /// A brand-new run starting at `now`.
    pub fn fresh(config: SimConfig, now: Millis) -> Self {
        let state = GameState::new(&config.catalog, now);
        Self::new(config, state)
    }

    /// Register a subsystem. Call in the documented execution order.
    pub fn register(&mut self, slot: SubsystemSlot, subsystem: Box<dyn SimSubsystem>) {
        let rng = self.rng_bank.for_subsystem(slot);
        self.subsystems.push((subsystem, rng));
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Owned copy for consumers that outlive the borrow (saves, UIs).
    pub fn snapshot(&self) -> GameState {
        self.state.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ContentCatalog {
        &self.catalog
    }

    pub fn seed(&self) -> u64 {
        self.rng_bank.master_seed()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    // ── Observation ────────────────────────────────────────────

    /// Called with the new state after every accepted change.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&GameState) + Send + 'static,
    {
        self.listeners.subscribe(Box::new(listener))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Called for every notification of `kind`.
    pub fn on<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&EngineEvent) + Send + 'static,
    {
        self.handlers.subscribe(Box::new(move |event: &EngineEvent| {
            if event.kind() == kind {
                handler(event);
            }
        }))
    }

    pub fn off(&mut self, id: SubscriptionId) -> bool {
        self.handlers.unsubscribe(id)
    }

    /// Deliver a notification to every handler registered for its kind.
    pub fn emit(&self, event: &EngineEvent) {
        self.handlers.iter().for_each(|h| h(event));
    }

    fn notify(&self) {
        self.listeners.iter().for_each(|l| l(&self.state));
    }

    // ── Actions ────────────────────────────────────────────────

    /// Apply a pure intent. On success the returned state replaces the
    /// current one wholesale and subscribers are notified; on failure
    /// nothing changes and the reason is handed back.
    pub fn execute_action<T, F>(&mut self, intent: F) -> ActionResult<T>
    where
        F: FnOnce(&GameState) -> ActionResult<(GameState, T)>,
    {
        let (next, value) = intent(&self.state).inspect_err(|reason| {
            log::debug!("engine: action rejected: {reason}");
        })?;
        self.commit(next)?;
        Ok(value)
    }

    /// Run a built-in player command at `now`.
    pub fn execute(&mut self, command: &PlayerCommand, now: Millis) -> ActionResult<CommandReceipt> {
        let ctx = ActionContext { config: &self.config, now };
        let (next, receipt) = command.apply(&self.state, &ctx).inspect_err(|reason| {
            log::debug!("engine: {} rejected: {reason}", command.name());
        })?;
        self.commit(next)?;

        if let CommandReceipt::Prestiged { gain } = receipt {
            log::info!("engine: prestige +{gain} (level {})", self.state.prestige_level);
            self.emit(&EngineEvent::Prestiged { gain, prestige_level: self.state.prestige_level });
        }
        Ok(receipt)
    }

    fn commit(&mut self, next: GameState) -> ActionResult<()> {
        next.validate().map_err(Rejection::InvariantViolated)?;
        let before = &self.state.stats;
        if next.stats.total_clicks < before.total_clicks
            || next.stats.total_earned < before.total_earned
            || next.stats.prestige_count < before.prestige_count
        {
            return Err(Rejection::InvariantViolated("lifetime stats decreased".into()));
        }
        self.state = next;
        self.notify();
        Ok(())
    }

    /// Replace the whole state (import, explicit reset). Pending offline
    /// progress belongs to the old state and is discarded.
    pub fn replace_state(&mut self, mut state: GameState) {
        state.sync_with_catalog(&self.catalog);
        self.state = state;
        self.pending_offline = None;
        self.notify();
    }

    /// Start a timed event from the catalog directly, bypassing the roll.
    pub fn start_timed_event(&mut self, id: &str, now: Millis) -> ActionResult<()> {
        let def = self
            .catalog
            .events
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| Rejection::UnknownId { kind: "event", id: id.to_string() })?;
        let mut next = self.state.clone();
        let event = event_subsystem::activate(&mut next, def, now);
        self.commit(next)?;
        self.emit(&event);
        Ok(())
    }

    // ── Time ───────────────────────────────────────────────────

    /// Advance one tick to wall-clock `now`, integrating the real time
    /// elapsed since the previous tick.
    pub fn tick(&mut self, now: Millis) -> SimResult<TickReport> {
        let previous = self.state.last_tick_timestamp;
        if now < previous {
            log::warn!("now={now} engine: clock moved backwards by {}ms", previous - now);
        }
        let elapsed = (now - previous).max(0).min(self.config.offline_cap_ms.max(0));
        let earned_before = self.state.stats.total_earned;

        let ctx = TickContext {
            now,
            previous,
            elapsed,
            config: &self.config,
            catalog: &self.catalog,
        };
        let mut events = Vec::new();
        for (subsystem, rng) in &mut self.subsystems {
            let produced = subsystem.update(&ctx, &mut self.state, rng)?;
            if !produced.is_empty() {
                log::debug!("now={now} {}: {} notification(s)", subsystem.name(), produced.len());
            }
            events.extend(produced);
        }

        self.state.last_tick_timestamp = now;
        self.ticks += 1;

        events.iter().for_each(|e| self.emit(e));
        self.notify();

        Ok(TickReport {
            now,
            elapsed,
            earned: self.state.stats.total_earned - earned_before,
            events,
        })
    }

    /// Credit the time spent closed. Call once after loading, before the
    /// scheduler starts; the report stays pending until acknowledged.
    pub fn apply_offline_progress(&mut self, now: Millis) -> Option<OfflineReport> {
        if !self.state.settings.offline_progress {
            log::info!("engine: offline progress disabled, skipping catch-up");
            self.state.last_tick_timestamp = self.state.last_tick_timestamp.max(now);
            return None;
        }

        let report = offline::calculate(&self.state, &self.config, now);
        self.state.earn(report.gained);
        self.state.last_tick_timestamp = self.state.last_tick_timestamp.max(now);
        log::info!(
            "engine: offline for {}ms (processed {}ms{}), gained {:.2}",
            report.time_away,
            report.time_processed,
            if report.was_capped { ", capped" } else { "" },
            report.gained
        );

        self.pending_offline = Some(report);
        self.emit(&EngineEvent::OfflineProgress { report });
        self.notify();
        Some(report)
    }

    pub fn pending_offline(&self) -> Option<&OfflineReport> {
        self.pending_offline.as_ref()
    }

    pub fn acknowledge_offline(&mut self) -> Option<OfflineReport> {
        self.pending_offline.take()
    }
}
