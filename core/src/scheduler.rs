//! Tick scheduler: drives an Engine in real time.
//!
//! STATE MACHINE: Idle → Running → Stopping → Idle.
//!
//! RULES:
//!   - A firing that arrives while the previous firing's work (including
//!     the autosave it queued) is unfinished is dropped, not queued.
//!   - Ticks and actions take the engine lock; saves run on the writer
//!     thread against a snapshot, so a slow medium never stalls a tick.
//!   - stop() cancels queued autosaves and then writes one final save
//!     synchronously.

use crate::{
    clock::TimeSource,
    command::{CommandReceipt, PlayerCommand},
    engine::{Engine, TickReport},
    error::{ActionResult, SaveResult, SimError, SimResult},
    event::EngineEvent,
    persistence::{SaveManager, SaveReport},
    save_queue::SaveQueue,
    types::Millis,
};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicI64, Ordering},
        mpsc::{self, RecvTimeoutError, Sender},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

/// Shared ownership of the engine between the timer, the save writer and
/// whoever issues player actions.
pub type EngineHandle = Arc<Mutex<Engine>>;

pub fn lock_engine(engine: &EngineHandle) -> MutexGuard<'_, Engine> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopping,
}

impl SchedulerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle     => "idle",
            Self::Running  => "running",
            Self::Stopping => "stopping",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Ran {
        report:         TickReport,
        autosave_queued: bool,
    },
    /// The previous firing had not finished.
    Dropped,
    NotRunning,
}

struct Shared {
    engine:        EngineHandle,
    saves:         Arc<SaveManager>,
    time:          Arc<dyn TimeSource>,
    state:         Mutex<SchedulerState>,
    busy:          Arc<AtomicBool>,
    last_autosave: AtomicI64,
    queue:         Mutex<Option<SaveQueue>>,
}

impl Shared {
    fn state(&self) -> SchedulerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: SchedulerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn queue(&self) -> MutexGuard<'_, Option<SaveQueue>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fire(&self) -> SimResult<TickOutcome> {
        if self.state() != SchedulerState::Running {
            return Ok(TickOutcome::NotRunning);
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("scheduler: previous tick still busy, firing dropped");
            return Ok(TickOutcome::Dropped);
        }

        let now = self.time.now_ms();
        let (report, snapshot) = {
            let mut engine = lock_engine(&self.engine);
            let report = match engine.tick(now) {
                Ok(report) => report,
                Err(e) => {
                    self.busy.store(false, Ordering::SeqCst);
                    return Err(e);
                }
            };
            let autosave_due = engine.state().settings.autosave
                && now - self.last_autosave.load(Ordering::SeqCst)
                    >= engine.config().autosave_interval_ms as Millis;
            let snapshot = autosave_due.then(|| engine.snapshot());
            (report, snapshot)
        };

        let autosave_queued = match (snapshot, self.queue().as_ref()) {
            (Some(state), Some(queue)) => {
                self.last_autosave.store(now, Ordering::SeqCst);
                log::debug!("now={now} scheduler: autosave queued");
                // The writer clears `busy` once this save is done.
                queue.submit(state, true);
                true
            }
            _ => false,
        };
        if !autosave_queued {
            self.busy.store(false, Ordering::SeqCst);
        }
        Ok(TickOutcome::Ran { report, autosave_queued })
    }
}

pub struct TickScheduler {
    shared:  Arc<Shared>,
    timer:   Option<JoinHandle<()>>,
    stop_tx: Option<Sender<()>>,
}

impl TickScheduler {
    pub fn new(engine: EngineHandle, saves: Arc<SaveManager>, time: Arc<dyn TimeSource>) -> Self {
        Self {
            shared: Arc::new(Shared {
                engine,
                saves,
                time,
                state: Mutex::new(SchedulerState::Idle),
                busy: Arc::new(AtomicBool::new(false)),
                last_autosave: AtomicI64::new(0),
                queue: Mutex::new(None),
            }),
            timer: None,
            stop_tx: None,
        }
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.shared.engine
    }

    pub fn saves(&self) -> &Arc<SaveManager> {
        &self.shared.saves
    }

    pub fn state(&self) -> SchedulerState {
        self.shared.state()
    }

    /// Whether a firing is in flight (tick running or its autosave
    /// unfinished).
    pub fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::SeqCst)
    }

    /// Start the save writer without a timer. Firings must then be driven
    /// by `fire()`; used by tests and by hosts with their own loop.
    pub fn start_manual(&mut self) -> SimResult<()> {
        let state = self.shared.state();
        if state != SchedulerState::Idle {
            return Err(SimError::SchedulerState { op: "start", state: state.as_str() });
        }
        let interval = {
            let engine = lock_engine(&self.shared.engine);
            if engine.pending_offline().is_some() {
                return Err(SimError::OfflineUnacknowledged);
            }
            engine.config().tick_interval_ms
        };

        let engine = Arc::clone(&self.shared.engine);
        let queue = SaveQueue::spawn(
            Arc::clone(&self.shared.saves),
            Arc::clone(&self.shared.busy),
            Box::new(move |result| report_save(&engine, &result)),
        )?;
        *self.shared.queue() = Some(queue);
        self.shared.last_autosave.store(self.shared.time.now_ms(), Ordering::SeqCst);
        self.shared.set_state(SchedulerState::Running);
        log::info!("scheduler: running (tick every {interval}ms)");
        Ok(())
    }

    /// Start ticking every `tick_interval_ms` on a timer thread.
    pub fn start(&mut self) -> SimResult<()> {
        self.start_manual()?;
        let interval = {
            let engine = lock_engine(&self.shared.engine);
            Duration::from_millis(engine.config().tick_interval_ms.max(1))
        };

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new().name("idlekeep-tick".into()).spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if let Err(e) = shared.fire() {
                        log::error!("scheduler: tick failed: {e}");
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });
        match spawned {
            Ok(handle) => {
                self.timer = Some(handle);
                self.stop_tx = Some(stop_tx);
                Ok(())
            }
            Err(source) => {
                self.shutdown_writer();
                self.shared.set_state(SchedulerState::Idle);
                Err(SimError::ThreadSpawn { name: "tick timer", source })
            }
        }
    }

    /// Run one firing now.
    pub fn fire(&self) -> SimResult<TickOutcome> {
        self.shared.fire()
    }

    /// Ask for a save. While running it goes through the writer queue;
    /// otherwise it is written immediately.
    pub fn request_save(&self) -> Option<SaveResult<SaveReport>> {
        if self.shared.state() == SchedulerState::Running {
            if let Some(queue) = self.shared.queue().as_ref() {
                let snapshot = lock_engine(&self.shared.engine).snapshot();
                queue.submit(snapshot, false);
                return None;
            }
        }
        Some(self.save_now())
    }

    /// Run a player command at the current time. Significant commands
    /// request a save.
    pub fn execute(&self, command: &PlayerCommand) -> ActionResult<CommandReceipt> {
        let now = self.shared.time.now_ms();
        let receipt = lock_engine(&self.shared.engine).execute(command, now)?;
        if command.is_significant() {
            self.request_save();
        }
        Ok(receipt)
    }

    /// Block until the writer has nothing queued or in flight.
    pub fn wait_for_saves(&self) {
        if let Some(queue) = self.shared.queue().as_ref() {
            queue.wait_idle();
        }
    }

    fn save_now(&self) -> SaveResult<SaveReport> {
        let snapshot = lock_engine(&self.shared.engine).snapshot();
        let result = self.shared.saves.save(&snapshot);
        report_save(&self.shared.engine, &result);
        result
    }

    fn shutdown_writer(&mut self) {
        let queue = self.shared.queue().take();
        if let Some(mut queue) = queue {
            if queue.cancel_pending() {
                log::debug!("scheduler: pending autosave cancelled");
            }
            queue.shutdown();
        }
    }

    /// Stop ticking and write a final save. `None` when not running.
    pub fn stop(&mut self) -> Option<SaveResult<SaveReport>> {
        let state = self.shared.state();
        if state != SchedulerState::Running {
            return None;
        }
        self.shared.set_state(SchedulerState::Stopping);

        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.timer.take() {
            if handle.join().is_err() {
                log::error!("scheduler: timer thread panicked");
            }
        }
        self.shutdown_writer();
        self.shared.busy.store(false, Ordering::SeqCst);

        let result = self.save_now();
        match &result {
            Ok(report) => log::info!("scheduler: stopped, final save via {}", report.driver),
            Err(e) => log::error!("scheduler: stopped, final save failed: {e}"),
        }
        self.shared.set_state(SchedulerState::Idle);
        Some(result)
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Surface a save outcome as an engine notification.
fn report_save(engine: &EngineHandle, result: &SaveResult<SaveReport>) {
    let event = match result {
        Ok(report) => EngineEvent::SaveCompleted { used_fallback: report.used_fallback },
        Err(e) => {
            log::error!("scheduler: save failed: {e}");
            EngineEvent::SaveFailed { error: e.to_string() }
        }
    };
    lock_engine(engine).emit(&event);
}
