//! Background save writer.
//!
//! One thread owns all asynchronous writes. Submitting while a job is
//! still queued replaces it: only the newest snapshot is worth writing.
//! A job may carry the scheduler's single-flight guard, which the writer
//! clears once that job's save has finished.

use crate::{
    error::{SaveResult, SimError, SimResult},
    persistence::{SaveManager, SaveReport},
    state::GameState,
};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
    },
    thread::{self, JoinHandle},
};

pub type ReportFn = Box<dyn Fn(SaveResult<SaveReport>) + Send>;

struct Job {
    state:         GameState,
    release_guard: bool,
}

#[derive(Default)]
struct Slot {
    pending:   Option<Job>,
    writing:   bool,
    shutdown:  bool,
    completed: u64,
    coalesced: u64,
}

#[derive(Default)]
struct Shared {
    slot: Mutex<Slot>,
    wake: Condvar,
    idle: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct SaveQueue {
    shared: Arc<Shared>,
    guard:  Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SaveQueue {
    /// Start the writer thread. `on_report` runs on that thread after
    /// every write.
    pub fn spawn(
        manager: Arc<SaveManager>,
        guard: Arc<AtomicBool>,
        on_report: ReportFn,
    ) -> SimResult<Self> {
        let shared = Arc::new(Shared::default());
        let handle = thread::Builder::new()
            .name("idlekeep-save".into())
            .spawn({
                let shared = Arc::clone(&shared);
                let guard = Arc::clone(&guard);
                move || writer_loop(&shared, &manager, &guard, &on_report)
            })
            .map_err(|source| SimError::ThreadSpawn { name: "save writer", source })?;

        Ok(Self { shared, guard, handle: Some(handle) })
    }

    /// Queue `state` for writing, replacing any job not yet started.
    pub fn submit(&self, state: GameState, release_guard: bool) {
        let mut slot = self.shared.lock();
        if slot.shutdown {
            log::warn!("save queue: submit after shutdown ignored");
            if release_guard {
                self.guard.store(false, Ordering::SeqCst);
            }
            return;
        }
        // A replaced job's guard obligation passes to its replacement.
        let inherited = match slot.pending.take() {
            Some(old) => {
                slot.coalesced += 1;
                old.release_guard
            }
            None => false,
        };
        slot.pending = Some(Job { state, release_guard: release_guard || inherited });
        drop(slot);
        self.shared.wake.notify_one();
    }

    /// Drop a queued job that has not started. Returns whether one was dropped.
    pub fn cancel_pending(&self) -> bool {
        let job = self.shared.lock().pending.take();
        match job {
            Some(job) => {
                if job.release_guard {
                    self.guard.store(false, Ordering::SeqCst);
                }
                self.shared.idle.notify_all();
                true
            }
            None => false,
        }
    }

    /// Block until nothing is queued or being written.
    pub fn wait_idle(&self) {
        let mut slot = self.shared.lock();
        while slot.pending.is_some() || slot.writing {
            slot = self.shared.idle.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Writes finished so far.
    pub fn completed(&self) -> u64 {
        self.shared.lock().completed
    }

    /// Jobs replaced by a newer snapshot before they were written.
    pub fn coalesced(&self) -> u64 {
        self.shared.lock().coalesced
    }

    /// Finish the queued job (if any) and join the writer.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.shared.lock().shutdown = true;
        self.shared.wake.notify_all();
        if handle.join().is_err() {
            log::error!("save queue: writer thread panicked");
        }
    }
}

impl Drop for SaveQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn writer_loop(shared: &Shared, manager: &SaveManager, guard: &AtomicBool, on_report: &ReportFn) {
    loop {
        let job = {
            let mut slot = shared.lock();
            while slot.pending.is_none() && !slot.shutdown {
                slot = shared.wake.wait(slot).unwrap_or_else(PoisonError::into_inner);
            }
            match slot.pending.take() {
                Some(job) => {
                    slot.writing = true;
                    job
                }
                None => break,
            }
        };

        let result = manager.save(&job.state);
        if job.release_guard {
            guard.store(false, Ordering::SeqCst);
        }
        on_report(result);

        let mut slot = shared.lock();
        slot.writing = false;
        slot.completed += 1;
        drop(slot);
        shared.idle.notify_all();
    }
    log::debug!("save queue: writer exiting");
}
