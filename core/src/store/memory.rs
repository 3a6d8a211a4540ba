//! In-memory driver with fault injection, for tests and headless runs.
//!
//! Clones share the same backing map, so a test can keep a handle to a
//! driver it has handed to the persistence layer and flip its faults or
//! tamper with stored payloads.

use super::{validate_key, BackupRecord, StorageDriver, StoredPayload};
use crate::error::{StoreError, StoreResult};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

#[derive(Debug, Default)]
struct Faults {
    unavailable: bool,
    fail_reads:  bool,
    fail_writes: bool,
}

#[derive(Debug, Default)]
struct Inner {
    slots:   HashMap<String, StoredPayload>,
    backups: HashMap<String, Vec<BackupRecord>>, // newest first
    faults:  Faults,
    writes:  u64,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDriver {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `probe` fail, as a missing medium would.
    pub fn set_unavailable(&self, on: bool) {
        self.lock().faults.unavailable = on;
    }

    pub fn set_fail_reads(&self, on: bool) {
        self.lock().faults.fail_reads = on;
    }

    pub fn set_fail_writes(&self, on: bool) {
        self.lock().faults.fail_writes = on;
    }

    /// Number of successful slot writes.
    pub fn writes(&self) -> u64 {
        self.lock().writes
    }

    /// Raw stored payload, bypassing faults.
    pub fn raw(&self, key: &str) -> Option<StoredPayload> {
        self.lock().slots.get(key).cloned()
    }

    /// Rewrite a stored payload in place, bypassing faults.
    pub fn tamper<F>(&self, key: &str, f: F) -> bool
    where
        F: FnOnce(&mut StoredPayload),
    {
        match self.lock().slots.get_mut(key) {
            Some(stored) => {
                f(stored);
                true
            }
            None => false,
        }
    }

    fn check_read(&self) -> StoreResult<()> {
        if self.lock().faults.fail_reads {
            return Err(StoreError::Fault { driver: "memory", op: "read" });
        }
        Ok(())
    }

    fn check_write(&self) -> StoreResult<()> {
        if self.lock().faults.fail_writes {
            return Err(StoreError::Fault { driver: "memory", op: "write" });
        }
        Ok(())
    }
}

impl StorageDriver for MemoryDriver {
    fn name(&self) -> &'static str { "memory" }

    fn probe(&mut self) -> StoreResult<()> {
        if self.lock().faults.unavailable {
            return Err(StoreError::Unavailable {
                driver: "memory",
                reason: "marked unavailable".into(),
            });
        }
        Ok(())
    }

    fn save(&mut self, key: &str, payload: &str, checksum: &str) -> StoreResult<()> {
        validate_key(key)?;
        self.check_write()?;
        let mut inner = self.lock();
        inner.slots.insert(
            key.to_string(),
            StoredPayload {
                payload: payload.to_string(),
                checksum: checksum.to_string(),
            },
        );
        inner.writes += 1;
        Ok(())
    }

    fn load(&self, key: &str) -> StoreResult<Option<StoredPayload>> {
        validate_key(key)?;
        self.check_read()?;
        Ok(self.lock().slots.get(key).cloned())
    }

    fn delete(&mut self, key: &str) -> StoreResult<()> {
        validate_key(key)?;
        self.check_write()?;
        self.lock().slots.remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        validate_key(key)?;
        self.check_read()?;
        Ok(self.lock().slots.contains_key(key))
    }

    fn save_backup(&mut self, record: &BackupRecord) -> StoreResult<()> {
        validate_key(&record.original_key)?;
        self.check_write()?;
        self.lock()
            .backups
            .entry(record.original_key.clone())
            .or_default()
            .insert(0, record.clone());
        Ok(())
    }

    fn list_backups(&self, key: &str) -> StoreResult<Vec<BackupRecord>> {
        validate_key(key)?;
        self.check_read()?;
        Ok(self.lock().backups.get(key).cloned().unwrap_or_default())
    }

    fn prune_backups(&mut self, key: &str, keep: usize) -> StoreResult<usize> {
        validate_key(key)?;
        self.check_write()?;
        let mut inner = self.lock();
        let Some(records) = inner.backups.get_mut(key) else {
            return Ok(0);
        };
        let removed = records.len().saturating_sub(keep);
        records.truncate(keep);
        Ok(removed)
    }
}
