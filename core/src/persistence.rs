//! Persistence orchestrator: turns GameState into checksummed payloads and
//! back, across a primary and a fallback storage driver.
//!
//! WRITE PATH: envelope → hex transport → checksum(encoded + pepper) →
//! rotate the current valid payload into backups → write primary → on
//! failure write fallback.
//!
//! READ PATH: both slots → verify → decode + migrate → newest envelope
//! wins → when neither slot is usable, the newest verifying backup from
//! either driver.
//!
//! RULES:
//!   - All driver access happens under one mutex; writes never interleave.
//!   - Only a payload whose checksum verifies is ever rotated into backups.
//!   - No error here aborts the simulation. The single fatal case is having
//!     no usable medium at construction.

use crate::{
    checksum,
    clock::TimeSource,
    config::EngineConfig,
    envelope::{self, DecodedEnvelope, SaveEnvelope},
    error::{SaveError, SaveResult, SimError, SimResult, StoreError},
    migration::MigrationRegistry,
    state::GameState,
    store::{BackupRecord, StorageDriver, StoredPayload},
    types::{Millis, SaveKey},
};
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

/// Tag carried by exported documents.
pub const EXPORT_FORMAT: &str = "idlekeep-save";

/// Outcome of a successful save.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveReport {
    pub driver:        &'static str,
    pub used_fallback: bool,
    pub checksum:      String,
    pub saved_at:      Millis,
}

/// A save that decoded and verified.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSave {
    pub state:                GameState,
    pub saved_at:             Millis,
    pub driver:               &'static str,
    pub restored_from_backup: bool,
    /// Format version the payload was written in, before migration.
    pub original_version:     u32,
}

/// Portable export document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportDocument {
    pub format:   String,
    pub payload:  String,
    pub checksum: String,
}

struct Drivers {
    primary:  Option<Box<dyn StorageDriver>>,
    fallback: Option<Box<dyn StorageDriver>>,
}

impl Drivers {
    /// Available drivers in read/write preference order.
    fn ordered(&mut self) -> impl Iterator<Item = (bool, &mut Box<dyn StorageDriver>)> {
        self.primary
            .iter_mut()
            .map(|d| (false, d))
            .chain(self.fallback.iter_mut().map(|d| (true, d)))
    }
}

pub struct SaveManager {
    drivers:    Mutex<Drivers>,
    key:        SaveKey,
    pepper:     String,
    keep:       usize,
    migrations: MigrationRegistry,
    time:       Arc<dyn TimeSource>,
    fallback_warned: AtomicBool,
}

impl SaveManager {
    /// Probe both media once and keep the usable ones. Fails only when
    /// neither can be used.
    pub fn new(
        config: &EngineConfig,
        primary: Option<Box<dyn StorageDriver>>,
        fallback: Option<Box<dyn StorageDriver>>,
        time: Arc<dyn TimeSource>,
    ) -> SimResult<Self> {
        let (primary, primary_reason) = select("primary", primary);
        let (fallback, fallback_reason) = select("fallback", fallback);

        match (&primary, &fallback) {
            (None, None) => {
                log::error!("persistence: no storage medium available");
                return Err(SimError::NoStorageAvailable {
                    primary: primary_reason,
                    fallback: fallback_reason,
                });
            }
            (None, Some(f)) => {
                log::warn!(
                    "persistence: primary storage unavailable ({primary_reason}), using {} driver",
                    f.name()
                );
            }
            (Some(p), fallback) => {
                log::info!(
                    "persistence: using {} driver{}",
                    p.name(),
                    fallback.as_ref().map(|f| format!(", {} fallback", f.name())).unwrap_or_default()
                );
            }
        }

        Ok(Self {
            drivers: Mutex::new(Drivers { primary, fallback }),
            key: config.save_key.clone(),
            pepper: config.pepper.clone(),
            keep: config.backup_keep,
            migrations: MigrationRegistry::standard(),
            time,
            fallback_warned: AtomicBool::new(false),
        })
    }

    pub fn with_migrations(mut self, migrations: MigrationRegistry) -> Self {
        self.migrations = migrations;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Name of the driver writes go to first.
    pub fn active_driver(&self) -> &'static str {
        let mut drivers = self.lock();
        let name = drivers.ordered().next().map(|(_, d)| d.name());
        name.unwrap_or("none")
    }

    fn lock(&self) -> MutexGuard<'_, Drivers> {
        self.drivers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Save ───────────────────────────────────────────────────

    pub fn save(&self, state: &GameState) -> SaveResult<SaveReport> {
        let now = self.time.now_ms();
        let encoded = SaveEnvelope::new(state.clone(), now).encode()?;
        let sum = checksum::compute(&encoded, &self.pepper);

        let mut drivers = self.lock();
        let mut failures: Vec<String> = Vec::new();
        for (is_fallback, driver) in drivers.ordered() {
            match self.write_rotating(&mut **driver, &encoded, &sum, now) {
                Ok(()) => {
                    if is_fallback && !failures.is_empty() {
                        self.warn_fallback(&failures[0]);
                    }
                    log::debug!("key={} persistence: saved via {}", self.key, driver.name());
                    return Ok(SaveReport {
                        driver: driver.name(),
                        used_fallback: is_fallback,
                        checksum: sum,
                        saved_at: now,
                    });
                }
                Err(e) => {
                    log::warn!("key={} persistence: {} write failed: {e}", self.key, driver.name());
                    failures.push(format!("{}: {e}", driver.name()));
                }
            }
        }

        log::error!("key={} persistence: every driver failed to save", self.key);
        Err(exhausted(failures))
    }

    fn warn_fallback(&self, reason: &str) {
        if !self.fallback_warned.swap(true, Ordering::SeqCst) {
            log::warn!("persistence: primary write failed ({reason}), now writing to fallback");
        }
    }

    /// Move the driver's current payload into backups (only if it
    /// verifies), prune, then overwrite the slot.
    fn write_rotating(
        &self,
        driver: &mut dyn StorageDriver,
        encoded: &str,
        sum: &str,
        now: Millis,
    ) -> Result<(), StoreError> {
        match driver.load(&self.key) {
            Ok(Some(current)) if checksum::verify(&current.payload, &current.checksum, &self.pepper) => {
                let record = BackupRecord {
                    id: checksum::backup_id(),
                    original_key: self.key.clone(),
                    payload: current.payload,
                    checksum: current.checksum,
                    timestamp: now,
                };
                let rotated = driver
                    .save_backup(&record)
                    .and_then(|_| driver.prune_backups(&self.key, self.keep));
                match rotated {
                    Ok(pruned) if pruned > 0 => {
                        log::debug!("key={} persistence: pruned {pruned} old backup(s)", self.key);
                    }
                    Ok(_) => {}
                    Err(e) => log::warn!("key={} persistence: backup rotation failed: {e}", self.key),
                }
            }
            Ok(Some(_)) => {
                log::warn!("key={} persistence: current payload fails its checksum, not backed up", self.key);
            }
            Ok(None) => {}
            Err(e) => log::debug!("key={} persistence: could not read current payload: {e}", self.key),
        }
        driver.save(&self.key, encoded, sum)
    }

    // ── Load ───────────────────────────────────────────────────

    /// `Ok(None)` when no save exists anywhere. An `Err` means a save
    /// exists (or may exist) but none of it is usable; the caller starts
    /// fresh either way.
    ///
    /// Both slots are read and verified; the newest envelope wins, the
    /// primary on a tie. Backups from both drivers are walked only when
    /// neither slot is usable.
    pub fn load(&self) -> SaveResult<Option<LoadedSave>> {
        let mut drivers = self.lock();
        let mut failures: Vec<String> = Vec::new();
        let mut corruption: Option<SaveError> = None;
        let mut best: Option<LoadedSave> = None;

        for (_, driver) in drivers.ordered() {
            let name = driver.name();
            let stored = match driver.load(&self.key) {
                Ok(Some(stored)) => stored,
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("key={} persistence: {name} read failed: {e}", self.key);
                    failures.push(format!("{name}: {e}"));
                    continue;
                }
            };
            match self.decode_verified(&stored) {
                Ok(decoded) => {
                    let candidate = loaded(decoded, name, false);
                    if best.as_ref().map_or(true, |b| candidate.saved_at > b.saved_at) {
                        best = Some(candidate);
                    }
                }
                Err(e) => {
                    log::warn!("key={} persistence: {name} payload unusable: {e}", self.key);
                    failures.push(format!("{name}: {e}"));
                    corruption.get_or_insert(e);
                }
            }
        }

        if let Some(found) = best {
            log::debug!("key={} persistence: loaded save from {}", self.key, found.driver);
            return Ok(Some(found));
        }
        if failures.is_empty() {
            return Ok(None);
        }
        if let Some(restored) = self.recover_from_backups(&mut drivers) {
            return Ok(Some(restored));
        }
        Err(corruption.unwrap_or_else(|| exhausted(failures)))
    }

    /// Newest verifying backup across every driver.
    fn recover_from_backups(&self, drivers: &mut Drivers) -> Option<LoadedSave> {
        let mut best: Option<LoadedSave> = None;
        for (_, driver) in drivers.ordered() {
            let name = driver.name();
            let backups = match driver.list_backups(&self.key) {
                Ok(backups) => backups,
                Err(e) => {
                    log::warn!("key={} persistence: cannot list {name} backups: {e}", self.key);
                    continue;
                }
            };
            for backup in backups {
                let stored = StoredPayload { payload: backup.payload, checksum: backup.checksum };
                match self.decode_verified(&stored) {
                    Ok(decoded) => {
                        let candidate = loaded(decoded, name, true);
                        if best.as_ref().map_or(true, |b| candidate.saved_at > b.saved_at) {
                            best = Some(candidate);
                        }
                    }
                    Err(e) => log::debug!("key={} persistence: backup {} unusable: {e}", self.key, backup.id),
                }
            }
        }
        match &best {
            Some(found) => log::warn!("key={} persistence: restored from a {} backup", self.key, found.driver),
            None => log::warn!("key={} persistence: no usable backup", self.key),
        }
        best
    }

    fn decode_verified(&self, stored: &StoredPayload) -> SaveResult<DecodedEnvelope> {
        if !checksum::verify(&stored.payload, &stored.checksum, &self.pepper) {
            return Err(SaveError::Corruption { reason: "checksum mismatch".into() });
        }
        let decoded = envelope::decode(&stored.payload, &self.migrations)?;
        decoded
            .envelope
            .data
            .validate()
            .map_err(|reason| SaveError::Corruption { reason })?;
        if decoded.original_version != decoded.envelope.version {
            log::info!(
                "key={} persistence: migrated save from v{} to v{}",
                self.key,
                decoded.original_version,
                decoded.envelope.version
            );
        }
        Ok(decoded)
    }

    // ── Export / import ────────────────────────────────────────

    /// Portable JSON document carrying an encoded payload and its checksum.
    pub fn export_save(&self, state: &GameState) -> SaveResult<String> {
        let payload = SaveEnvelope::new(state.clone(), self.time.now_ms()).encode()?;
        let document = ExportDocument {
            format: EXPORT_FORMAT.to_string(),
            checksum: checksum::compute(&payload, &self.pepper),
            payload,
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Verify and decode an exported document, then persist it as the
    /// current save.
    pub fn import_save(&self, text: &str) -> SaveResult<LoadedSave> {
        let document: ExportDocument = serde_json::from_str(text).map_err(|e| SaveError::Corruption {
            reason: format!("not an export document: {e}"),
        })?;
        if document.format != EXPORT_FORMAT {
            return Err(SaveError::Corruption {
                reason: format!("unknown export format '{}'", document.format),
            });
        }
        let stored = StoredPayload { payload: document.payload, checksum: document.checksum };
        let decoded = self.decode_verified(&stored)?;
        let report = self.save(&decoded.envelope.data)?;
        log::info!("key={} persistence: imported save via {}", self.key, report.driver);
        Ok(loaded(decoded, report.driver, false))
    }

    // ── Delete ─────────────────────────────────────────────────

    /// Remove the slot and every backup on both drivers.
    pub fn delete_save(&self) -> SaveResult<()> {
        let mut drivers = self.lock();
        let mut first_error: Option<SaveError> = None;
        for (_, driver) in drivers.ordered() {
            let name = driver.name();
            let result = driver
                .delete(&self.key)
                .and_then(|_| driver.prune_backups(&self.key, 0));
            match result {
                Ok(removed) => log::info!("key={} persistence: deleted save on {name} ({removed} backup(s))", self.key),
                Err(source) => {
                    log::warn!("key={} persistence: delete on {name} failed: {source}", self.key);
                    first_error.get_or_insert(SaveError::Driver { driver: name, source });
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

fn select(
    role: &'static str,
    driver: Option<Box<dyn StorageDriver>>,
) -> (Option<Box<dyn StorageDriver>>, String) {
    match driver {
        None => (None, "not configured".to_string()),
        Some(mut d) => match d.probe() {
            Ok(()) => (Some(d), String::new()),
            Err(e) => {
                log::debug!("persistence: {role} {} probe failed: {e}", d.name());
                (None, format!("{}: {e}", d.name()))
            }
        },
    }
}

fn exhausted(failures: Vec<String>) -> SaveError {
    let mut failures = failures.into_iter();
    SaveError::DriversExhausted {
        primary: failures.next().unwrap_or_else(|| "unavailable".into()),
        fallback: failures.next().unwrap_or_else(|| "unavailable".into()),
    }
}

fn loaded(decoded: DecodedEnvelope, driver: &'static str, restored_from_backup: bool) -> LoadedSave {
    LoadedSave {
        saved_at: decoded.envelope.timestamp,
        state: decoded.envelope.data,
        driver,
        restored_from_backup,
        original_version: decoded.original_version,
    }
}
