//! Storage drivers: raw key/value persistence against one medium each.
//!
//! RULE: only driver implementations touch a storage medium.
//! The persistence orchestrator decides what to write and where; drivers
//! just store strings and report failures.

mod file;
mod memory;
mod sqlite;

pub use file::FileDriver;
pub use memory::MemoryDriver;
pub use sqlite::SqliteDriver;

use crate::{
    error::{StoreError, StoreResult},
    types::Millis,
};
use serde::{Deserialize, Serialize};

/// An encoded payload and the checksum stored beside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPayload {
    pub payload:  String,
    pub checksum: String,
}

/// A previously written payload kept for corruption recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id:           String,
    pub original_key: String,
    pub payload:      String,
    pub checksum:     String,
    pub timestamp:    Millis,
}

/// The contract every storage medium must fulfill.
pub trait StorageDriver: Send {
    /// Stable name used in logs and error reports.
    fn name(&self) -> &'static str;

    /// Check the medium is usable right now. Called once at startup.
    fn probe(&mut self) -> StoreResult<()>;

    fn save(&mut self, key: &str, payload: &str, checksum: &str) -> StoreResult<()>;

    fn load(&self, key: &str) -> StoreResult<Option<StoredPayload>>;

    fn delete(&mut self, key: &str) -> StoreResult<()>;

    fn exists(&self, key: &str) -> StoreResult<bool>;

    fn save_backup(&mut self, record: &BackupRecord) -> StoreResult<()>;

    /// Backups for `key`, newest first.
    fn list_backups(&self, key: &str) -> StoreResult<Vec<BackupRecord>>;

    /// Keep the `keep` newest backups for `key`. Returns how many were removed.
    fn prune_backups(&mut self, key: &str, keep: usize) -> StoreResult<usize>;
}

/// Keys double as file names for the file driver, so they are restricted
/// to a portable character set.
pub fn validate_key(key: &str) -> StoreResult<()> {
    let valid = !key.is_empty()
        && key.len() <= 128
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey { key: key.to_string() })
    }
}
