//! JSON-file driver: the fallback medium.
//!
//! Layout under the save directory:
//!   <key>.save          StoredPayload as JSON
//!   <key>.backups.json  Vec<BackupRecord>, newest first
//!
//! Every write goes to a temp file first and is renamed into place, so a
//! crash mid-write leaves the previous file intact.

use super::{validate_key, BackupRecord, StorageDriver, StoredPayload};
use crate::error::StoreResult;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

pub struct FileDriver {
    dir: PathBuf,
}

impl FileDriver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.save"))
    }

    fn backups_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.backups.json"))
    }

    fn read_backups(&self, key: &str) -> StoreResult<Vec<BackupRecord>> {
        match read_optional(&self.backups_path(key))? {
            Some(text) => Ok(serde_json::from_str(&text)?),
            None => Ok(Vec::new()),
        }
    }

    fn write_backups(&self, key: &str, records: &[BackupRecord]) -> StoreResult<()> {
        let text = serde_json::to_string(records)?;
        write_atomic(&self.backups_path(key), &text)
    }
}

fn read_optional(path: &Path) -> StoreResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_atomic(path: &Path, contents: &str) -> StoreResult<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl StorageDriver for FileDriver {
    fn name(&self) -> &'static str { "file" }

    fn probe(&mut self) -> StoreResult<()> {
        fs::create_dir_all(&self.dir)?;
        let probe = self.dir.join(".probe");
        fs::write(&probe, b"ok")?;
        fs::remove_file(&probe)?;
        Ok(())
    }

    fn save(&mut self, key: &str, payload: &str, checksum: &str) -> StoreResult<()> {
        validate_key(key)?;
        let record = StoredPayload {
            payload: payload.to_string(),
            checksum: checksum.to_string(),
        };
        write_atomic(&self.slot_path(key), &serde_json::to_string(&record)?)
    }

    fn load(&self, key: &str) -> StoreResult<Option<StoredPayload>> {
        validate_key(key)?;
        match read_optional(&self.slot_path(key))? {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn delete(&mut self, key: &str) -> StoreResult<()> {
        validate_key(key)?;
        match fs::remove_file(self.slot_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        validate_key(key)?;
        Ok(self.slot_path(key).is_file())
    }

    fn save_backup(&mut self, record: &BackupRecord) -> StoreResult<()> {
        validate_key(&record.original_key)?;
        let mut records = self.read_backups(&record.original_key)?;
        records.insert(0, record.clone());
        self.write_backups(&record.original_key, &records)
    }

    fn list_backups(&self, key: &str) -> StoreResult<Vec<BackupRecord>> {
        validate_key(key)?;
        self.read_backups(key)
    }

    fn prune_backups(&mut self, key: &str, keep: usize) -> StoreResult<usize> {
        validate_key(key)?;
        let mut records = self.read_backups(key)?;
        if records.len() <= keep {
            return Ok(0);
        }
        let removed = records.len() - keep;
        records.truncate(keep);
        self.write_backups(key, &records)?;
        Ok(removed)
    }
}
