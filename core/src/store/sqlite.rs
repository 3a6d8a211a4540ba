//! SQLite driver: the primary medium.

use super::{validate_key, BackupRecord, StorageDriver, StoredPayload};
use crate::error::StoreResult;
use rusqlite::{params, Connection, OptionalExtension};

pub struct SqliteDriver {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl SqliteDriver {
    /// Open (or create) the save database at `path` and apply its schema.
    pub fn open(path: &str) -> StoreResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        let driver = Self { conn, path: Some(path.to_string()) };
        driver.migrate()?;
        Ok(driver)
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open(":memory:")?;
        let driver = Self { conn, path: None };
        driver.migrate()?;
        Ok(driver)
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Apply all schema migrations in order.
    fn migrate(&self) -> StoreResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_save_store.sql"))?;
        Ok(())
    }
}

impl StorageDriver for SqliteDriver {
    fn name(&self) -> &'static str { "sqlite" }

    fn probe(&mut self) -> StoreResult<()> {
        // A write lock proves the file is writable, not just readable.
        self.conn.execute_batch("BEGIN IMMEDIATE; ROLLBACK;")?;
        Ok(())
    }

    fn save(&mut self, key: &str, payload: &str, checksum: &str) -> StoreResult<()> {
        validate_key(key)?;
        self.conn.execute(
            "INSERT INTO save_slot (key, payload, checksum, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                 payload = excluded.payload,
                 checksum = excluded.checksum,
                 updated_at = excluded.updated_at",
            params![key, payload, checksum, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    fn load(&self, key: &str) -> StoreResult<Option<StoredPayload>> {
        validate_key(key)?;
        let row = self
            .conn
            .query_row(
                "SELECT payload, checksum FROM save_slot WHERE key = ?1",
                params![key],
                |row| {
                    Ok(StoredPayload {
                        payload: row.get(0)?,
                        checksum: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    fn delete(&mut self, key: &str) -> StoreResult<()> {
        validate_key(key)?;
        self.conn
            .execute("DELETE FROM save_slot WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        validate_key(key)?;
        let found: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM save_slot WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    fn save_backup(&mut self, record: &BackupRecord) -> StoreResult<()> {
        validate_key(&record.original_key)?;
        self.conn.execute(
            "INSERT INTO save_backup (id, original_key, payload, checksum, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id,
                record.original_key,
                record.payload,
                record.checksum,
                record.timestamp,
            ],
        )?;
        Ok(())
    }

    fn list_backups(&self, key: &str) -> StoreResult<Vec<BackupRecord>> {
        validate_key(key)?;
        let mut stmt = self.conn.prepare(
            "SELECT id, original_key, payload, checksum, timestamp
             FROM save_backup WHERE original_key = ?1
             ORDER BY seq DESC",
        )?;
        let records = stmt
            .query_map(params![key], |row| {
                Ok(BackupRecord {
                    id: row.get(0)?,
                    original_key: row.get(1)?,
                    payload: row.get(2)?,
                    checksum: row.get(3)?,
                    timestamp: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn prune_backups(&mut self, key: &str, keep: usize) -> StoreResult<usize> {
        validate_key(key)?;
        let removed = self.conn.execute(
            "DELETE FROM save_backup
             WHERE original_key = ?1
               AND seq NOT IN (
                   SELECT seq FROM save_backup WHERE original_key = ?1
                   ORDER BY seq DESC LIMIT ?2
               )",
            params![key, keep as i64],
        )?;
        Ok(removed)
    }
}
