use crate::{migration::MigrationError, state::Currency};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No storage medium available (primary: {primary}; fallback: {fallback})")]
    NoStorageAvailable { primary: String, fallback: String },

    #[error("Offline progress must be acknowledged before ticking resumes")]
    OfflineUnacknowledged,

    #[error("Scheduler cannot {op} while {state}")]
    SchedulerState { op: &'static str, state: &'static str },

    #[error("Failed to spawn {name} thread: {source}")]
    ThreadSpawn {
        name: &'static str,
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type SimResult<T> = Result<T, SimError>;

/// Failures raised by a single storage driver.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{driver} driver unavailable: {reason}")]
    Unavailable { driver: &'static str, reason: String },

    #[error("Invalid storage key '{key}'")]
    InvalidKey { key: String },

    #[error("{driver} driver fault during {op}")]
    Fault { driver: &'static str, op: &'static str },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The persistence taxonomy. Everything the orchestrator can fail with is
/// one of these; none of them abort the simulation.
#[derive(Error, Debug)]
pub enum SaveError {
    #[error("Save payload corrupt: {reason}")]
    Corruption { reason: String },

    #[error("{driver} driver failed: {source}")]
    Driver {
        driver: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("All storage drivers failed (primary: {primary}; fallback: {fallback})")]
    DriversExhausted { primary: String, fallback: String },

    #[error("Migration failed: {0}")]
    Migration(#[from] MigrationError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SaveResult<T> = Result<T, SaveError>;

/// Why a player intent was refused. The state is untouched whenever one of
/// these is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("Insufficient {currency}: need {needed}, have {available}")]
    InsufficientFunds {
        currency: Currency,
        needed: f64,
        available: f64,
    },

    #[error("Unknown {kind} '{id}'")]
    UnknownId { kind: &'static str, id: String },

    #[error("Upgrade '{id}' is already at its maximum tier")]
    AlreadyMaxed { id: String },

    #[error("Theme '{id}' is already unlocked")]
    AlreadyUnlocked { id: String },

    #[error("Theme '{id}' is locked")]
    ThemeLocked { id: String },

    #[error("Prestige needs {needed} currency, have {available}")]
    NothingToPrestige { needed: f64, available: f64 },

    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("Resulting state violates an invariant: {0}")]
    InvariantViolated(String),
}

pub type ActionResult<T> = Result<T, Rejection>;
