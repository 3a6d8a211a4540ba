//! Save envelope: the versioned wrapper around persisted state.
//!
//! Wire format: `{ version, data, timestamp }` as UTF-8 JSON, hex-encoded
//! for transport. The checksum is computed over the encoded string and
//! stored beside it, never inside it.

use crate::{
    error::{SaveError, SaveResult},
    migration::{MigrationError, MigrationRegistry, CURRENT_VERSION},
    state::GameState,
    types::Millis,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaveEnvelope {
    pub version:   u32,
    pub data:      GameState,
    pub timestamp: Millis,
}

/// A decoded envelope plus the format version it was written in.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEnvelope {
    pub envelope:         SaveEnvelope,
    pub original_version: u32,
}

impl SaveEnvelope {
    pub fn new(data: GameState, timestamp: Millis) -> Self {
        Self { version: CURRENT_VERSION, data, timestamp }
    }

    pub fn encode(&self) -> SaveResult<String> {
        let json = serde_json::to_string(self)?;
        Ok(hex::encode(json.as_bytes()))
    }
}

fn corrupt(reason: impl Into<String>) -> SaveError {
    SaveError::Corruption { reason: reason.into() }
}

/// Decode a transport string, migrating older formats up to
/// CURRENT_VERSION. The checksum must already have been verified.
pub fn decode(encoded: &str, migrations: &MigrationRegistry) -> SaveResult<DecodedEnvelope> {
    let bytes = hex::decode(encoded.trim()).map_err(|e| corrupt(format!("bad transport encoding: {e}")))?;
    let text = String::from_utf8(bytes).map_err(|e| corrupt(format!("payload is not UTF-8: {e}")))?;
    let raw: Value = serde_json::from_str(&text).map_err(|e| corrupt(format!("payload is not JSON: {e}")))?;

    let version = raw
        .get("version")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| corrupt("envelope has no version"))?;
    let timestamp = raw
        .get("timestamp")
        .and_then(Value::as_i64)
        .ok_or_else(|| corrupt("envelope has no timestamp"))?;
    let data = raw
        .get("data")
        .cloned()
        .ok_or_else(|| corrupt("envelope has no data"))?;

    if version > CURRENT_VERSION {
        return Err(MigrationError::FutureVersion { found: version, supported: CURRENT_VERSION }.into());
    }
    let data = migrations.migrate(data, version, CURRENT_VERSION)?;
    let state: GameState = serde_json::from_value(data)
        .map_err(|e| corrupt(format!("v{version} data does not match the state schema: {e}")))?;

    Ok(DecodedEnvelope {
        envelope: SaveEnvelope::new(state, timestamp),
        original_version: version,
    })
}
