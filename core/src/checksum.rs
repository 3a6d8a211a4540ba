//! Keyed digests over encoded save payloads.
//!
//! The pepper is appended before hashing so a player who edits the
//! payload cannot simply recompute a bare SHA-256. This is tamper
//! detection, not security: the pepper ships with the binary.

use sha2::{Digest, Sha256};

pub const DEFAULT_PEPPER: &str = "idlekeep::v1::a9c4f0e2-5d1b-4f5e-9b7a-3e8d2c6f1a40";

/// Hex SHA-256 of `encoded || pepper`.
pub fn compute(encoded: &str, pepper: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(encoded.as_bytes());
    hasher.update(pepper.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify(encoded: &str, checksum: &str, pepper: &str) -> bool {
    let expected = compute(encoded, pepper);
    // Compare every byte so a mismatch position is not observable.
    expected.len() == checksum.len()
        && expected
            .bytes()
            .zip(checksum.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Random identifier for a backup record.
pub fn backup_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
