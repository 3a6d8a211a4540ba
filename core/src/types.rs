//! Shared primitive types used across the entire simulation.

/// Wall-clock milliseconds since the Unix epoch.
pub type Millis = i64;

/// Stable identifier of a generator, upgrade, timed event or theme.
pub type ContentId = String;

/// Storage key a save slot is written under.
pub type SaveKey = String;

pub const MS_PER_SECOND: f64 = 1000.0;
