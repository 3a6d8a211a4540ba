//! Save-format migrations.
//!
//! Each step rewrites the `data` object of an envelope from version N to
//! N+1. Steps are chained one version at a time; an old save never skips a
//! step and a save from the future is never guessed at.
//!
//! Format history:
//!   v1: primary economy, upgrades, timed events, `settings.autosave`,
//!       `stats.clicks` / `stats.total_earned`
//!   v2: secondary economy (`progression_currency`, `secondary_generators`,
//!       `secondary_upgrades`)
//!   v3: themes, `settings.offline_progress` / `settings.notifications`,
//!       `stats.clicks` renamed to `stats.total_clicks`, `stats.prestige_count`

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

pub const CURRENT_VERSION: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("save version {found} is newer than supported version {supported}")]
    FutureVersion { found: u32, supported: u32 },
    #[error("no migration path from version {from} to version {to}")]
    NoMigrationPath { from: u32, to: u32 },
    #[error("migration from version {from} to version {to} failed: {reason}")]
    StepFailed { from: u32, to: u32, reason: String },
}

/// Rewrites the data object of an envelope one version forward.
pub type MigrationFn = fn(Value) -> Result<Value, MigrationError>;

/// Registry of migration steps keyed by source version.
pub struct MigrationRegistry {
    steps: BTreeMap<u32, MigrationFn>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self { steps: BTreeMap::new() }
    }

    /// Every step needed to bring any released format to CURRENT_VERSION.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(1, v1_to_v2);
        registry.register(2, v2_to_v3);
        registry
    }

    /// Register a step from `from_version` to `from_version + 1`.
    pub fn register(&mut self, from_version: u32, step: MigrationFn) {
        self.steps.insert(from_version, step);
    }

    pub fn can_migrate(&self, from: u32, to: u32) -> bool {
        if from >= to {
            return from == to;
        }
        (from..to).all(|v| self.steps.contains_key(&v))
    }

    /// Apply each step from `from` up to `to`, in order.
    pub fn migrate(&self, data: Value, from: u32, to: u32) -> Result<Value, MigrationError> {
        if from > to {
            return Err(MigrationError::FutureVersion { found: from, supported: to });
        }
        let mut current = data;
        for version in from..to {
            let step = self
                .steps
                .get(&version)
                .ok_or(MigrationError::NoMigrationPath { from, to })?;
            current = step(current)?;
            log::info!("migration: save data upgraded v{version} -> v{}", version + 1);
        }
        Ok(current)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

impl Default for MigrationRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn object(data: &mut Value, from: u32) -> Result<&mut Map<String, Value>, MigrationError> {
    data.as_object_mut().ok_or(MigrationError::StepFailed {
        from,
        to: from + 1,
        reason: "save data is not an object".into(),
    })
}

fn v1_to_v2(mut data: Value) -> Result<Value, MigrationError> {
    let root = object(&mut data, 1)?;
    root.entry("progression_currency").or_insert(json!(0.0));
    root.entry("secondary_generators").or_insert(json!([]));
    root.entry("secondary_upgrades").or_insert(json!([]));
    Ok(data)
}

fn v2_to_v3(mut data: Value) -> Result<Value, MigrationError> {
    let root = object(&mut data, 2)?;
    root.entry("themes").or_insert(json!([]));

    let settings = root.entry("settings").or_insert(json!({ "autosave": true }));
    let settings = settings.as_object_mut().ok_or(MigrationError::StepFailed {
        from: 2,
        to: 3,
        reason: "settings is not an object".into(),
    })?;
    settings.entry("offline_progress").or_insert(json!(true));
    settings.entry("notifications").or_insert(json!(true));

    let stats = root.entry("stats").or_insert(json!({}));
    let stats = stats.as_object_mut().ok_or(MigrationError::StepFailed {
        from: 2,
        to: 3,
        reason: "stats is not an object".into(),
    })?;
    let clicks = stats.remove("clicks").unwrap_or(json!(0));
    stats.entry("total_clicks").or_insert(clicks);
    stats.entry("total_earned").or_insert(json!(0.0));
    stats.entry("prestige_count").or_insert(json!(0));
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_step(_data: Value) -> Result<Value, MigrationError> {
        Err(MigrationError::StepFailed { from: 0, to: 1, reason: "test failure".into() })
    }

    #[test]
    fn standard_registry_reaches_current() {
        let reg = MigrationRegistry::standard();
        assert!(reg.can_migrate(1, CURRENT_VERSION));
        assert!(reg.can_migrate(CURRENT_VERSION, CURRENT_VERSION));
        assert!(!reg.can_migrate(CURRENT_VERSION + 1, CURRENT_VERSION));
        assert_eq!(reg.step_count() as u32, CURRENT_VERSION - 1);
    }

    #[test]
    fn same_version_is_untouched() {
        let reg = MigrationRegistry::standard();
        let data = json!({ "currency": 5.0 });
        assert_eq!(reg.migrate(data.clone(), 3, 3).unwrap(), data);
    }

    #[test]
    fn future_version_is_refused() {
        let reg = MigrationRegistry::standard();
        let err = reg.migrate(json!({}), CURRENT_VERSION + 1, CURRENT_VERSION).unwrap_err();
        assert!(matches!(err, MigrationError::FutureVersion { .. }));
    }

    #[test]
    fn gap_in_chain_is_reported() {
        let mut reg = MigrationRegistry::new();
        reg.register(1, v1_to_v2);
        let err = reg.migrate(json!({}), 1, 3).unwrap_err();
        assert!(matches!(err, MigrationError::NoMigrationPath { from: 1, to: 3 }));
    }

    #[test]
    fn failing_step_propagates() {
        let mut reg = MigrationRegistry::new();
        reg.register(0, failing_step);
        assert!(matches!(
            reg.migrate(json!({}), 0, 1),
            Err(MigrationError::StepFailed { .. })
        ));
    }

    #[test]
    fn v2_to_v3_renames_clicks() {
        let data = json!({ "settings": { "autosave": false }, "stats": { "clicks": 12, "total_earned": 3.5 } });
        let migrated = v2_to_v3(data).unwrap();
        assert_eq!(migrated["stats"]["total_clicks"], json!(12));
        assert!(migrated["stats"].get("clicks").is_none());
        assert_eq!(migrated["settings"]["autosave"], json!(false));
        assert_eq!(migrated["settings"]["offline_progress"], json!(true));
        assert_eq!(migrated["themes"], json!([]));
    }

    #[test]
    fn non_object_data_fails() {
        assert!(v1_to_v2(json!([1, 2, 3])).is_err());
    }
}
