use crate::{
    state::Effect,
    types::{ContentId, Millis},
};
use serde::{Deserialize, Serialize};

pub const HOUR_MS: Millis = 60 * 60 * 1000;

// ── Engine tuning ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Nominal tick interval. Integration always uses real elapsed time.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_autosave_interval_ms")]
    pub autosave_interval_ms: u64,
    /// Upper bound on simulated time granted for a single absence.
    #[serde(default = "default_offline_cap_ms")]
    pub offline_cap_ms: Millis,
    #[serde(default = "default_event_roll_interval_ms")]
    pub event_roll_interval_ms: Millis,
    #[serde(default = "default_event_activation_chance")]
    pub event_activation_chance: f64,
    /// Floor on the primary currency's effective rate, per second.
    #[serde(default = "default_min_primary_rate")]
    pub min_primary_rate: f64,
    #[serde(default = "default_base_click_power")]
    pub base_click_power: f64,
    #[serde(default = "default_prestige_threshold")]
    pub prestige_threshold: f64,
    #[serde(default = "default_prestige_bonus_per_level")]
    pub prestige_bonus_per_level: f64,
    #[serde(default = "default_backup_keep")]
    pub backup_keep: usize,
    #[serde(default = "default_save_key")]
    pub save_key: String,
    #[serde(default = "default_pepper")]
    pub pepper: String,
    /// Master seed for event rolls. None draws one from the wall clock.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_tick_interval_ms() -> u64 { 250 }
fn default_autosave_interval_ms() -> u64 { 30_000 }
fn default_offline_cap_ms() -> Millis { 72 * HOUR_MS }
fn default_event_roll_interval_ms() -> Millis { 30_000 }
fn default_event_activation_chance() -> f64 { 0.05 }
fn default_min_primary_rate() -> f64 { 0.1 }
fn default_base_click_power() -> f64 { 1.0 }
fn default_prestige_threshold() -> f64 { 1_000_000.0 }
fn default_prestige_bonus_per_level() -> f64 { 0.02 }
fn default_backup_keep() -> usize { 3 }
fn default_save_key() -> String { "idlekeep_save".into() }
fn default_pepper() -> String { crate::checksum::DEFAULT_PEPPER.into() }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms:        default_tick_interval_ms(),
            autosave_interval_ms:    default_autosave_interval_ms(),
            offline_cap_ms:          default_offline_cap_ms(),
            event_roll_interval_ms:  default_event_roll_interval_ms(),
            event_activation_chance: default_event_activation_chance(),
            min_primary_rate:        default_min_primary_rate(),
            base_click_power:        default_base_click_power(),
            prestige_threshold:      default_prestige_threshold(),
            prestige_bonus_per_level: default_prestige_bonus_per_level(),
            backup_keep:             default_backup_keep(),
            save_key:                default_save_key(),
            pepper:                  default_pepper(),
            seed:                    None,
        }
    }
}

// ── Content descriptors ────────────────────────────────────────────
//
// Read-only tables supplied from outside the engine. The production model
// and event scheduler consume them; nothing writes back.

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratorDescriptor {
    pub id: ContentId,
    pub base_rate: f64,
    pub base_cost: f64,
    pub cost_growth: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecondaryGeneratorDescriptor {
    pub id: ContentId,
    pub base_rate: f64,
    pub base_cost: f64,
    pub cost_growth: f64,
    /// Primary currency consumed per owned unit per second.
    pub upkeep: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpgradeDescriptor {
    pub id: ContentId,
    pub effect: Effect,
    pub base_cost: f64,
    #[serde(default = "default_upgrade_growth")]
    pub cost_growth: f64,
    /// None makes the upgrade infinitely levelable.
    #[serde(default)]
    pub max_tier: Option<u32>,
}

fn default_upgrade_growth() -> f64 { 1.0 }

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventDefinition {
    pub id: ContentId,
    pub effect: Effect,
    pub duration_ms: Millis,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThemeDescriptor {
    pub id: ContentId,
    /// Paid in premium currency.
    pub unlock_cost: f64,
    pub bonus_multiplier: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContentCatalog {
    #[serde(default)]
    pub generators: Vec<GeneratorDescriptor>,
    #[serde(default)]
    pub upgrades: Vec<UpgradeDescriptor>,
    #[serde(default)]
    pub secondary_generators: Vec<SecondaryGeneratorDescriptor>,
    #[serde(default)]
    pub secondary_upgrades: Vec<UpgradeDescriptor>,
    #[serde(default)]
    pub events: Vec<EventDefinition>,
    #[serde(default)]
    pub themes: Vec<ThemeDescriptor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub engine: EngineConfig,
    pub catalog: ContentCatalog,
}

impl SimConfig {
    /// Load from the data/ directory.
    /// In tests, use SimConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let engine_path = format!("{data_dir}/engine.json");
        let engine_content = std::fs::read_to_string(&engine_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {engine_path}: {e}"))?;
        let engine: EngineConfig = serde_json::from_str(&engine_content)?;

        let catalog_path = format!("{data_dir}/catalog.json");
        let catalog_content = std::fs::read_to_string(&catalog_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {catalog_path}: {e}"))?;
        let catalog: ContentCatalog = serde_json::from_str(&catalog_content)?;

        let config = Self { engine, catalog };
        config.validate()?;
        Ok(config)
    }

    /// Reject tables the production model cannot work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let e = &self.engine;
        if e.tick_interval_ms == 0 {
            anyhow::bail!("tick_interval_ms must be positive");
        }
        if e.min_primary_rate <= 0.0 {
            anyhow::bail!("min_primary_rate must be positive, got {}", e.min_primary_rate);
        }
        if !(0.0..=1.0).contains(&e.event_activation_chance) {
            anyhow::bail!("event_activation_chance must be within [0, 1]");
        }
        if e.backup_keep == 0 {
            anyhow::bail!("backup_keep must be at least 1");
        }
        if e.offline_cap_ms < 0 {
            anyhow::bail!("offline_cap_ms must not be negative, got {}", e.offline_cap_ms);
        }
        if e.event_roll_interval_ms < 0 {
            anyhow::bail!("event_roll_interval_ms must not be negative, got {}", e.event_roll_interval_ms);
        }

        let mut seen = std::collections::HashSet::new();
        let ids = self.catalog.generators.iter().map(|g| &g.id)
            .chain(self.catalog.upgrades.iter().map(|u| &u.id))
            .chain(self.catalog.secondary_generators.iter().map(|g| &g.id))
            .chain(self.catalog.secondary_upgrades.iter().map(|u| &u.id))
            .chain(self.catalog.themes.iter().map(|t| &t.id));
        for id in ids {
            if !seen.insert(id.as_str()) {
                anyhow::bail!("duplicate content id '{id}'");
            }
        }
        for ev in &self.catalog.events {
            if ev.weight < 0.0 || ev.duration_ms <= 0 {
                anyhow::bail!("event '{}' needs a non-negative weight and positive duration", ev.id);
            }
        }
        Ok(())
    }

    /// Config with hardcoded defaults for use in unit tests.
    /// Event activation is disabled so only explicit tests see rolls.
    pub fn default_test() -> Self {
        Self {
            engine: EngineConfig {
                event_activation_chance: 0.0,
                seed: Some(42),
                ..EngineConfig::default()
            },
            catalog: ContentCatalog {
                generators: vec![
                    GeneratorDescriptor {
                        id: "cursor".into(),
                        base_rate: 0.1,
                        base_cost: 15.0,
                        cost_growth: 1.15,
                    },
                    GeneratorDescriptor {
                        id: "farm".into(),
                        base_rate: 1.0,
                        base_cost: 100.0,
                        cost_growth: 1.15,
                    },
                    GeneratorDescriptor {
                        id: "factory".into(),
                        base_rate: 8.0,
                        base_cost: 1_100.0,
                        cost_growth: 1.15,
                    },
                ],
                upgrades: vec![
                    UpgradeDescriptor {
                        id: "reinforced_fingers".into(),
                        effect: Effect::ClickMultiplier { magnitude: 2.0 },
                        base_cost: 100.0,
                        cost_growth: 5.0,
                        max_tier: Some(3),
                    },
                    UpgradeDescriptor {
                        id: "better_soil".into(),
                        effect: Effect::GeneratorMultiplier {
                            target: "farm".into(),
                            magnitude: 2.0,
                        },
                        base_cost: 1_000.0,
                        cost_growth: 10.0,
                        max_tier: Some(2),
                    },
                    UpgradeDescriptor {
                        id: "efficiency".into(),
                        effect: Effect::GlobalMultiplier { magnitude: 1.1 },
                        base_cost: 500.0,
                        cost_growth: 1.5,
                        max_tier: None,
                    },
                ],
                secondary_generators: vec![SecondaryGeneratorDescriptor {
                    id: "lab".into(),
                    base_rate: 0.5,
                    base_cost: 200.0,
                    cost_growth: 1.2,
                    upkeep: 0.4,
                }],
                secondary_upgrades: vec![
                    UpgradeDescriptor {
                        id: "lean_labs".into(),
                        effect: Effect::UpkeepReduction { magnitude: 0.5 },
                        base_cost: 50.0,
                        cost_growth: 2.0,
                        max_tier: Some(2),
                    },
                    UpgradeDescriptor {
                        id: "grant_writing".into(),
                        effect: Effect::SecondaryMultiplier { magnitude: 2.0 },
                        base_cost: 25.0,
                        cost_growth: 3.0,
                        max_tier: None,
                    },
                ],
                events: vec![
                    EventDefinition {
                        id: "golden_hour".into(),
                        effect: Effect::GlobalMultiplier { magnitude: 7.0 },
                        duration_ms: 77_000,
                        weight: 3.0,
                    },
                    EventDefinition {
                        id: "click_frenzy".into(),
                        effect: Effect::ClickMultiplier { magnitude: 777.0 },
                        duration_ms: 13_000,
                        weight: 1.0,
                    },
                ],
                themes: vec![
                    ThemeDescriptor {
                        id: "midnight".into(),
                        unlock_cost: 1.0,
                        bonus_multiplier: 1.05,
                    },
                    ThemeDescriptor {
                        id: "aurora".into(),
                        unlock_cost: 3.0,
                        bonus_multiplier: 1.10,
                    },
                ],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validates() {
        SimConfig::default_test().validate().expect("default_test must validate");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut config = SimConfig::default_test();
        config.catalog.themes[1].id = "cursor".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_durations_are_rejected() {
        let mut config = SimConfig::default_test();
        config.engine.offline_cap_ms = -1;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default_test();
        config.engine.event_roll_interval_ms = -30_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_engine_fields_take_defaults() {
        let engine: EngineConfig = serde_json::from_str(r#"{ "tick_interval_ms": 100 }"#).unwrap();
        assert_eq!(engine.tick_interval_ms, 100);
        assert_eq!(engine.offline_cap_ms, 72 * HOUR_MS);
        assert_eq!(engine.backup_keep, 3);
    }
}
