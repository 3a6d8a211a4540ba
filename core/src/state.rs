//! GameState: the root aggregate the engine owns.
//!
//! RULE: only the action processor and the tick integration step mutate a
//! GameState held by an engine. Everything else reads snapshots.

use crate::{
    config::{ContentCatalog, SecondaryGeneratorDescriptor, UpgradeDescriptor},
    types::{ContentId, Millis},
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameState {
    pub currency:             f64,
    pub premium_currency:     f64,
    pub prestige_level:       f64,
    pub progression_currency: f64,
    pub generators:           Vec<Generator>,
    pub upgrades:             Vec<Upgrade>,
    pub secondary_generators: Vec<SecondaryGenerator>,
    pub secondary_upgrades:   Vec<Upgrade>,
    pub active_events:        Vec<ActiveEvent>,
    pub themes:               Vec<Theme>,
    pub settings:             Settings,
    pub stats:                Stats,
    pub last_tick_timestamp:  Millis,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Generator {
    pub id:          ContentId,
    pub count:       u64,
    pub base_rate:   f64,
    pub base_cost:   f64,
    pub cost_growth: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecondaryGenerator {
    pub id:          ContentId,
    pub count:       u64,
    pub base_rate:   f64,
    pub base_cost:   f64,
    pub cost_growth: f64,
    pub upkeep:      f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Upgrade {
    pub id:          ContentId,
    pub level:       UpgradeLevel,
    pub effect:      Effect,
    pub purchased:   bool,
    pub base_cost:   f64,
    pub cost_growth: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpgradeLevel {
    Tiered { tier: u32, max_tier: u32 },
    Infinite { level: u32 },
}

impl UpgradeLevel {
    /// How many times the effect applies.
    pub fn levels(&self) -> u32 {
        match *self {
            Self::Tiered { tier, .. } => tier,
            Self::Infinite { level } => level,
        }
    }

    pub fn is_maxed(&self) -> bool {
        matches!(*self, Self::Tiered { tier, max_tier } if tier >= max_tier)
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, Self::Infinite { .. })
    }

    /// The level after one more purchase, or None when already maxed.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Tiered { tier, max_tier } if tier < max_tier => Some(Self::Tiered {
                tier: tier + 1,
                max_tier,
            }),
            Self::Tiered { .. } => None,
            Self::Infinite { level } => Some(Self::Infinite { level: level.saturating_add(1) }),
        }
    }
}

/// Closed set of effect kinds shared by upgrades and timed events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    ClickMultiplier { magnitude: f64 },
    GeneratorMultiplier { target: ContentId, magnitude: f64 },
    GlobalMultiplier { magnitude: f64 },
    SecondaryMultiplier { magnitude: f64 },
    UpkeepReduction { magnitude: f64 },
}

impl Effect {
    pub fn magnitude(&self) -> f64 {
        match self {
            Self::ClickMultiplier { magnitude }
            | Self::GeneratorMultiplier { magnitude, .. }
            | Self::GlobalMultiplier { magnitude }
            | Self::SecondaryMultiplier { magnitude }
            | Self::UpkeepReduction { magnitude } => *magnitude,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveEvent {
    pub id:          ContentId,
    pub effect:      Effect,
    /// Absolute expiry. The event is live while `now < end_time`.
    pub end_time:    Millis,
    pub duration:    Millis,
}

impl ActiveEvent {
    pub fn is_live(&self, now: Millis) -> bool {
        now < self.end_time
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Theme {
    pub id:               ContentId,
    pub unlock_cost:      f64,
    pub unlocked:         bool,
    pub active:           bool,
    pub bonus_multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    pub autosave:         bool,
    pub offline_progress: bool,
    pub notifications:    bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self { autosave: true, offline_progress: true, notifications: true }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SettingKey {
    Autosave,
    OfflineProgress,
    Notifications,
}

impl Settings {
    pub fn set(&mut self, key: SettingKey, value: bool) {
        match key {
            SettingKey::Autosave        => self.autosave = value,
            SettingKey::OfflineProgress => self.offline_progress = value,
            SettingKey::Notifications   => self.notifications = value,
        }
    }
}

/// Lifetime counters. Never decrease, not even across prestige.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Stats {
    pub total_clicks:   u64,
    pub total_earned:   f64,
    pub prestige_count: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    Primary,
    Premium,
    Progression,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Primary     => "currency",
            Self::Premium     => "premium currency",
            Self::Progression => "progression currency",
        };
        f.write_str(name)
    }
}

impl GameState {
    /// A fresh run built from the content catalog.
    pub fn new(catalog: &ContentCatalog, now: Millis) -> Self {
        let mut state = Self {
            currency:             0.0,
            premium_currency:     0.0,
            prestige_level:       0.0,
            progression_currency: 0.0,
            generators:           Vec::new(),
            upgrades:             Vec::new(),
            secondary_generators: Vec::new(),
            secondary_upgrades:   Vec::new(),
            active_events:        Vec::new(),
            themes:               Vec::new(),
            settings:             Settings::default(),
            stats:                Stats::default(),
            last_tick_timestamp:  now,
        };
        state.sync_with_catalog(catalog);
        state
    }

    pub fn balance(&self, currency: Currency) -> f64 {
        match currency {
            Currency::Primary     => self.currency,
            Currency::Premium     => self.premium_currency,
            Currency::Progression => self.progression_currency,
        }
    }

    pub fn balance_mut(&mut self, currency: Currency) -> &mut f64 {
        match currency {
            Currency::Primary     => &mut self.currency,
            Currency::Premium     => &mut self.premium_currency,
            Currency::Progression => &mut self.progression_currency,
        }
    }

    /// Credit primary currency and the lifetime earnings counter together.
    pub fn earn(&mut self, amount: f64) {
        if amount > 0.0 {
            self.currency += amount;
            self.stats.total_earned += amount;
        }
    }

    pub fn generator(&self, id: &str) -> Option<&Generator> {
        self.generators.iter().find(|g| g.id == id)
    }

    pub fn upgrade(&self, id: &str) -> Option<&Upgrade> {
        self.upgrades.iter().find(|u| u.id == id)
    }

    pub fn active_theme(&self) -> Option<&Theme> {
        self.themes.iter().find(|t| t.active)
    }

    /// Append entries for descriptors the catalog has but this state lacks.
    /// Content additions are not schema changes, so they are reconciled
    /// here instead of by a migration. Returns how many entries were added.
    pub fn sync_with_catalog(&mut self, catalog: &ContentCatalog) -> usize {
        let mut added = 0;

        for desc in &catalog.generators {
            if self.generators.iter().all(|g| g.id != desc.id) {
                self.generators.push(Generator {
                    id:          desc.id.clone(),
                    count:       0,
                    base_rate:   desc.base_rate,
                    base_cost:   desc.base_cost,
                    cost_growth: desc.cost_growth,
                });
                added += 1;
            }
        }
        for desc in &catalog.upgrades {
            if self.upgrades.iter().all(|u| u.id != desc.id) {
                self.upgrades.push(upgrade_from(desc));
                added += 1;
            }
        }
        for desc in &catalog.secondary_generators {
            if self.secondary_generators.iter().all(|g| g.id != desc.id) {
                self.secondary_generators.push(secondary_from(desc));
                added += 1;
            }
        }
        for desc in &catalog.secondary_upgrades {
            if self.secondary_upgrades.iter().all(|u| u.id != desc.id) {
                self.secondary_upgrades.push(upgrade_from(desc));
                added += 1;
            }
        }
        for desc in &catalog.themes {
            if self.themes.iter().all(|t| t.id != desc.id) {
                self.themes.push(Theme {
                    id:               desc.id.clone(),
                    unlock_cost:      desc.unlock_cost,
                    unlocked:         false,
                    active:           false,
                    bonus_multiplier: desc.bonus_multiplier,
                });
                added += 1;
            }
        }
        added
    }

    /// Zero primary progression. Keeps the prestige counter, progression
    /// currency, the secondary economy, unlocked themes, infinite upgrade
    /// levels, settings and lifetime stats.
    pub fn prestige_reset(&mut self) {
        self.currency = 0.0;
        self.premium_currency = 0.0;
        for g in &mut self.generators {
            g.count = 0;
        }
        for u in &mut self.upgrades {
            if let UpgradeLevel::Tiered { max_tier, .. } = u.level {
                u.level = UpgradeLevel::Tiered { tier: 0, max_tier };
                u.purchased = false;
            }
        }
        self.stats.prestige_count += 1;
    }

    /// Check the invariants that must hold at every observable boundary.
    pub fn validate(&self) -> Result<(), String> {
        let balances = [
            ("currency", self.currency),
            ("premium_currency", self.premium_currency),
            ("prestige_level", self.prestige_level),
            ("progression_currency", self.progression_currency),
        ];
        for (name, value) in balances {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{name} is {value}"));
            }
        }

        let over_max = self
            .upgrades
            .iter()
            .chain(&self.secondary_upgrades)
            .find(|u| matches!(u.level, UpgradeLevel::Tiered { tier, max_tier } if tier > max_tier));
        if let Some(u) = over_max {
            return Err(format!("upgrade '{}' exceeds its max tier", u.id));
        }

        let active: Vec<_> = self.themes.iter().filter(|t| t.active).collect();
        if active.len() > 1 {
            return Err(format!("{} themes active at once", active.len()));
        }
        if let Some(t) = active.first() {
            if !t.unlocked {
                return Err(format!("theme '{}' is active but locked", t.id));
            }
        }
        Ok(())
    }
}

fn upgrade_from(desc: &UpgradeDescriptor) -> Upgrade {
    let level = match desc.max_tier {
        Some(max_tier) => UpgradeLevel::Tiered { tier: 0, max_tier },
        None => UpgradeLevel::Infinite { level: 0 },
    };
    Upgrade {
        id:          desc.id.clone(),
        level,
        effect:      desc.effect.clone(),
        purchased:   false,
        base_cost:   desc.base_cost,
        cost_growth: desc.cost_growth,
    }
}

fn secondary_from(desc: &SecondaryGeneratorDescriptor) -> SecondaryGenerator {
    SecondaryGenerator {
        id:          desc.id.clone(),
        count:       0,
        base_rate:   desc.base_rate,
        base_cost:   desc.base_cost,
        cost_growth: desc.cost_growth,
        upkeep:      desc.upkeep,
    }
}
