use crate::{
    action::{self, ActionContext},
    error::ActionResult,
    state::{GameState, SettingKey},
    types::ContentId,
};
use serde::{Deserialize, Serialize};

/// All player-issued commands.
/// Variants are only ever appended, never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum PlayerCommand {
    // ── Primary economy ───────────────────────────
    Click,
    BuyGenerator { id: ContentId, quantity: u32 },
    BuyUpgrade { id: ContentId },

    // ── Secondary economy ─────────────────────────
    BuySecondaryGenerator { id: ContentId, quantity: u32 },
    BuySecondaryUpgrade { id: ContentId },

    // ── Themes ────────────────────────────────────
    UnlockTheme { id: ContentId },
    ActivateTheme { id: ContentId },
    DeactivateTheme,

    // ── Meta ──────────────────────────────────────
    Prestige,
    SetSetting { key: SettingKey, value: bool },
}

/// What a successful command did.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandReceipt {
    Clicked { earned: f64 },
    Purchased { id: ContentId, requested: u32, purchased: u32 },
    UpgradeLevel { id: ContentId, level: u32 },
    ThemeChanged,
    Prestiged { gain: f64 },
    SettingChanged,
}

impl PlayerCommand {
    /// Stable name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Click                      => "click",
            Self::BuyGenerator { .. }        => "buy_generator",
            Self::BuyUpgrade { .. }          => "buy_upgrade",
            Self::BuySecondaryGenerator { .. } => "buy_secondary_generator",
            Self::BuySecondaryUpgrade { .. } => "buy_secondary_upgrade",
            Self::UnlockTheme { .. }         => "unlock_theme",
            Self::ActivateTheme { .. }       => "activate_theme",
            Self::DeactivateTheme            => "deactivate_theme",
            Self::Prestige                   => "prestige",
            Self::SetSetting { .. }          => "set_setting",
        }
    }

    /// Whether the result is worth persisting right away.
    pub fn is_significant(&self) -> bool {
        matches!(
            self,
            Self::BuyUpgrade { .. }
                | Self::BuySecondaryUpgrade { .. }
                | Self::UnlockTheme { .. }
                | Self::Prestige
                | Self::SetSetting { .. }
        )
    }

    /// Evaluate the command as a pure intent against `state`.
    pub fn apply(
        &self,
        state: &GameState,
        ctx: &ActionContext<'_>,
    ) -> ActionResult<(GameState, CommandReceipt)> {
        match self {
            Self::Click => {
                let (next, earned) = action::click(state, ctx)?;
                Ok((next, CommandReceipt::Clicked { earned }))
            }
            Self::BuyGenerator { id, quantity } => {
                let (next, purchased) = action::buy_generators(state, id, *quantity)?;
                Ok((next, purchased_receipt(id, *quantity, purchased)))
            }
            Self::BuySecondaryGenerator { id, quantity } => {
                let (next, purchased) = action::buy_secondary_generators(state, id, *quantity)?;
                Ok((next, purchased_receipt(id, *quantity, purchased)))
            }
            Self::BuyUpgrade { id } => {
                let (next, level) = action::buy_upgrade(state, id)?;
                Ok((next, CommandReceipt::UpgradeLevel { id: id.clone(), level }))
            }
            Self::BuySecondaryUpgrade { id } => {
                let (next, level) = action::buy_secondary_upgrade(state, id)?;
                Ok((next, CommandReceipt::UpgradeLevel { id: id.clone(), level }))
            }
            Self::UnlockTheme { id } => {
                Ok((action::unlock_theme(state, id)?, CommandReceipt::ThemeChanged))
            }
            Self::ActivateTheme { id } => {
                Ok((action::activate_theme(state, id)?, CommandReceipt::ThemeChanged))
            }
            Self::DeactivateTheme => {
                Ok((action::deactivate_theme(state)?, CommandReceipt::ThemeChanged))
            }
            Self::Prestige => {
                let (next, gain) = action::prestige(state, ctx.config)?;
                Ok((next, CommandReceipt::Prestiged { gain }))
            }
            Self::SetSetting { key, value } => {
                Ok((action::set_setting(state, *key, *value)?, CommandReceipt::SettingChanged))
            }
        }
    }
}

fn purchased_receipt(id: &ContentId, requested: u32, purchased: u32) -> CommandReceipt {
    CommandReceipt::Purchased { id: id.clone(), requested, purchased }
}
