//! Out-of-band engine notifications.
//!
//! State changes reach consumers through `Engine::subscribe`. Everything
//! else that a presentation layer may want to surface (offline earnings,
//! timed events starting or ending, save failures) is an EngineEvent,
//! delivered to handlers registered with `Engine::on` for its kind.

use crate::{offline::OfflineReport, types::{ContentId, Millis}};
use serde::{Deserialize, Serialize};

/// Every notification the engine emits.
/// Variants are only ever appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    OfflineProgress {
        report: OfflineReport,
    },
    TimedEventStarted {
        id: ContentId,
        end_time: Millis,
        /// True when an already-live event of the same id was extended.
        refreshed: bool,
    },
    TimedEventExpired {
        id: ContentId,
        end_time: Millis,
    },
    Prestiged {
        gain: f64,
        prestige_level: f64,
    },
    SaveCompleted {
        used_fallback: bool,
    },
    SaveFailed {
        error: String,
    },
}

impl EngineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::OfflineProgress { .. }   => EventKind::OfflineProgress,
            Self::TimedEventStarted { .. } => EventKind::EventStarted,
            Self::TimedEventExpired { .. } => EventKind::EventExpired,
            Self::Prestiged { .. }         => EventKind::Prestige,
            Self::SaveCompleted { .. }     => EventKind::SaveCompleted,
            Self::SaveFailed { .. }        => EventKind::SaveFailed,
        }
    }
}

/// The channel a handler listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    OfflineProgress,
    EventStarted,
    EventExpired,
    Prestige,
    SaveCompleted,
    SaveFailed,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        Self::OfflineProgress,
        Self::EventStarted,
        Self::EventExpired,
        Self::Prestige,
        Self::SaveCompleted,
        Self::SaveFailed,
    ];

    /// Stable wire name, e.g. for a UI bridge.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OfflineProgress => "offline:progress",
            Self::EventStarted    => "event:started",
            Self::EventExpired    => "event:expired",
            Self::Prestige        => "prestige",
            Self::SaveCompleted   => "save:completed",
            Self::SaveFailed      => "save:failed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}
