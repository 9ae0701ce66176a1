//! Core entity structs: the companion vitals record, the action audit entry
//! and chat messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ActionKind, ChatSender, GrowthStage, UltimateForm};
use crate::ids::{AuditEntryId, ChatMessageId, CompanionId, OwnerId};

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// Trainable attributes. The dominant attribute decides the ultimate form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Attributes {
    /// Trained by feeding.
    pub strength: u32,
    /// Trained by chatting.
    pub intelligence: u32,
    /// Trained by playing.
    pub agility: u32,
    /// Trained by levelling up.
    pub spirit: u32,
    /// Trained by touching.
    pub charm: u32,
}

impl Attributes {
    /// Starting value of every attribute for a newly adopted companion.
    pub const STARTING_VALUE: u32 = 10;
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            strength: Self::STARTING_VALUE,
            intelligence: Self::STARTING_VALUE,
            agility: Self::STARTING_VALUE,
            spirit: Self::STARTING_VALUE,
            charm: Self::STARTING_VALUE,
        }
    }
}

// ---------------------------------------------------------------------------
// Companion (vitals record)
// ---------------------------------------------------------------------------

/// The persistent vitals record of one companion.
///
/// This is plain data. Time-driven mutation lives in `companion-engine`;
/// the record only carries the anchors the engine measures elapsed time
/// from. Decay anchors (`*_decay_anchor`, `exp_growth_anchor`) are distinct
/// from the action timestamps (`last_*_at`) used by the cooldown gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Companion {
    /// Unique companion identifier.
    pub id: CompanionId,
    /// Account that adopted this companion.
    pub owner_id: OwnerId,
    /// Display name chosen at adoption.
    pub name: String,

    /// Satiety in `[0, max_vital]`. Higher is better.
    pub hunger: u32,
    /// Mood in `[0, max_vital]`.
    pub happiness: u32,
    /// Health in `[0, max_vital]`.
    pub health: u32,
    /// Bond with the owner in `[0, 100]`. Never decays.
    pub intimacy: u32,

    /// Experience accumulated towards the next level.
    pub experience: u64,
    /// Current level (starts at 1).
    pub level: u32,
    /// Current growth stage.
    pub growth_stage: GrowthStage,
    /// Sub-stage within the growth stage (1..=3).
    pub sub_stage: u32,
    /// Trainable attributes.
    pub attributes: Attributes,
    /// Terminal form, set once on reaching [`GrowthStage::Peak`].
    pub ultimate_form: Option<UltimateForm>,

    /// Last successful (or capped) feed.
    pub last_feed_at: Option<DateTime<Utc>>,
    /// Last successful (or capped) play.
    pub last_play_at: Option<DateTime<Utc>>,
    /// Last successful (or capped) touch.
    pub last_touch_at: Option<DateTime<Utc>>,

    /// Reference instant for hunger decay cycles (`created_at` when unset).
    pub hunger_decay_anchor: Option<DateTime<Utc>>,
    /// Reference instant for happiness decay cycles (`created_at` when unset).
    pub happiness_decay_anchor: Option<DateTime<Utc>>,
    /// Reference instant for experience growth cycles (`created_at` when unset).
    pub exp_growth_anchor: Option<DateTime<Utc>>,

    /// Adoption time.
    pub created_at: DateTime<Utc>,
    /// Last time the record was written.
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency counter, bumped by the store on every save.
    pub version: u64,
}

impl Companion {
    /// Snapshot of the bounded vitals, used for audit before/after values.
    pub const fn vitals(&self) -> VitalsSnapshot {
        VitalsSnapshot {
            hunger: self.hunger,
            happiness: self.happiness,
            health: self.health,
            intimacy: self.intimacy,
        }
    }

    /// Last time the given action succeeded, if ever.
    pub const fn last_action_at(&self, kind: ActionKind) -> Option<DateTime<Utc>> {
        match kind {
            ActionKind::Feed => self.last_feed_at,
            ActionKind::Play => self.last_play_at,
            ActionKind::Touch => self.last_touch_at,
        }
    }
}

/// The bounded vitals at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct VitalsSnapshot {
    /// Satiety.
    pub hunger: u32,
    /// Mood.
    pub happiness: u32,
    /// Health.
    pub health: u32,
    /// Bond with the owner.
    pub intimacy: u32,
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

/// Immutable record of one executed action.
///
/// Written in the same transaction as the record it describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AuditEntry {
    /// Unique entry identifier.
    pub id: AuditEntryId,
    /// Companion the action was applied to.
    pub companion_id: CompanionId,
    /// Which action ran.
    pub action: ActionKind,
    /// Primary increment of the action (e.g. `3` for a feed).
    pub action_value: u32,
    /// Vitals after catch-up, before the action applied.
    pub before: VitalsSnapshot,
    /// Vitals after the action applied.
    pub after: VitalsSnapshot,
    /// When the action ran.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// One message of a chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChatMessage {
    /// Unique message identifier.
    pub id: ChatMessageId,
    /// Companion the conversation belongs to.
    pub companion_id: CompanionId,
    /// Author of the message.
    pub sender: ChatSender,
    /// Message text.
    pub text: String,
    /// When the message was sent.
    pub created_at: DateTime<Utc>,
}
