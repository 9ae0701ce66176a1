//! Enumeration types shared by the engine, the service layer and the store.
//!
//! Every enum has a stable lowercase string form (`as_str` / [`FromStr`])
//! that is used both for serde and for the database columns.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Error returned when a stored string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

// ---------------------------------------------------------------------------
// Growth stage
// ---------------------------------------------------------------------------

/// Ordered growth stages a companion passes through.
///
/// The ordering of the variants is the progression order; `Peak` is the
/// terminal stage at which the ultimate form is chosen.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum GrowthStage {
    /// Freshly adopted.
    Baby,
    /// First growth stage.
    Child,
    /// Adolescent stage.
    Teen,
    /// Fully grown.
    Adult,
    /// Past adulthood, approaching the peak.
    Prime,
    /// Terminal stage.
    Peak,
}

impl GrowthStage {
    /// All stages in progression order.
    pub const ALL: [Self; 6] = [
        Self::Baby,
        Self::Child,
        Self::Teen,
        Self::Adult,
        Self::Prime,
        Self::Peak,
    ];

    /// The stage after this one, or `None` at the terminal stage.
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Baby => Some(Self::Child),
            Self::Child => Some(Self::Teen),
            Self::Teen => Some(Self::Adult),
            Self::Adult => Some(Self::Prime),
            Self::Prime => Some(Self::Peak),
            Self::Peak => None,
        }
    }

    /// Whether this is the terminal stage.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Peak)
    }

    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Baby => "baby",
            Self::Child => "child",
            Self::Teen => "teen",
            Self::Adult => "adult",
            Self::Prime => "prime",
            Self::Peak => "peak",
        }
    }
}

impl fmt::Display for GrowthStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrowthStage {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "growth stage",
                value: s.to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// Ultimate form
// ---------------------------------------------------------------------------

/// Terminal specialization chosen once when a companion reaches
/// [`GrowthStage::Peak`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum UltimateForm {
    /// Chosen when strength dominates.
    Dragon,
    /// Chosen when intelligence dominates.
    Taotie,
    /// Chosen when spirit dominates.
    Angel,
    /// Chosen when agility dominates.
    Phoenix,
    /// Chosen when charm dominates.
    Qilin,
}

impl UltimateForm {
    /// All forms.
    pub const ALL: [Self; 5] = [
        Self::Dragon,
        Self::Taotie,
        Self::Angel,
        Self::Phoenix,
        Self::Qilin,
    ];

    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dragon => "dragon",
            Self::Taotie => "taotie",
            Self::Angel => "angel",
            Self::Phoenix => "phoenix",
            Self::Qilin => "qilin",
        }
    }
}

impl fmt::Display for UltimateForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UltimateForm {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|form| form.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "ultimate form",
                value: s.to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// A player action gated by its own cooldown.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ActionKind {
    /// Give food: raises hunger (satiety) and a little health.
    Feed,
    /// Play: raises happiness, costs a little hunger.
    Play,
    /// Pet the companion: raises intimacy and a little happiness.
    Touch,
}

impl ActionKind {
    /// All action kinds.
    pub const ALL: [Self; 3] = [Self::Feed, Self::Play, Self::Touch];

    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Feed => "feed",
            Self::Play => "play",
            Self::Touch => "touch",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "action kind",
                value: s.to_owned(),
            })
    }
}

// ---------------------------------------------------------------------------
// Vitals
// ---------------------------------------------------------------------------

/// A bounded vital field of a companion record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Vital {
    /// Satiety; decays on its own cycle.
    Hunger,
    /// Mood; decays while hunger is low.
    Happiness,
    /// Derived from hunger, raised only by actions.
    Health,
    /// Bond with the owner; never decays.
    Intimacy,
}

impl Vital {
    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hunger => "hunger",
            Self::Happiness => "happiness",
            Self::Health => "health",
            Self::Intimacy => "intimacy",
        }
    }
}

impl fmt::Display for Vital {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ChatSender {
    /// The owner typed it.
    Owner,
    /// The companion replied.
    Companion,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_stages_are_ordered() {
        assert!(GrowthStage::Baby < GrowthStage::Child);
        assert!(GrowthStage::Prime < GrowthStage::Peak);
        assert_eq!(GrowthStage::Prime.next(), Some(GrowthStage::Peak));
        assert_eq!(GrowthStage::Peak.next(), None);
        assert!(GrowthStage::Peak.is_terminal());
    }

    #[test]
    fn string_forms_roundtrip() {
        for stage in GrowthStage::ALL {
            assert_eq!(stage.as_str().parse::<GrowthStage>().ok(), Some(stage));
        }
        for form in UltimateForm::ALL {
            assert_eq!(form.as_str().parse::<UltimateForm>().ok(), Some(form));
        }
        for kind in ActionKind::ALL {
            assert_eq!(kind.as_str().parse::<ActionKind>().ok(), Some(kind));
        }
    }

    #[test]
    fn unknown_string_is_rejected() {
        let err = "larva".parse::<GrowthStage>();
        assert_eq!(
            err,
            Err(ParseEnumError {
                kind: "growth stage",
                value: String::from("larva"),
            })
        );
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&GrowthStage::Teen).ok();
        assert_eq!(json.as_deref(), Some("\"teen\""));
        let json = serde_json::to_string(&ActionKind::Touch).ok();
        assert_eq!(json.as_deref(), Some("\"touch\""));
    }
}
