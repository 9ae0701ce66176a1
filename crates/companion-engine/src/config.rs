//! Tunable parameters for decay, cooldowns, actions, progression and chat.
//!
//! [`EngineConfig`] bundles every tunable so that callers (service, sweep,
//! tests) can override defaults. It deserializes from the `engine` section
//! of `companion-config.yaml`; every field has a default so a partial
//! section is valid.
//!
//! Durations are configured in whole minutes and converted to
//! [`TimeDelta`] through the accessor methods.

use chrono::TimeDelta;
use companion_types::ActionKind;
use serde::Deserialize;

use crate::error::EngineError;

/// Full engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Vital bounds, decay cycles and thresholds.
    pub vitals: VitalsConfig,
    /// Per-action cooldowns and effects.
    pub actions: ActionsConfig,
    /// Experience growth and level-up parameters.
    pub progression: ProgressionConfig,
    /// Chat reward parameters.
    pub chat: ChatConfig,
}

impl EngineConfig {
    /// Reject configurations that would break the engine invariants.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] for zero cycle lengths, zero
    /// level thresholds or thresholds above the vital maximum.
    pub fn validate(&self) -> Result<(), EngineError> {
        let v = &self.vitals;
        if v.max_vital == 0 {
            return Err(invalid("vitals.max_vital must be at least 1"));
        }
        if v.hunger_cycle_minutes == 0 || v.happiness_cycle_minutes == 0 {
            return Err(invalid("decay cycle lengths must be at least 1 minute"));
        }
        if v.happiness_hunger_threshold > v.max_vital || v.health_hunger_threshold > v.max_vital {
            return Err(invalid("hunger thresholds cannot exceed vitals.max_vital"));
        }

        let p = &self.progression;
        if p.exp_cycle_minutes == 0 {
            return Err(invalid("progression.exp_cycle_minutes must be at least 1"));
        }
        if p.exp_per_level == 0 || p.levels_per_sub_stage == 0 || p.sub_stages_per_stage == 0 {
            return Err(invalid("progression thresholds must be at least 1"));
        }
        if p.mid_band_hunger > p.high_band_hunger {
            return Err(invalid(
                "progression.mid_band_hunger cannot exceed progression.high_band_hunger",
            ));
        }

        if self.chat.min_exp_reward > self.chat.max_exp_reward {
            return Err(invalid("chat.min_exp_reward cannot exceed chat.max_exp_reward"));
        }

        for kind in ActionKind::ALL {
            minutes(self.actions.effect(kind).cooldown_minutes)?;
        }
        self.vitals.hunger_cycle()?;
        self.vitals.happiness_cycle()?;
        self.progression.exp_cycle()?;
        Ok(())
    }
}

fn invalid(reason: &str) -> EngineError {
    EngineError::InvalidConfig {
        reason: reason.to_owned(),
    }
}

/// Convert a whole number of minutes into a [`TimeDelta`].
///
/// # Errors
///
/// Returns [`EngineError::InvalidConfig`] if the value does not fit.
pub fn minutes(value: u64) -> Result<TimeDelta, EngineError> {
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_minutes)
        .ok_or_else(|| EngineError::InvalidConfig {
            reason: format!("{value} minutes is out of range"),
        })
}

// ---------------------------------------------------------------------------
// Vitals
// ---------------------------------------------------------------------------

/// Bounds and decay parameters for hunger, happiness and health.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VitalsConfig {
    /// Upper bound of hunger, happiness and health (default: 10).
    pub max_vital: u32,
    /// Upper bound of intimacy (default: 100).
    pub max_intimacy: u32,
    /// Minutes per hunger decay cycle (default: 180).
    pub hunger_cycle_minutes: u64,
    /// Minutes per happiness decay cycle (default: 120).
    pub happiness_cycle_minutes: u64,
    /// Happiness only decays while hunger is below this value (default: 7).
    pub happiness_hunger_threshold: u32,
    /// Starvation starts harming health below this hunger value (default: 5).
    pub health_hunger_threshold: u32,
}

impl Default for VitalsConfig {
    fn default() -> Self {
        Self {
            max_vital: 10,
            max_intimacy: 100,
            hunger_cycle_minutes: 180,
            happiness_cycle_minutes: 120,
            happiness_hunger_threshold: 7,
            health_hunger_threshold: 5,
        }
    }
}

impl VitalsConfig {
    /// Length of one hunger decay cycle.
    pub fn hunger_cycle(&self) -> Result<TimeDelta, EngineError> {
        minutes(self.hunger_cycle_minutes)
    }

    /// Length of one happiness decay cycle.
    pub fn happiness_cycle(&self) -> Result<TimeDelta, EngineError> {
        minutes(self.happiness_cycle_minutes)
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Cooldown and vital deltas of a single action kind.
///
/// Deltas are signed; every application is clamped to the vital bounds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ActionEffect {
    /// Minimum minutes between two successful runs of this action.
    pub cooldown_minutes: u64,
    /// Change applied to hunger.
    pub hunger: i32,
    /// Change applied to happiness.
    pub happiness: i32,
    /// Change applied to health.
    pub health: i32,
    /// Change applied to intimacy.
    pub intimacy: i32,
    /// Experience granted.
    pub experience: u64,
}

impl Default for ActionEffect {
    fn default() -> Self {
        Self {
            cooldown_minutes: 60,
            hunger: 0,
            happiness: 0,
            health: 0,
            intimacy: 0,
            experience: 0,
        }
    }
}

impl ActionEffect {
    /// Cooldown window of the action.
    pub fn cooldown(&self) -> Result<TimeDelta, EngineError> {
        minutes(self.cooldown_minutes)
    }

    /// The headline increment recorded in the audit log: the largest
    /// positive delta of the effect.
    pub fn action_value(&self) -> u32 {
        [self.hunger, self.happiness, self.health, self.intimacy]
            .into_iter()
            .max()
            .and_then(|delta| u32::try_from(delta).ok())
            .unwrap_or(0)
    }
}

/// Effects of every action kind.
///
/// Overriding an action in YAML replaces its whole effect: fields left out
/// fall back to [`ActionEffect::default`], not to the built-in action.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    /// Feeding: 8h cooldown, hunger +3, health +1, 10 experience.
    pub feed: ActionEffect,
    /// Playing: 4h cooldown, happiness +3, hunger -1, 15 experience.
    pub play: ActionEffect,
    /// Touching: 2h cooldown, intimacy +5, happiness +1, 5 experience.
    pub touch: ActionEffect,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            feed: ActionEffect {
                cooldown_minutes: 8 * 60,
                hunger: 3,
                health: 1,
                experience: 10,
                ..ActionEffect::default()
            },
            play: ActionEffect {
                cooldown_minutes: 4 * 60,
                happiness: 3,
                hunger: -1,
                experience: 15,
                ..ActionEffect::default()
            },
            touch: ActionEffect {
                cooldown_minutes: 2 * 60,
                intimacy: 5,
                happiness: 1,
                experience: 5,
                ..ActionEffect::default()
            },
        }
    }
}

impl ActionsConfig {
    /// Effect configured for the given action kind.
    pub const fn effect(&self, kind: ActionKind) -> &ActionEffect {
        match kind {
            ActionKind::Feed => &self.feed,
            ActionKind::Play => &self.play,
            ActionKind::Touch => &self.touch,
        }
    }
}

// ---------------------------------------------------------------------------
// Progression
// ---------------------------------------------------------------------------

/// Experience growth and level/stage thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    /// Minutes per passive experience growth cycle (default: 10).
    pub exp_cycle_minutes: u64,
    /// Experience needed per level, multiplied by the current level (default: 100).
    pub exp_per_level: u64,
    /// Every this many levels the sub-stage advances (default: 3).
    pub levels_per_sub_stage: u32,
    /// Number of sub-stages in one growth stage (default: 3).
    pub sub_stages_per_stage: u32,
    /// Hunger at or above this earns `high_band_exp` per cycle (default: 9).
    pub high_band_hunger: u32,
    /// Experience per cycle in the high band (default: 2).
    pub high_band_exp: u64,
    /// Hunger at or above this earns `mid_band_exp` per cycle (default: 7).
    pub mid_band_hunger: u32,
    /// Experience per cycle in the mid band (default: 1).
    pub mid_band_exp: u64,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            exp_cycle_minutes: 10,
            exp_per_level: 100,
            levels_per_sub_stage: 3,
            sub_stages_per_stage: 3,
            high_band_hunger: 9,
            high_band_exp: 2,
            mid_band_hunger: 7,
            mid_band_exp: 1,
        }
    }
}

impl ProgressionConfig {
    /// Length of one experience growth cycle.
    pub fn exp_cycle(&self) -> Result<TimeDelta, EngineError> {
        minutes(self.exp_cycle_minutes)
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Chat reply priority thresholds and reward bounds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// A vital at or below this value counts as low for reply priority (default: 3).
    pub low_vital_threshold: u32,
    /// Largest happiness bonus granted per chat turn (default: 1).
    pub max_happiness_reward: u32,
    /// Smallest experience bonus granted per chat turn (default: 1).
    pub min_exp_reward: u64,
    /// Largest experience bonus granted per chat turn (default: 5).
    pub max_exp_reward: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            low_vital_threshold: 3,
            max_happiness_reward: 1,
            min_exp_reward: 1,
            max_exp_reward: 5,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.vitals.max_vital, 10);
        assert_eq!(cfg.vitals.hunger_cycle_minutes, 180);
        assert_eq!(cfg.actions.feed.cooldown_minutes, 480);
        assert_eq!(cfg.progression.exp_per_level, 100);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn action_value_is_largest_positive_delta() {
        let cfg = ActionsConfig::default();
        assert_eq!(cfg.feed.action_value(), 3);
        assert_eq!(cfg.play.action_value(), 3);
        assert_eq!(cfg.touch.action_value(), 5);
        assert_eq!(ActionEffect::default().action_value(), 0);
    }

    #[test]
    fn zero_cycle_is_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.vitals.hunger_cycle_minutes = 0;
        assert!(matches!(
            cfg.validate(),
            Err(EngineError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn threshold_above_max_is_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.vitals.health_hunger_threshold = 11;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_section_fills_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"vitals": {"max_vital": 100}}"#).unwrap();
        assert_eq!(cfg.vitals.max_vital, 100);
        assert_eq!(cfg.vitals.hunger_cycle_minutes, 180);
        assert_eq!(cfg.actions.touch.intimacy, 5);
    }

    #[test]
    fn minutes_converts() {
        assert_eq!(minutes(180).unwrap(), TimeDelta::hours(3));
        assert!(minutes(u64::MAX).is_err());
    }
}
