//! Experience, levels, growth stages and the ultimate form.
//!
//! # Level-Up Formula
//!
//! Experience required to advance from level N to level N+1 is
//! `N * exp_per_level` (100 by default). Surplus experience carries over, so
//! one large grant can raise several levels at once.
//!
//! Every `levels_per_sub_stage`-th level advances the sub-stage; wrapping past
//! the last sub-stage advances the growth stage. At the terminal stage the
//! sub-stage holds at its maximum. The ultimate form is chosen the first time
//! the companion is observed at the terminal stage and is never replaced.

use companion_types::{Attributes, Companion, UltimateForm};
use tracing::info;

use crate::config::ProgressionConfig;
use crate::error::EngineError;

/// What a level-up pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelReport {
    /// Levels gained.
    pub levels_gained: u32,
    /// Growth stage advances.
    pub stages_gained: u32,
    /// Form selected during this pass, if any.
    pub form_selected: Option<UltimateForm>,
}

impl LevelReport {
    /// Fold another report into this one.
    pub fn merge(&mut self, other: Self) {
        self.levels_gained = self.levels_gained.saturating_add(other.levels_gained);
        self.stages_gained = self.stages_gained.saturating_add(other.stages_gained);
        if other.form_selected.is_some() {
            self.form_selected = other.form_selected;
        }
    }
}

/// Add experience and run the level-up loop.
///
/// # Errors
///
/// Returns [`EngineError::ArithmeticOverflow`] if experience or level
/// overflow.
pub fn grant_experience(
    companion: &mut Companion,
    amount: u64,
    config: &ProgressionConfig,
) -> Result<LevelReport, EngineError> {
    companion.experience =
        companion
            .experience
            .checked_add(amount)
            .ok_or_else(|| EngineError::ArithmeticOverflow {
                context: String::from("experience grant overflow"),
            })?;
    level_up(companion, config)
}

/// Consume experience into levels while it covers the current threshold.
///
/// Idempotent: a second call without new experience changes nothing.
pub fn level_up(
    companion: &mut Companion,
    config: &ProgressionConfig,
) -> Result<LevelReport, EngineError> {
    let mut report = LevelReport::default();

    loop {
        let threshold = u64::from(companion.level)
            .checked_mul(config.exp_per_level)
            .ok_or_else(|| EngineError::ArithmeticOverflow {
                context: String::from("level threshold overflow"),
            })?;
        if companion.experience < threshold {
            break;
        }

        companion.experience = companion.experience.saturating_sub(threshold);
        companion.level =
            companion
                .level
                .checked_add(1)
                .ok_or_else(|| EngineError::ArithmeticOverflow {
                    context: String::from("level overflow"),
                })?;
        companion.attributes.spirit = companion.attributes.spirit.saturating_add(1);
        report.levels_gained = report.levels_gained.saturating_add(1);

        if companion
            .level
            .checked_rem(config.levels_per_sub_stage)
            .is_some_and(|r| r == 0)
            && advance_sub_stage(companion, config)
        {
            report.stages_gained = report.stages_gained.saturating_add(1);
        }
    }

    report.form_selected = settle_ultimate_form(companion);

    if report.levels_gained > 0 {
        info!(
            companion_id = %companion.id,
            level = companion.level,
            stage = %companion.growth_stage,
            sub_stage = companion.sub_stage,
            levels_gained = report.levels_gained,
            "companion levelled up"
        );
    }
    Ok(report)
}

/// Advance the sub-stage, wrapping into the next growth stage.
///
/// Returns `true` if the growth stage changed.
fn advance_sub_stage(companion: &mut Companion, config: &ProgressionConfig) -> bool {
    if companion.sub_stage < config.sub_stages_per_stage {
        companion.sub_stage = companion.sub_stage.saturating_add(1);
        return false;
    }
    match companion.growth_stage.next() {
        Some(next) => {
            companion.growth_stage = next;
            companion.sub_stage = 1;
            true
        }
        // Terminal stage: hold at the last sub-stage.
        None => {
            companion.sub_stage = config.sub_stages_per_stage;
            false
        }
    }
}

/// Select the ultimate form if the companion is at the terminal stage and
/// has none yet. Returns the newly selected form.
pub fn settle_ultimate_form(companion: &mut Companion) -> Option<UltimateForm> {
    if !companion.growth_stage.is_terminal() || companion.ultimate_form.is_some() {
        return None;
    }
    let form = dominant_form(&companion.attributes);
    companion.ultimate_form = Some(form);
    info!(companion_id = %companion.id, form = %form, "ultimate form selected");
    Some(form)
}

/// Form matching the highest attribute.
///
/// Ties resolve in the order strength, intelligence, agility, spirit, charm.
pub fn dominant_form(attributes: &Attributes) -> UltimateForm {
    let ranked = [
        (attributes.strength, UltimateForm::Dragon),
        (attributes.intelligence, UltimateForm::Taotie),
        (attributes.agility, UltimateForm::Phoenix),
        (attributes.spirit, UltimateForm::Angel),
        (attributes.charm, UltimateForm::Qilin),
    ];
    ranked
        .into_iter()
        .reduce(|best, candidate| if candidate.0 > best.0 { candidate } else { best })
        .map_or(UltimateForm::Dragon, |(_, form)| form)
}
