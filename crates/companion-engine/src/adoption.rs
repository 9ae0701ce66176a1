//! Creating a new companion.

use chrono::{DateTime, Utc};
use companion_types::{Attributes, Companion, CompanionId, GrowthStage, OwnerId};

use crate::config::EngineConfig;
use crate::error::EngineError;

/// Maximum name length in characters.
pub const MAX_NAME_CHARS: usize = 50;

/// Build a freshly adopted companion: full vitals, level 1, `Baby` stage.
///
/// Decay clocks start at `now` through `created_at`.
///
/// # Errors
///
/// Returns [`EngineError::InvalidName`] for a blank or overlong name.
pub fn adopt(
    owner_id: OwnerId,
    name: &str,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Result<Companion, EngineError> {
    let name = validate_name(name)?;
    let max = config.vitals.max_vital;
    Ok(Companion {
        id: CompanionId::new(),
        owner_id,
        name,
        hunger: max,
        happiness: max,
        health: max,
        intimacy: 0,
        experience: 0,
        level: 1,
        growth_stage: GrowthStage::Baby,
        sub_stage: 1,
        attributes: Attributes::default(),
        ultimate_form: None,
        last_feed_at: None,
        last_play_at: None,
        last_touch_at: None,
        hunger_decay_anchor: None,
        happiness_decay_anchor: None,
        exp_growth_anchor: None,
        created_at: now,
        updated_at: now,
        version: 0,
    })
}

fn validate_name(name: &str) -> Result<String, EngineError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidName {
            reason: String::from("name must not be empty"),
        });
    }
    if trimmed.chars().count() > MAX_NAME_CHARS {
        return Err(EngineError::InvalidName {
            reason: format!("name exceeds {MAX_NAME_CHARS} characters"),
        });
    }
    Ok(trimmed.to_owned())
}
