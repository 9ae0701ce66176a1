//! Feed, play and touch.
//!
//! [`execute`] runs one player action against a record:
//!
//! 1. Catch up decay to `now`.
//! 2. Check the action's cooldown. A rejection is an outcome, not an error;
//!    the caught-up record is still worth persisting.
//! 3. Apply the configured deltas, clamped to the vital bounds.
//! 4. Refresh the action timestamp. Feed restarts the hunger clock, play
//!    restarts the happiness clock.
//! 5. Train the action's attribute, grant experience, re-run the starvation
//!    rule.
//! 6. Produce the audit entry the caller persists with the record.
//!
//! An allowed action on a vital that is already full still succeeds and
//! still refreshes its timestamp.

use chrono::{DateTime, TimeDelta, Utc};
use companion_types::{ActionKind, AuditEntry, AuditEntryId, Companion, VitalsSnapshot};
use tracing::{debug, info};

use crate::config::{ActionEffect, EngineConfig};
use crate::cooldown;
use crate::decay::{AdvanceReport, advance, rebase_lifted};
use crate::derived::apply_health_rule;
use crate::error::EngineError;
use crate::progression::{LevelReport, grant_experience};

/// How an action attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The effect was applied and the action timestamp refreshed.
    Applied {
        /// Every vital the action raises was already at its maximum.
        capped: bool,
    },
    /// Rejected by the cooldown gate.
    Cooldown {
        /// Time left until the action is allowed.
        remaining: TimeDelta,
    },
}

/// Everything an action attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    /// Which action was attempted.
    pub kind: ActionKind,
    /// Applied or rejected.
    pub outcome: ActionOutcome,
    /// What the catch-up before the action changed.
    pub catch_up: AdvanceReport,
    /// Levels gained from the action's experience.
    pub progression: LevelReport,
    /// Audit entry to persist with the record (absent on rejection).
    pub audit: Option<AuditEntry>,
    /// Human-readable note for the player.
    pub message: Option<String>,
}

impl ActionResult {
    /// Remaining cooldown if the action was rejected.
    pub const fn cooldown_remaining(&self) -> Option<TimeDelta> {
        match self.outcome {
            ActionOutcome::Cooldown { remaining } => Some(remaining),
            ActionOutcome::Applied { .. } => None,
        }
    }

    /// Whether the effect was applied.
    pub const fn applied(&self) -> bool {
        matches!(self.outcome, ActionOutcome::Applied { .. })
    }
}

/// Run `kind` against `companion` at `now`.
///
/// # Errors
///
/// Returns [`EngineError`] on invalid configuration or arithmetic overflow.
pub fn execute(
    companion: &mut Companion,
    kind: ActionKind,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Result<ActionResult, EngineError> {
    let catch_up = advance(companion, now, config)?;
    let effect = config.actions.effect(kind);

    let gate = cooldown::check(companion.last_action_at(kind), effect.cooldown()?, now);
    if !gate.allowed {
        debug!(
            companion_id = %companion.id,
            action = %kind,
            remaining_secs = gate.remaining.num_seconds(),
            "action rejected by cooldown"
        );
        return Ok(ActionResult {
            kind,
            outcome: ActionOutcome::Cooldown {
                remaining: gate.remaining,
            },
            catch_up,
            progression: LevelReport::default(),
            audit: None,
            message: Some(cooldown_message(kind, gate.remaining)),
        });
    }

    let mut next = companion.clone();
    let before = next.vitals();
    let capped = is_capped(before, effect, config);
    apply_effect(&mut next, effect, config);
    set_last_action_at(&mut next, kind, now);

    rebase_lifted(&mut next, before, now, config)?;
    match kind {
        ActionKind::Feed => next.hunger_decay_anchor = Some(now),
        ActionKind::Play => next.happiness_decay_anchor = Some(now),
        ActionKind::Touch => {}
    }

    train_attribute(&mut next, kind);
    let progression = grant_experience(&mut next, effect.experience, &config.progression)?;
    apply_health_rule(&mut next, &config.vitals);

    let after = next.vitals();
    let audit = AuditEntry {
        id: AuditEntryId::new(),
        companion_id: next.id,
        action: kind,
        action_value: effect.action_value(),
        before,
        after,
        created_at: now,
    };

    info!(
        companion_id = %next.id,
        action = %kind,
        capped,
        hunger = after.hunger,
        happiness = after.happiness,
        health = after.health,
        intimacy = after.intimacy,
        "action applied"
    );

    *companion = next;
    Ok(ActionResult {
        kind,
        outcome: ActionOutcome::Applied { capped },
        catch_up,
        progression,
        audit: Some(audit),
        message: Some(applied_message(kind, capped)),
    })
}

/// Every vital the effect raises is already at its bound.
fn is_capped(before: VitalsSnapshot, effect: &ActionEffect, config: &EngineConfig) -> bool {
    let max = config.vitals.max_vital;
    let raised = [
        (effect.hunger, before.hunger, max),
        (effect.happiness, before.happiness, max),
        (effect.health, before.health, max),
        (effect.intimacy, before.intimacy, config.vitals.max_intimacy),
    ];
    let mut any_raised = false;
    for (delta, value, bound) in raised {
        if delta > 0 {
            any_raised = true;
            if value < bound {
                return false;
            }
        }
    }
    any_raised
}

fn apply_effect(companion: &mut Companion, effect: &ActionEffect, config: &EngineConfig) {
    let max = config.vitals.max_vital;
    companion.hunger = apply_delta(companion.hunger, effect.hunger, max);
    companion.happiness = apply_delta(companion.happiness, effect.happiness, max);
    companion.health = apply_delta(companion.health, effect.health, max);
    companion.intimacy = apply_delta(
        companion.intimacy,
        effect.intimacy,
        config.vitals.max_intimacy,
    );
}

/// Add a signed delta and clamp to `[0, max]`.
pub fn apply_delta(value: u32, delta: i32, max: u32) -> u32 {
    value.saturating_add_signed(delta).min(max)
}

const fn set_last_action_at(companion: &mut Companion, kind: ActionKind, now: DateTime<Utc>) {
    match kind {
        ActionKind::Feed => companion.last_feed_at = Some(now),
        ActionKind::Play => companion.last_play_at = Some(now),
        ActionKind::Touch => companion.last_touch_at = Some(now),
    }
}

fn train_attribute(companion: &mut Companion, kind: ActionKind) {
    let attrs = &mut companion.attributes;
    let trained = match kind {
        ActionKind::Feed => &mut attrs.strength,
        ActionKind::Play => &mut attrs.agility,
        ActionKind::Touch => &mut attrs.charm,
    };
    *trained = trained.saturating_add(1);
}

fn applied_message(kind: ActionKind, capped: bool) -> String {
    let text = match (kind, capped) {
        (ActionKind::Feed, false) => "Yum, that hit the spot!",
        (ActionKind::Feed, true) => "I'm already full, but thank you!",
        (ActionKind::Play, false) => "That was so much fun!",
        (ActionKind::Play, true) => "I'm as happy as can be!",
        (ActionKind::Touch, false) => "That feels nice~",
        (ActionKind::Touch, true) => "We're already the best of friends!",
    };
    String::from(text)
}

fn cooldown_message(kind: ActionKind, remaining: TimeDelta) -> String {
    let minutes = remaining
        .num_minutes()
        .saturating_add(i64::from(remaining.num_seconds().checked_rem(60).unwrap_or(0) > 0));
    format!("{kind} is on cooldown for another {minutes} minute(s)")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use companion_types::{Attributes, CompanionId, GrowthStage, OwnerId};

    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn hours(h: i64) -> DateTime<Utc> {
        t0() + TimeDelta::hours(h)
    }

    fn companion() -> Companion {
        Companion {
            id: CompanionId::new(),
            owner_id: OwnerId::new(),
            name: String::from("Mochi"),
            hunger: 10,
            happiness: 10,
            health: 10,
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
            created_at: t0(),
            updated_at: t0(),
            version: 0,
        }
    }

    #[test]
    fn feed_twice_inside_cooldown_is_rejected() {
        let cfg = EngineConfig::default();
        let mut c = companion();

        let first = execute(&mut c, ActionKind::Feed, hours(9), &cfg).unwrap();
        assert!(first.applied());
        assert_eq!(c.last_feed_at, Some(hours(9)));

        let second = execute(&mut c, ActionKind::Feed, hours(10), &cfg).unwrap();
        assert_eq!(second.cooldown_remaining(), Some(TimeDelta::hours(7)));
        assert!(second.audit.is_none());
        assert_eq!(c.last_feed_at, Some(hours(9)));
    }

    #[test]
    fn feed_raises_hunger_and_restarts_hunger_clock() {
        let cfg = EngineConfig::default();
        let mut c = companion();
        let at = hours(9) + TimeDelta::minutes(20);

        let result = execute(&mut c, ActionKind::Feed, at, &cfg).unwrap();
        let audit = result.audit.unwrap();
        // 9h20m: hunger 10 -> 7 by decay, then +3.
        assert_eq!(audit.before.hunger, 7);
        assert_eq!(audit.after.hunger, 10);
        assert_eq!(audit.action_value, 3);
        assert_eq!(c.hunger_decay_anchor, Some(at));
        assert_eq!(c.attributes.strength, Attributes::STARTING_VALUE + 1);
    }

    #[test]
    fn capped_action_still_refreshes_timestamp() {
        let cfg = EngineConfig::default();
        let mut c = companion();

        let result = execute(&mut c, ActionKind::Feed, hours(1), &cfg).unwrap();
        assert_eq!(result.outcome, ActionOutcome::Applied { capped: true });
        assert_eq!(c.hunger, 10);
        assert_eq!(c.last_feed_at, Some(hours(1)));
        assert!(result.audit.is_some());
    }

    #[test]
    fn play_costs_hunger_and_restarts_happiness_clock() {
        let cfg = EngineConfig::default();
        let mut c = companion();
        c.happiness = 4;
        c.happiness_decay_anchor = Some(t0());
        let at = hours(1);

        execute(&mut c, ActionKind::Play, at, &cfg).unwrap();
        assert_eq!(c.happiness, 7);
        assert_eq!(c.hunger, 9);
        assert_eq!(c.happiness_decay_anchor, Some(at));
        assert_eq!(c.attributes.agility, Attributes::STARTING_VALUE + 1);
        assert_eq!(c.experience, 15 + 12);
    }

    #[test]
    fn touch_clamps_intimacy() {
        let cfg = EngineConfig::default();
        let mut c = companion();
        c.intimacy = 98;
        let result = execute(&mut c, ActionKind::Touch, hours(0), &cfg).unwrap();
        assert_eq!(c.intimacy, 100);
        assert_eq!(result.outcome, ActionOutcome::Applied { capped: false });

        let again = execute(&mut c, ActionKind::Touch, hours(2), &cfg).unwrap();
        assert!(again.applied());
        assert_eq!(c.intimacy, 100);
    }

    #[test]
    fn touch_lifting_happiness_rebases_its_clock() {
        let cfg = EngineConfig::default();
        let mut c = companion();
        c.happiness = 0;
        c.happiness_decay_anchor = Some(t0());
        let at = hours(5);

        execute(&mut c, ActionKind::Touch, at, &cfg).unwrap();
        assert_eq!(c.happiness, 1);
        assert_eq!(c.happiness_decay_anchor, Some(hours(4)));
    }

    #[test]
    fn apply_delta_clamps_both_ends() {
        assert_eq!(apply_delta(9, 3, 10), 10);
        assert_eq!(apply_delta(0, -1, 10), 0);
        assert_eq!(apply_delta(5, -2, 10), 3);
    }

    #[test]
    fn cooldown_message_rounds_up() {
        let msg = cooldown_message(ActionKind::Play, TimeDelta::seconds(61));
        assert_eq!(msg, "play is on cooldown for another 2 minute(s)");
    }
}
