//! Chat turns: reply selection and the bounded reward.
//!
//! The companion answers its most pressing need first. Health, then
//! happiness, then hunger are checked against `low_vital_threshold`; only a
//! companion with no pressing need asks the pluggable [`ReplySource`] for
//! free text.
//!
//! Each turn grants a small random happiness and experience bonus drawn from
//! a [`RandomSource`], and trains intelligence by one.

use chrono::{DateTime, Utc};
use companion_types::Companion;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::actions::apply_delta;
use crate::config::EngineConfig;
use crate::decay::{AdvanceReport, advance, rebase_lifted};
use crate::derived::apply_health_rule;
use crate::error::EngineError;
use crate::progression::{LevelReport, grant_experience};

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Source of bounded random integers.
pub trait RandomSource {
    /// Uniform value in `low..=high`. Returns `low` when `high < low`.
    fn next_in_range(&mut self, low: u64, high: u64) -> u64;
}

/// [`RandomSource`] backed by a [`StdRng`].
#[derive(Debug, Clone)]
pub struct RngSource {
    rng: StdRng,
}

impl RngSource {
    /// Deterministic source for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Source seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl RandomSource for RngSource {
    fn next_in_range(&mut self, low: u64, high: u64) -> u64 {
        if high <= low {
            return low;
        }
        self.rng.random_range(low..=high)
    }
}

/// Free-text reply generator used when no vital is pressing.
pub trait ReplySource: Send + Sync {
    /// Reply to `text` from the owner.
    fn reply(&self, companion: &Companion, text: &str) -> String;
}

/// A fixed rotation of generic replies.
#[derive(Debug, Clone)]
pub struct CannedReplies {
    replies: Vec<String>,
}

impl CannedReplies {
    /// Rotation over the given replies. An empty list falls back to the
    /// default rotation.
    pub fn new(replies: Vec<String>) -> Self {
        if replies.is_empty() {
            return Self::default();
        }
        Self { replies }
    }
}

impl Default for CannedReplies {
    fn default() -> Self {
        Self {
            replies: vec![
                String::from("That sounds interesting!"),
                String::from("You're right, you're always right!"),
                String::from("I'm listening~"),
            ],
        }
    }
}

impl ReplySource for CannedReplies {
    fn reply(&self, _companion: &Companion, text: &str) -> String {
        let len = self.replies.len();
        let pick = text.chars().count().checked_rem(len).unwrap_or(0);
        self.replies
            .get(pick)
            .cloned()
            .unwrap_or_else(|| String::from("..."))
    }
}

// ---------------------------------------------------------------------------
// Turn
// ---------------------------------------------------------------------------

/// Why a reply was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyReason {
    /// Health at or below the low threshold.
    HealthLow,
    /// Happiness at or below the low threshold.
    HappinessLow,
    /// Hunger at or below the low threshold.
    HungerLow,
    /// Nothing pressing; the reply source answered.
    Generic,
}

/// Result of one chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    /// The companion's reply.
    pub reply: String,
    /// Why this reply was chosen.
    pub reason: ReplyReason,
    /// Happiness granted by the turn (after clamping).
    pub happiness_gained: u32,
    /// Experience granted by the turn.
    pub experience_gained: u64,
    /// What the catch-up before the turn changed.
    pub catch_up: AdvanceReport,
    /// Levels gained from the turn's experience.
    pub progression: LevelReport,
}

/// Pick the reply reason from the caught-up vitals.
pub const fn reply_reason(companion: &Companion, low: u32) -> ReplyReason {
    if companion.health <= low {
        ReplyReason::HealthLow
    } else if companion.happiness <= low {
        ReplyReason::HappinessLow
    } else if companion.hunger <= low {
        ReplyReason::HungerLow
    } else {
        ReplyReason::Generic
    }
}

/// Run one chat turn for `text` at `now`.
///
/// # Errors
///
/// Returns [`EngineError`] on invalid configuration or arithmetic overflow.
pub fn respond(
    companion: &mut Companion,
    text: &str,
    now: DateTime<Utc>,
    config: &EngineConfig,
    replies: &dyn ReplySource,
    random: &mut dyn RandomSource,
) -> Result<ChatTurn, EngineError> {
    let catch_up = advance(companion, now, config)?;
    let chat = &config.chat;

    let reason = reply_reason(companion, chat.low_vital_threshold);
    let reply = match reason {
        ReplyReason::HealthLow => String::from("I don't feel well... could you look after me?"),
        ReplyReason::HappinessLow => String::from("I'm feeling a bit down. Will you play with me?"),
        ReplyReason::HungerLow => String::from("I'm so hungry... is it time to eat?"),
        ReplyReason::Generic => replies.reply(companion, text),
    };

    let happiness_roll = random.next_in_range(0, u64::from(chat.max_happiness_reward));
    let experience = random.next_in_range(chat.min_exp_reward, chat.max_exp_reward);

    let mut next = companion.clone();
    let before = next.vitals();
    let delta = i32::try_from(happiness_roll).unwrap_or(i32::MAX);
    next.happiness = apply_delta(next.happiness, delta, config.vitals.max_vital);
    rebase_lifted(&mut next, before, now, config)?;
    next.attributes.intelligence = next.attributes.intelligence.saturating_add(1);
    let progression = grant_experience(&mut next, experience, &config.progression)?;
    apply_health_rule(&mut next, &config.vitals);

    let happiness_gained = next.happiness.saturating_sub(before.happiness);
    debug!(
        companion_id = %next.id,
        reason = ?reason,
        happiness_gained,
        experience_gained = experience,
        "chat turn"
    );
    *companion = next;

    Ok(ChatTurn {
        reply,
        reason,
        happiness_gained,
        experience_gained: experience,
        catch_up,
        progression,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;
    use companion_types::{Attributes, CompanionId, GrowthStage, OwnerId};

    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
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

    /// Always returns the upper bound.
    struct Generous;

    impl RandomSource for Generous {
        fn next_in_range(&mut self, _low: u64, high: u64) -> u64 {
            high
        }
    }

    #[test]
    fn health_outranks_other_needs() {
        let mut c = companion();
        c.health = 2;
        c.happiness = 1;
        c.hunger = 1;
        assert_eq!(reply_reason(&c, 3), ReplyReason::HealthLow);
        c.health = 8;
        assert_eq!(reply_reason(&c, 3), ReplyReason::HappinessLow);
        c.happiness = 8;
        assert_eq!(reply_reason(&c, 3), ReplyReason::HungerLow);
        c.hunger = 8;
        assert_eq!(reply_reason(&c, 3), ReplyReason::Generic);
    }

    #[test]
    fn generic_reply_comes_from_source() {
        let cfg = EngineConfig::default();
        let replies = CannedReplies::new(vec![String::from("woof")]);
        let mut c = companion();
        let turn = respond(&mut c, "hello", t0(), &cfg, &replies, &mut Generous).unwrap();
        assert_eq!(turn.reason, ReplyReason::Generic);
        assert_eq!(turn.reply, "woof");
    }

    #[test]
    fn reward_stays_in_bounds() {
        let cfg = EngineConfig::default();
        let replies = CannedReplies::default();
        let mut rng = RngSource::seeded(7);
        let mut c = companion();
        c.happiness = 5;
        for _ in 0..50 {
            let happiness = c.happiness;
            let turn = respond(&mut c, "hi", t0(), &cfg, &replies, &mut rng).unwrap();
            assert!(turn.happiness_gained <= 1);
            assert!((1..=5).contains(&turn.experience_gained));
            assert!(c.happiness <= cfg.vitals.max_vital);
            assert!(c.happiness >= happiness);
        }
        assert_eq!(c.attributes.intelligence, Attributes::STARTING_VALUE + 50);
    }

    #[test]
    fn chat_experience_feeds_level_up() {
        let cfg = EngineConfig::default();
        let replies = CannedReplies::default();
        let mut c = companion();
        c.experience = 97;
        let turn = respond(&mut c, "hi", t0(), &cfg, &replies, &mut Generous).unwrap();
        assert_eq!(turn.experience_gained, 5);
        assert_eq!(c.level, 2);
        assert_eq!(c.experience, 2);
    }

    #[test]
    fn chat_catches_up_before_replying() {
        let cfg = EngineConfig::default();
        let replies = CannedReplies::default();
        let mut c = companion();
        // Thirty hours later hunger has run down to zero.
        let at = t0() + TimeDelta::hours(30);
        let turn = respond(&mut c, "hi", at, &cfg, &replies, &mut Generous).unwrap();
        assert_eq!(c.hunger, 0);
        assert_eq!(turn.reason, ReplyReason::HealthLow);
    }

    #[test]
    fn seeded_sources_repeat() {
        let mut a = RngSource::seeded(42);
        let mut b = RngSource::seeded(42);
        for _ in 0..10 {
            assert_eq!(a.next_in_range(1, 5), b.next_in_range(1, 5));
        }
        assert_eq!(a.next_in_range(3, 3), 3);
    }
}
