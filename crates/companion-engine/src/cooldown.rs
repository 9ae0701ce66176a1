//! Per-action cooldown gate.
//!
//! An action is allowed once its cooldown has fully elapsed since its last
//! success. While cooling down the caller is told how long remains; nothing
//! is queued.

use chrono::{DateTime, TimeDelta, Utc};

/// Outcome of a cooldown check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownCheck {
    /// Whether the action may run now.
    pub allowed: bool,
    /// Time left until the action is allowed (zero when allowed).
    pub remaining: TimeDelta,
}

/// Check whether an action last run at `last` may run again at `now`.
///
/// `remaining = max(0, cooldown - (now - last))`. A `now` earlier than
/// `last` counts as no time elapsed. An action that never ran is allowed.
pub fn check(
    last: Option<DateTime<Utc>>,
    cooldown: TimeDelta,
    now: DateTime<Utc>,
) -> CooldownCheck {
    let Some(last) = last else {
        return CooldownCheck {
            allowed: true,
            remaining: TimeDelta::zero(),
        };
    };
    let elapsed = now.signed_duration_since(last).max(TimeDelta::zero());
    let remaining = cooldown
        .checked_sub(&elapsed)
        .unwrap_or_else(TimeDelta::zero)
        .max(TimeDelta::zero());
    CooldownCheck {
        allowed: remaining.is_zero(),
        remaining,
    }
}
