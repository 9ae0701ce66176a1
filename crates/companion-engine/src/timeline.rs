//! Cycle arithmetic on nanosecond instants.
//!
//! Decay and growth clocks are measured as whole cycles since an anchor.
//! Instants are converted to `i128` nanoseconds since the Unix epoch so that
//! boundary math is exact and cannot overflow for any representable
//! [`DateTime`].
//!
//! [`HungerTimeline`] reconstructs the hunger value at any boundary between
//! two engine calls. Hunger decays by exactly one per cycle until it reaches
//! zero, so the instant at which it first drops below a threshold is known in
//! closed form.

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::EngineError;

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// Nanoseconds since the Unix epoch.
pub fn to_nanos(instant: DateTime<Utc>) -> i128 {
    i128::from(instant.timestamp())
        .saturating_mul(NANOS_PER_SECOND)
        .saturating_add(i128::from(instant.timestamp_subsec_nanos()))
}

/// Inverse of [`to_nanos`].
///
/// # Errors
///
/// Returns [`EngineError::TimeOutOfRange`] if the value is not a
/// representable instant.
pub fn from_nanos(nanos: i128) -> Result<DateTime<Utc>, EngineError> {
    let secs = nanos
        .checked_div_euclid(NANOS_PER_SECOND)
        .and_then(|s| i64::try_from(s).ok());
    let subsec = nanos
        .checked_rem_euclid(NANOS_PER_SECOND)
        .and_then(|n| u32::try_from(n).ok());
    secs.zip(subsec)
        .and_then(|(s, n)| DateTime::from_timestamp(s, n))
        .ok_or_else(|| EngineError::TimeOutOfRange {
            context: format!("{nanos}ns since epoch"),
        })
}

/// Length of a [`TimeDelta`] in nanoseconds.
pub fn delta_nanos(delta: TimeDelta) -> i128 {
    i128::from(delta.num_seconds())
        .saturating_mul(NANOS_PER_SECOND)
        .saturating_add(i128::from(delta.subsec_nanos()))
}

/// When a monotonically decaying value first drops below a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    /// The value is already below the threshold.
    Already,
    /// The value never drops below the threshold.
    Never,
    /// The value drops below the threshold at this instant (nanoseconds).
    At(i128),
}

/// A fixed-period clock starting at an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cycle {
    anchor: i128,
    period: i128,
}

impl Cycle {
    /// Build a cycle clock.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if `period` is not positive.
    pub fn new(anchor: DateTime<Utc>, period: TimeDelta) -> Result<Self, EngineError> {
        let period = delta_nanos(period);
        if period <= 0 {
            return Err(EngineError::InvalidConfig {
                reason: String::from("cycle length must be positive"),
            });
        }
        Ok(Self {
            anchor: to_nanos(anchor),
            period,
        })
    }

    /// Whole cycles elapsed between the anchor and `now`.
    ///
    /// Zero when `now` is at or before the anchor.
    pub fn elapsed(&self, now: i128) -> u64 {
        if now <= self.anchor {
            return 0;
        }
        now.checked_sub(self.anchor)
            .and_then(|span| span.checked_div(self.period))
            .map_or(0, |n| u64::try_from(n).unwrap_or(u64::MAX))
    }

    /// Instant of the `k`-th boundary after the anchor.
    pub fn boundary(&self, k: u64) -> Result<i128, EngineError> {
        i128::from(k)
            .checked_mul(self.period)
            .and_then(|offset| self.anchor.checked_add(offset))
            .ok_or_else(|| EngineError::ArithmeticOverflow {
                context: format!("cycle boundary {k}"),
            })
    }

    /// The `k`-th boundary as a timestamp.
    pub fn boundary_at(&self, k: u64) -> Result<DateTime<Utc>, EngineError> {
        from_nanos(self.boundary(k)?)
    }

    /// How many of the first `n` boundaries fall strictly before `crossing`.
    pub fn count_before(&self, n: u64, crossing: Crossing) -> u64 {
        match crossing {
            Crossing::Already => 0,
            Crossing::Never => n,
            Crossing::At(limit) => {
                if limit <= self.anchor {
                    return 0;
                }
                let before = limit
                    .checked_sub(self.anchor)
                    .and_then(|span| span.checked_sub(1))
                    .and_then(|span| span.checked_div(self.period))
                    .map_or(0, |k| u64::try_from(k).unwrap_or(u64::MAX));
                before.min(n)
            }
        }
    }
}

/// Hunger as a function of time between two engine calls.
///
/// At boundary `k` of the hunger clock the value is `start - min(start, k)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HungerTimeline {
    start: u32,
    clock: Cycle,
}

impl HungerTimeline {
    /// Timeline of a hunger value `start` decaying on `clock`.
    pub const fn new(start: u32, clock: Cycle) -> Self {
        Self { start, clock }
    }

    /// When hunger first drops below `threshold`.
    pub fn crossing_below(&self, threshold: u32) -> Result<Crossing, EngineError> {
        if self.start < threshold {
            return Ok(Crossing::Already);
        }
        if threshold == 0 {
            return Ok(Crossing::Never);
        }
        let k = self.start.saturating_sub(threshold).saturating_add(1);
        self.clock.boundary(u64::from(k)).map(Crossing::At)
    }
}
