//! Catch-up of time-driven state.
//!
//! [`advance`] brings a record from its anchors up to `now` in one step:
//!
//! 1. Hunger loses one point per elapsed hunger cycle.
//! 2. Happiness loses one point per elapsed happiness cycle whose boundary
//!    finds hunger below `happiness_hunger_threshold`.
//! 3. Experience grows per elapsed growth cycle by the hunger band at that
//!    boundary, then the level-up loop runs.
//! 4. The starvation rule caps health.
//!
//! Hunger between two calls is reconstructed exactly from its timeline, so
//! one call spanning a day and many calls spanning the same day leave the
//! record in the same state, anchors included.
//!
//! Anchors only ever move forward by whole cycles. A vital that reaches zero
//! stops its clock at the boundary where it hit zero and resumes from the
//! last boundary before the action that lifts it (see [`rebase_lifted`]).

use chrono::{DateTime, TimeDelta, Utc};
use companion_types::{Companion, VitalsSnapshot};
use tracing::debug;

use crate::config::EngineConfig;
use crate::derived::apply_health_rule;
use crate::error::EngineError;
use crate::progression::{LevelReport, grant_experience};
use crate::timeline::{Cycle, HungerTimeline, to_nanos};

/// What a call to [`advance`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvanceReport {
    /// Cycles the hunger anchor moved forward.
    pub hunger_cycles: u64,
    /// Cycles the happiness anchor moved forward.
    pub happiness_cycles: u64,
    /// Cycles the experience anchor moved forward.
    pub growth_cycles: u64,
    /// Hunger points lost.
    pub hunger_lost: u32,
    /// Happiness points lost.
    pub happiness_lost: u32,
    /// Health points lost to starvation.
    pub health_lost: u32,
    /// Passive experience gained.
    pub experience_gained: u64,
    /// Levels, stages and form reached through the gained experience.
    pub progression: LevelReport,
}

impl AdvanceReport {
    /// Whether the record differs from before the call.
    pub const fn changed(&self) -> bool {
        self.hunger_cycles > 0
            || self.happiness_cycles > 0
            || self.growth_cycles > 0
            || self.health_lost > 0
    }
}

/// Bring `companion` up to date with `now`.
///
/// A `now` at or before every anchor is a strict no-op.
///
/// # Errors
///
/// Returns [`EngineError`] on invalid cycle lengths or arithmetic overflow.
/// The record is left untouched on error.
pub fn advance(
    companion: &mut Companion,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Result<AdvanceReport, EngineError> {
    let mut next = companion.clone();
    let report = advance_in_place(&mut next, now, config)?;
    if report.changed() {
        debug!(
            companion_id = %companion.id,
            hunger = next.hunger,
            happiness = next.happiness,
            health = next.health,
            experience_gained = report.experience_gained,
            "vitals caught up"
        );
        *companion = next;
    }
    Ok(report)
}

fn advance_in_place(
    companion: &mut Companion,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Result<AdvanceReport, EngineError> {
    let vitals = &config.vitals;
    let progression = &config.progression;
    let now = to_nanos(now);
    let created = companion.created_at;
    let mut report = AdvanceReport::default();

    // Hunger.
    let hunger_clock = Cycle::new(
        companion.hunger_decay_anchor.unwrap_or(created),
        vitals.hunger_cycle()?,
    )?;
    let timeline = HungerTimeline::new(companion.hunger, hunger_clock);
    let hunger_elapsed = hunger_clock.elapsed(now);
    let hunger_lost = hunger_elapsed.min(u64::from(companion.hunger));
    if hunger_lost > 0 {
        companion.hunger_decay_anchor = Some(hunger_clock.boundary_at(hunger_lost)?);
        report.hunger_cycles = hunger_lost;
        report.hunger_lost = narrow(hunger_lost)?;
        companion.hunger = companion.hunger.saturating_sub(report.hunger_lost);
    }

    // Happiness, gated on hunger at each boundary.
    let happiness_clock = Cycle::new(
        companion.happiness_decay_anchor.unwrap_or(created),
        vitals.happiness_cycle()?,
    )?;
    let happiness_elapsed = happiness_clock.elapsed(now);
    if companion.happiness > 0 && happiness_elapsed > 0 {
        let crossing = timeline.crossing_below(vitals.happiness_hunger_threshold)?;
        let calm = happiness_clock.count_before(happiness_elapsed, crossing);
        let hungry = happiness_elapsed.saturating_sub(calm);
        let happiness = u64::from(companion.happiness);

        let (lost, consumed) = if happiness > hungry {
            (hungry, happiness_elapsed)
        } else {
            // Reaches zero on the `happiness`-th hungry boundary.
            (happiness, calm.saturating_add(happiness))
        };
        companion.happiness_decay_anchor = Some(happiness_clock.boundary_at(consumed)?);
        report.happiness_cycles = consumed;
        report.happiness_lost = narrow(lost)?;
        companion.happiness = companion.happiness.saturating_sub(report.happiness_lost);
    }

    // Passive experience by hunger band.
    let growth_clock = Cycle::new(
        companion.exp_growth_anchor.unwrap_or(created),
        progression.exp_cycle()?,
    )?;
    let growth_elapsed = growth_clock.elapsed(now);
    if growth_elapsed > 0 {
        let high = growth_clock.count_before(
            growth_elapsed,
            timeline.crossing_below(progression.high_band_hunger)?,
        );
        let at_least_mid = growth_clock.count_before(
            growth_elapsed,
            timeline.crossing_below(progression.mid_band_hunger)?,
        );
        let mid = at_least_mid.saturating_sub(high);
        let gained = high
            .checked_mul(progression.high_band_exp)
            .zip(mid.checked_mul(progression.mid_band_exp))
            .and_then(|(h, m)| h.checked_add(m))
            .ok_or_else(|| EngineError::ArithmeticOverflow {
                context: String::from("passive experience overflow"),
            })?;

        companion.exp_growth_anchor = Some(growth_clock.boundary_at(growth_elapsed)?);
        report.growth_cycles = growth_elapsed;
        report.experience_gained = gained;
        if gained > 0 {
            report.progression = grant_experience(companion, gained, progression)?;
        }
    }

    report.health_lost = apply_health_rule(companion, vitals);
    Ok(report)
}

fn narrow(value: u64) -> Result<u32, EngineError> {
    u32::try_from(value).map_err(|e| EngineError::ArithmeticOverflow {
        context: format!("decay amount {value}: {e}"),
    })
}

/// Re-anchor decay clocks of vitals that an action lifted off zero.
///
/// A vital at zero keeps its anchor at the boundary where it hit zero. Once
/// lifted, its clock restarts from the last boundary at or before `now`
/// rather than replaying the idle cycles.
pub fn rebase_lifted(
    companion: &mut Companion,
    before: VitalsSnapshot,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Result<(), EngineError> {
    if before.hunger == 0 && companion.hunger > 0 {
        companion.hunger_decay_anchor = Some(last_boundary(
            companion.hunger_decay_anchor.unwrap_or(companion.created_at),
            config.vitals.hunger_cycle()?,
            now,
        )?);
    }
    if before.happiness == 0 && companion.happiness > 0 {
        companion.happiness_decay_anchor = Some(last_boundary(
            companion
                .happiness_decay_anchor
                .unwrap_or(companion.created_at),
            config.vitals.happiness_cycle()?,
            now,
        )?);
    }
    Ok(())
}

fn last_boundary(
    anchor: DateTime<Utc>,
    period: TimeDelta,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, EngineError> {
    let clock = Cycle::new(anchor, period)?;
    clock.boundary_at(clock.elapsed(to_nanos(now)))
}
