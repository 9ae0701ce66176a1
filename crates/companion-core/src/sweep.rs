//! Periodic background loops.
//!
//! [`run_sweep_loop`] catches up every stored companion on a fixed period so
//! that records nobody reads still progress. [`run_chat_eviction_loop`]
//! drops expired transcript messages. Both stop when the shutdown signal
//! flips to `true`.
//!
//! Sweeping is an optimization, not a correctness requirement: every
//! request path runs the same catch-up before it reads or writes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::service::{CompanionService, SweepSummary};
use crate::store::CompanionStore;

/// Shortest period a loop accepts; `tokio::time::interval` rejects zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Totals over the lifetime of a sweep loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepLoopResult {
    /// Sweep passes completed.
    pub passes: u64,
    /// Sum of all pass summaries.
    pub totals: SweepSummary,
}

/// Run sweeps every `interval` until `shutdown` becomes `true`.
///
/// The first pass runs immediately. Passes that overrun the interval delay
/// the next one rather than bunching up.
pub async fn run_sweep_loop<S: CompanionStore>(
    service: Arc<CompanionService<S>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> SweepLoopResult {
    let mut ticker = tokio::time::interval(interval.max(MIN_PERIOD));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut result = SweepLoopResult::default();

    info!(interval_secs = interval.as_secs(), "sweep loop starting");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        match service.sweep_stored().await {
            Ok(summary) => {
                result.passes = result.passes.saturating_add(1);
                result.totals.advanced = result.totals.advanced.saturating_add(summary.advanced);
                result.totals.unchanged = result.totals.unchanged.saturating_add(summary.unchanged);
                result.totals.failed = result.totals.failed.saturating_add(summary.failed);
                info!(
                    pass = result.passes,
                    advanced = summary.advanced,
                    unchanged = summary.unchanged,
                    failed = summary.failed,
                    "sweep pass complete"
                );
            }
            Err(e) => warn!(error = %e, "sweep pass could not list companions"),
        }
    }

    info!(passes = result.passes, "sweep loop stopped");
    result
}

/// Evict expired chat messages every `interval` until `shutdown` becomes
/// `true`. Returns the total number evicted.
pub async fn run_chat_eviction_loop<S: CompanionStore>(
    service: Arc<CompanionService<S>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> usize {
    let mut ticker = tokio::time::interval(interval.max(MIN_PERIOD));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut total = 0_usize;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }
        total = total.saturating_add(service.evict_expired_chats().await);
    }

    info!(evicted = total, "chat eviction loop stopped");
    total
}
