//! End-to-end tests for `CompanionService` against the in-memory store.
//!
//! Time is driven by a `ManualClock`, so days of decay run instantly and
//! every expected value is exact.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::items_after_statements,
    clippy::missing_panics_doc,
    clippy::too_many_lines,
    clippy::indexing_slicing
)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, TimeDelta, Utc};
use companion_core::config::SweepConfig;
use companion_core::{
    CompanionService, CompanionStore, ManualClock, MemoryStore, ServiceError, StoreError,
    TtlStore,
};
use companion_engine::{ActionOutcome, EngineConfig, RngSource};
use companion_types::{AuditEntry, ChatSender, Companion, CompanionId, OwnerId};

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn service_with<S: CompanionStore>(store: S) -> (CompanionService<S>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(t0()));
    let service = CompanionService::new(
        store,
        clock.clone(),
        EngineConfig::default(),
        &SweepConfig::default(),
    )
    .with_random(Box::new(RngSource::seeded(7)));
    (service, clock)
}

fn service() -> (CompanionService<MemoryStore>, Arc<ManualClock>) {
    service_with(MemoryStore::new())
}

// =========================================================================
// Adoption
// =========================================================================

#[tokio::test]
async fn adopt_creates_full_companion() {
    let (service, _clock) = service();
    let owner = OwnerId::new();

    let companion = service.adopt(owner, "Mochi").await.unwrap();
    assert_eq!(companion.hunger, 10);
    assert_eq!(companion.level, 1);
    assert_eq!(companion.created_at, t0());

    let stored = service.store().load(companion.id).await.unwrap();
    assert_eq!(stored, companion);
}

#[tokio::test]
async fn second_adoption_by_same_owner_conflicts() {
    let (service, _clock) = service();
    let owner = OwnerId::new();
    service.adopt(owner, "Mochi").await.unwrap();

    let err = service.adopt(owner, "Taro").await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict { .. }));
}

#[tokio::test]
async fn invalid_name_is_an_engine_error() {
    let (service, _clock) = service();
    let err = service.adopt(OwnerId::new(), "").await.unwrap_err();
    assert!(matches!(err, ServiceError::Engine { .. }));
}

#[tokio::test]
async fn unknown_id_is_not_found() {
    let (service, _clock) = service();
    let err = service.get_current(CompanionId::new()).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));
}

// =========================================================================
// Catch-up
// =========================================================================

#[tokio::test]
async fn read_after_seven_hours_catches_up_and_persists() {
    let (service, clock) = service();
    let id = service.adopt(OwnerId::new(), "Mochi").await.unwrap().id;

    clock.advance(TimeDelta::hours(7));
    let companion = service.get_current(id).await.unwrap();
    assert_eq!(companion.hunger, 8);
    assert_eq!(companion.hunger_decay_anchor, Some(t0() + TimeDelta::hours(6)));
    assert_eq!(companion.version, 1);

    let stored = service.store().load(id).await.unwrap();
    assert_eq!(stored, companion);
}

#[tokio::test]
async fn repeated_reads_do_not_rewrite() {
    let (service, clock) = service();
    let id = service.adopt(OwnerId::new(), "Mochi").await.unwrap().id;

    clock.advance(TimeDelta::hours(5));
    let first = service.get_current(id).await.unwrap();
    let second = service.get_current(id).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(second.version, 1);
}

#[tokio::test]
async fn polling_every_minute_matches_one_read_per_day() {
    let (polled, polled_clock) = service();
    let (lazy, lazy_clock) = service();
    let polled_id = polled.adopt(OwnerId::new(), "Mochi").await.unwrap().id;
    let lazy_id = lazy.adopt(OwnerId::new(), "Mochi").await.unwrap().id;

    for _ in 0..(24 * 60) {
        polled_clock.advance(TimeDelta::minutes(1));
        polled.get_current(polled_id).await.unwrap();
    }
    lazy_clock.advance(TimeDelta::hours(24));

    let a = polled.get_current(polled_id).await.unwrap();
    let b = lazy.get_current(lazy_id).await.unwrap();
    assert_eq!(a.hunger, b.hunger);
    assert_eq!(a.happiness, b.happiness);
    assert_eq!(a.health, b.health);
    assert_eq!(a.experience, b.experience);
    assert_eq!(a.level, b.level);
    assert_eq!(a.hunger_decay_anchor, b.hunger_decay_anchor);
    assert_eq!(a.happiness_decay_anchor, b.happiness_decay_anchor);
    assert_eq!(a.exp_growth_anchor, b.exp_growth_anchor);
}

// =========================================================================
// Actions
// =========================================================================

#[tokio::test]
async fn feed_inside_cooldown_is_rejected_with_remaining_time() {
    let (service, clock) = service();
    let id = service.adopt(OwnerId::new(), "Mochi").await.unwrap().id;

    clock.advance(TimeDelta::hours(9));
    let first = service.feed(id).await.unwrap();
    assert_eq!(first.outcome, ActionOutcome::Applied { capped: false });
    assert!(first.message.is_some());

    clock.advance(TimeDelta::hours(1));
    let second = service.feed(id).await.unwrap();
    assert_eq!(second.cooldown_remaining, Some(TimeDelta::hours(7)));
    assert_eq!(
        second.companion.last_feed_at,
        Some(t0() + TimeDelta::hours(9))
    );

    let audit = service.store().audit_entries(id).await;
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].before.hunger, 7);
    assert_eq!(audit[0].after.hunger, 10);
}

#[tokio::test]
async fn capped_feed_still_refreshes_cooldown() {
    let (service, clock) = service();
    let id = service.adopt(OwnerId::new(), "Mochi").await.unwrap().id;

    clock.advance(TimeDelta::hours(1));
    let response = service.feed(id).await.unwrap();
    assert_eq!(response.outcome, ActionOutcome::Applied { capped: true });
    assert_eq!(response.companion.hunger, 10);
    assert_eq!(
        response.companion.last_feed_at,
        Some(t0() + TimeDelta::hours(1))
    );
    assert_eq!(service.store().audit_entries(id).await.len(), 1);
}

#[tokio::test]
async fn concurrent_feeds_apply_exactly_once() {
    let (service, _clock) = service();
    let service = Arc::new(service);
    let id = service.adopt(OwnerId::new(), "Mochi").await.unwrap().id;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move { service.feed(id).await }));
    }

    let mut applied = 0;
    let mut rejected = 0;
    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        match response.outcome {
            ActionOutcome::Applied { .. } => applied += 1,
            ActionOutcome::Cooldown { .. } => rejected += 1,
        }
    }
    assert_eq!(applied, 1);
    assert_eq!(rejected, 7);
    assert_eq!(service.store().audit_entries(id).await.len(), 1);
}

// =========================================================================
// Optimistic concurrency
// =========================================================================

/// Store that lets a phantom writer win the first save.
struct RacingStore {
    inner: MemoryStore,
    race_pending: AtomicBool,
}

impl CompanionStore for RacingStore {
    async fn load(&self, id: CompanionId) -> Result<Companion, StoreError> {
        self.inner.load(id).await
    }

    async fn find_by_owner(&self, owner_id: OwnerId) -> Result<Option<Companion>, StoreError> {
        self.inner.find_by_owner(owner_id).await
    }

    async fn insert(&self, companion: &Companion) -> Result<(), StoreError> {
        self.inner.insert(companion).await
    }

    async fn save(
        &self,
        companion: &Companion,
        audit: Option<&AuditEntry>,
    ) -> Result<u64, StoreError> {
        if self.race_pending.swap(false, Ordering::SeqCst) {
            let other = self.inner.load(companion.id).await?;
            self.inner.save(&other, None).await?;
        }
        self.inner.save(companion, audit).await
    }

    async fn list_ids(&self) -> Result<Vec<CompanionId>, StoreError> {
        self.inner.list_ids().await
    }
}

#[tokio::test]
async fn lost_race_reloads_and_retries() {
    let store = RacingStore {
        inner: MemoryStore::new(),
        race_pending: AtomicBool::new(false),
    };
    let (service, clock) = service_with(store);
    let id = service.adopt(OwnerId::new(), "Mochi").await.unwrap().id;

    service.store().race_pending.store(true, Ordering::SeqCst);
    clock.advance(TimeDelta::hours(9));
    let response = service.feed(id).await.unwrap();
    assert!(matches!(response.outcome, ActionOutcome::Applied { .. }));
    // Phantom write (1) then the retried feed (2).
    assert_eq!(response.companion.version, 2);
    assert_eq!(service.store().inner.audit_entries(id).await.len(), 1);
}

#[tokio::test]
async fn saved_timestamps_are_whole_microseconds() {
    let (service, clock) = service();
    clock.set(t0() + TimeDelta::nanoseconds(1_234_567));
    let adopted = service.adopt(OwnerId::new(), "Mochi").await.unwrap();
    assert_eq!(adopted.created_at, t0() + TimeDelta::nanoseconds(1_234_000));

    clock.advance(TimeDelta::hours(8) + TimeDelta::nanoseconds(999));
    let response = service.feed(adopted.id).await.unwrap();
    let stored = service.store().load(adopted.id).await.unwrap();
    assert_eq!(stored, response.companion);
    assert_eq!(
        stored.last_feed_at,
        Some(t0() + TimeDelta::hours(8) + TimeDelta::nanoseconds(1_235_000))
    );
}

// =========================================================================
// Chat
// =========================================================================

#[tokio::test]
async fn chat_replies_and_keeps_transcript() {
    let (service, clock) = service();
    let id = service.adopt(OwnerId::new(), "Mochi").await.unwrap().id;

    let response = service.chat(id, "hello").await.unwrap();
    assert!(!response.reply.is_empty());
    assert!(response.companion.experience >= 1);
    assert_eq!(response.companion.attributes.intelligence, 11);

    let history = service.chat_history(id, 50).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].sender, ChatSender::Owner);
    assert_eq!(history[0].text, "hello");
    assert_eq!(history[1].sender, ChatSender::Companion);
    assert_eq!(history[1].text, response.reply);

    clock.advance(TimeDelta::days(8));
    assert!(service.chat_history(id, 50).await.unwrap().is_empty());
    assert_eq!(service.evict_expired_chats().await, 2);
}

#[tokio::test]
async fn transcript_lives_in_the_injected_store() {
    let chats = Arc::new(TtlStore::new(TimeDelta::hours(1)));
    let (service, clock) = service();
    let service = service.with_chat_store(Arc::clone(&chats));
    let id = service.adopt(OwnerId::new(), "Mochi").await.unwrap().id;

    service.chat(id, "hello").await.unwrap();
    assert_eq!(chats.key_count().await, 1);
    assert_eq!(chats.recent(&id, 10, t0()).await.len(), 2);

    // The injected store's own retention applies, not the sweep default.
    clock.advance(TimeDelta::hours(2));
    assert!(service.chat_history(id, 50).await.unwrap().is_empty());
    assert_eq!(service.evict_expired_chats().await, 2);
    assert_eq!(chats.key_count().await, 0);
}

#[tokio::test]
async fn starving_companion_complains_about_health_first() {
    let (service, clock) = service();
    let id = service.adopt(OwnerId::new(), "Mochi").await.unwrap().id;

    // 24h: hunger 10 -> 2, which caps health at 2 and drags happiness to 3.
    clock.advance(TimeDelta::hours(24));
    let response = service.chat(id, "how are you?").await.unwrap();
    assert_eq!(response.companion.hunger, 2);
    assert_eq!(response.companion.health, 2);
    assert!(response.reply.contains("don't feel well"));
}

// =========================================================================
// Sweep
// =========================================================================

#[tokio::test]
async fn sweep_advances_then_reports_unchanged() {
    let (service, clock) = service();
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(service.adopt(OwnerId::new(), "Mochi").await.unwrap().id);
    }

    clock.advance(TimeDelta::hours(1));
    let first = service.sweep_all(ids.clone()).await;
    assert_eq!(first.advanced, 3);

    let second = service.sweep_all(ids.clone()).await;
    assert_eq!(second.unchanged, 3);

    ids.push(CompanionId::new());
    let third = service.sweep_all(ids).await;
    assert_eq!(third.unchanged, 3);
    assert_eq!(third.failed, 1);
}

#[tokio::test]
async fn zero_period_eviction_loop_runs_and_stops() {
    let (service, _clock) = service();
    let service = Arc::new(service);

    let (tx, rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(companion_core::sweep::run_chat_eviction_loop(
        Arc::clone(&service),
        std::time::Duration::ZERO,
        rx,
    ));
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    tx.send(true).unwrap();

    assert_eq!(handle.await.unwrap(), 0);
}

#[tokio::test]
async fn sweep_loop_stops_on_shutdown() {
    let (service, _clock) = service();
    let service = Arc::new(service);
    service.adopt(OwnerId::new(), "Mochi").await.unwrap();

    let (tx, rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(companion_core::sweep::run_sweep_loop(
        Arc::clone(&service),
        std::time::Duration::from_millis(10),
        rx,
    ));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    tx.send(true).unwrap();

    let result = handle.await.unwrap();
    assert!(result.passes >= 1);
    assert_eq!(result.totals.failed, 0);
}
