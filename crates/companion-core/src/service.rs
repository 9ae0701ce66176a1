//! The companion service: every externally visible operation.
//!
//! Each mutating call follows the same pipeline under the companion's keyed
//! lock:
//!
//! 1. Load the record and clamp integrity faults.
//! 2. Read the clock once and run the engine against that instant.
//! 3. Save with a version check (plus the audit entry for actions).
//! 4. On a version conflict, reload and recompute, up to `max_retries`
//!    attempts.
//!
//! Reads also catch up and persist when the catch-up changed anything, so
//! a read-heavy client and a sweep-only deployment observe the same state.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use companion_engine::{
    ActionOutcome, CannedReplies, EngineConfig, EngineError, RandomSource, ReplySource, RngSource,
};
use companion_types::{
    ActionKind, AuditEntry, ChatMessage, ChatMessageId, ChatSender, Companion, CompanionId,
    OwnerId,
};
use futures::StreamExt;
use futures::stream;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::SweepConfig;
use crate::locks::KeyedLocks;
use crate::store::{CompanionStore, StoreError};
use crate::ttl::TtlStore;

/// Default number of messages returned by [`CompanionService::chat_history`].
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Errors surfaced to callers of [`CompanionService`].
///
/// Cooldown rejections and capped vitals are not errors; they are reported
/// in [`ActionResponse`].
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// No companion with this id.
    #[error("companion {id} not found")]
    NotFound {
        /// The unknown id.
        id: CompanionId,
    },

    /// Duplicate adoption, or concurrent writers won every retry.
    #[error("conflict: {reason}")]
    Conflict {
        /// What conflicted.
        reason: String,
    },

    /// The store failed; nothing was partially written.
    #[error("persistence failure: {source}")]
    Persistence {
        /// The underlying store error.
        source: StoreError,
    },

    /// The engine rejected the input or overflowed.
    #[error("engine failure: {source}")]
    Engine {
        /// The underlying engine error.
        #[from]
        source: EngineError,
    },
}

impl From<StoreError> for ServiceError {
    fn from(source: StoreError) -> Self {
        match source {
            StoreError::NotFound { id } => Self::NotFound { id },
            StoreError::DuplicateOwner { owner_id } => Self::Conflict {
                reason: format!("owner {owner_id} already has a companion"),
            },
            StoreError::VersionConflict { id, expected } => Self::Conflict {
                reason: format!("companion {id} changed concurrently at version {expected}"),
            },
            StoreError::Backend { .. } => Self::Persistence { source },
        }
    }
}

/// Result of feed, play or touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    /// The record after the attempt, as persisted.
    pub companion: Companion,
    /// Applied or rejected by cooldown.
    pub outcome: ActionOutcome,
    /// Note for the player.
    pub message: Option<String>,
    /// Time left on the cooldown when rejected.
    pub cooldown_remaining: Option<TimeDelta>,
}

/// Result of one chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    /// The companion's reply.
    pub reply: String,
    /// The record after the turn, as persisted.
    pub companion: Companion,
}

/// Totals of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Records whose state moved and were saved.
    pub advanced: usize,
    /// Records already current.
    pub unchanged: usize,
    /// Records that could not be advanced (logged individually).
    pub failed: usize,
}

/// What an engine pass produced for one attempt.
struct Mutation<T> {
    value: T,
    audit: Option<AuditEntry>,
    dirty: bool,
}

/// The companion service.
///
/// Generic over the store so that tests run against
/// [`MemoryStore`](crate::store::MemoryStore) and production against the
/// `PostgreSQL` adapter.
pub struct CompanionService<S> {
    store: S,
    clock: Arc<dyn Clock>,
    engine: EngineConfig,
    replies: Box<dyn ReplySource>,
    random: Mutex<Box<dyn RandomSource + Send>>,
    locks: KeyedLocks<CompanionId>,
    chats: Arc<TtlStore<CompanionId, ChatMessage>>,
    max_retries: u32,
    sweep_concurrency: usize,
}

impl<S> std::fmt::Debug for CompanionService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompanionService")
            .field("engine", &self.engine)
            .field("max_retries", &self.max_retries)
            .field("sweep_concurrency", &self.sweep_concurrency)
            .finish_non_exhaustive()
    }
}

impl<S: CompanionStore> CompanionService<S> {
    /// Build a service with canned replies, an OS-seeded random source and
    /// a private chat transcript store.
    pub fn new(
        store: S,
        clock: Arc<dyn Clock>,
        engine: EngineConfig,
        sweep: &SweepConfig,
    ) -> Self {
        Self {
            store,
            clock,
            engine,
            replies: Box::new(CannedReplies::default()),
            random: Mutex::new(Box::new(RngSource::from_entropy())),
            locks: KeyedLocks::new(),
            chats: Arc::new(TtlStore::new(sweep.chat_retention())),
            max_retries: sweep.max_retries.max(1),
            sweep_concurrency: sweep.concurrency.max(1),
        }
    }

    /// Replace the generic reply source.
    #[must_use]
    pub fn with_replies(mut self, replies: Box<dyn ReplySource>) -> Self {
        self.replies = replies;
        self
    }

    /// Replace the random source used for chat rewards.
    #[must_use]
    pub fn with_random(mut self, random: Box<dyn RandomSource + Send>) -> Self {
        self.random = Mutex::new(random);
        self
    }

    /// Keep chat transcripts in `chats` instead of a private store.
    #[must_use]
    pub fn with_chat_store(mut self, chats: Arc<TtlStore<CompanionId, ChatMessage>>) -> Self {
        self.chats = chats;
        self
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The engine configuration in use.
    pub const fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    /// The clock reading at the precision the stores keep (microseconds).
    fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(6)
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Create a companion for `owner_id`.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Conflict`] if the owner already has one,
    /// [`ServiceError::Engine`] for an invalid name.
    pub async fn adopt(&self, owner_id: OwnerId, name: &str) -> Result<Companion, ServiceError> {
        let companion = companion_engine::adopt(owner_id, name, self.now(), &self.engine)?;
        if self.store.find_by_owner(owner_id).await?.is_some() {
            return Err(ServiceError::Conflict {
                reason: format!("owner {owner_id} already has a companion"),
            });
        }
        self.store.insert(&companion).await?;
        info!(companion_id = %companion.id, owner_id = %owner_id, "companion adopted");
        Ok(companion)
    }

    /// The record caught up to now.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for an unknown id; store and engine
    /// failures otherwise.
    pub async fn get_current(&self, id: CompanionId) -> Result<Companion, ServiceError> {
        let (companion, ()) = self
            .mutate(id, |companion, now| {
                let report = companion_engine::advance(companion, now, &self.engine)?;
                Ok(Mutation {
                    value: (),
                    audit: None,
                    dirty: report.changed(),
                })
            })
            .await?;
        Ok(companion)
    }

    /// Feed the companion.
    ///
    /// # Errors
    ///
    /// See [`CompanionService::get_current`].
    pub async fn feed(&self, id: CompanionId) -> Result<ActionResponse, ServiceError> {
        self.act(id, ActionKind::Feed).await
    }

    /// Play with the companion.
    ///
    /// # Errors
    ///
    /// See [`CompanionService::get_current`].
    pub async fn play(&self, id: CompanionId) -> Result<ActionResponse, ServiceError> {
        self.act(id, ActionKind::Play).await
    }

    /// Touch the companion.
    ///
    /// # Errors
    ///
    /// See [`CompanionService::get_current`].
    pub async fn touch(&self, id: CompanionId) -> Result<ActionResponse, ServiceError> {
        self.act(id, ActionKind::Touch).await
    }

    async fn act(&self, id: CompanionId, kind: ActionKind) -> Result<ActionResponse, ServiceError> {
        let (companion, result) = self
            .mutate(id, |companion, now| {
                let result = companion_engine::execute(companion, kind, now, &self.engine)?;
                let dirty = result.applied() || result.catch_up.changed();
                Ok(Mutation {
                    audit: result.audit.clone(),
                    value: result,
                    dirty,
                })
            })
            .await?;
        Ok(ActionResponse {
            companion,
            outcome: result.outcome,
            cooldown_remaining: result.cooldown_remaining(),
            message: result.message,
        })
    }

    /// Send `text` to the companion and get its reply.
    ///
    /// Both sides of the exchange are kept in the transcript.
    ///
    /// # Errors
    ///
    /// See [`CompanionService::get_current`].
    pub async fn chat(&self, id: CompanionId, text: &str) -> Result<ChatResponse, ServiceError> {
        let (companion, (reply, at)) = self
            .mutate(id, |companion, now| {
                let mut random = self.random.lock().unwrap_or_else(PoisonError::into_inner);
                let turn = companion_engine::respond(
                    companion,
                    text,
                    now,
                    &self.engine,
                    self.replies.as_ref(),
                    random.as_mut(),
                )?;
                Ok(Mutation {
                    value: (turn.reply, now),
                    audit: None,
                    dirty: true,
                })
            })
            .await?;

        self.record_message(id, ChatSender::Owner, text.to_owned(), at)
            .await;
        self.record_message(id, ChatSender::Companion, reply.clone(), at)
            .await;
        Ok(ChatResponse { reply, companion })
    }

    async fn record_message(
        &self,
        companion_id: CompanionId,
        sender: ChatSender,
        text: String,
        at: DateTime<Utc>,
    ) {
        let message = ChatMessage {
            id: ChatMessageId::new(),
            companion_id,
            sender,
            text,
            created_at: at,
        };
        self.chats.push(companion_id, message, at).await;
    }

    /// The most recent `limit` transcript messages, oldest first.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for an unknown id.
    pub async fn chat_history(
        &self,
        id: CompanionId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, ServiceError> {
        self.store.load(id).await?;
        Ok(self.chats.recent(&id, limit, self.now()).await)
    }

    /// Drop transcript messages past their retention. Returns how many.
    pub async fn evict_expired_chats(&self) -> usize {
        let evicted = self.chats.evict_expired(self.now()).await;
        if evicted > 0 {
            info!(evicted, "expired chat messages evicted");
        }
        evicted
    }

    /// Catch up every record in `ids`.
    ///
    /// Individual failures are logged and counted; they never abort the
    /// sweep.
    pub async fn sweep_all(&self, ids: Vec<CompanionId>) -> SweepSummary {
        let summary = stream::iter(ids)
            .map(|id| async move { (id, self.sweep_one(id).await) })
            .buffer_unordered(self.sweep_concurrency)
            .fold(SweepSummary::default(), |mut summary, (id, result)| async move {
                match result {
                    Ok(true) => summary.advanced = summary.advanced.saturating_add(1),
                    Ok(false) => summary.unchanged = summary.unchanged.saturating_add(1),
                    Err(e) => {
                        warn!(companion_id = %id, error = %e, "sweep failed for companion");
                        summary.failed = summary.failed.saturating_add(1);
                    }
                }
                summary
            })
            .await;

        let pruned = self.locks.prune();
        debug!(
            advanced = summary.advanced,
            unchanged = summary.unchanged,
            failed = summary.failed,
            pruned_locks = pruned,
            "sweep complete"
        );
        summary
    }

    /// Sweep every stored record.
    ///
    /// # Errors
    ///
    /// Returns an error only if the id listing fails.
    pub async fn sweep_stored(&self) -> Result<SweepSummary, ServiceError> {
        let ids = self.store.list_ids().await?;
        Ok(self.sweep_all(ids).await)
    }

    async fn sweep_one(&self, id: CompanionId) -> Result<bool, ServiceError> {
        let (_, changed) = self
            .mutate(id, |companion, now| {
                let report = companion_engine::advance(companion, now, &self.engine)?;
                Ok(Mutation {
                    value: report.changed(),
                    audit: None,
                    dirty: report.changed(),
                })
            })
            .await?;
        Ok(changed)
    }

    // -----------------------------------------------------------------------
    // Load / compute / save
    // -----------------------------------------------------------------------

    async fn mutate<T, F>(
        &self,
        id: CompanionId,
        mut apply: F,
    ) -> Result<(Companion, T), ServiceError>
    where
        F: FnMut(&mut Companion, DateTime<Utc>) -> Result<Mutation<T>, EngineError>,
    {
        let _guard = self.locks.lock(&id).await;
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);
            let mut companion = self.store.load(id).await?;
            let faults = companion_engine::sanitize(&mut companion, &self.engine);

            let now = self.now();
            let mutation = apply(&mut companion, now)?;
            if !mutation.dirty && faults.is_empty() {
                return Ok((companion, mutation.value));
            }

            companion.updated_at = now;
            match self.store.save(&companion, mutation.audit.as_ref()).await {
                Ok(version) => {
                    companion.version = version;
                    return Ok((companion, mutation.value));
                }
                Err(StoreError::VersionConflict { .. }) if attempt < self.max_retries => {
                    warn!(
                        companion_id = %id,
                        attempt,
                        "version conflict, reloading"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
