//! Persistence port for companion records.
//!
//! The service only talks to a [`CompanionStore`]. Saves are
//! compare-and-swap on [`Companion::version`]: a save succeeds only if the
//! stored version still equals the version the caller loaded, and the
//! optional audit entry is written in the same atomic step.
//!
//! [`MemoryStore`] is the in-process implementation used by tests and
//! single-node setups; `companion-db` provides the `PostgreSQL` one.

use std::collections::BTreeMap;
use std::future::Future;

use companion_types::{AuditEntry, Companion, CompanionId, OwnerId};
use tokio::sync::RwLock;

/// Errors reported by a [`CompanionStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record with this id.
    #[error("companion {id} not found")]
    NotFound {
        /// The missing id.
        id: CompanionId,
    },

    /// The stored version moved since the record was loaded.
    #[error("companion {id} was modified concurrently (expected version {expected})")]
    VersionConflict {
        /// The contended record.
        id: CompanionId,
        /// The version the caller loaded.
        expected: u64,
    },

    /// The owner already has a companion.
    #[error("owner {owner_id} already has a companion")]
    DuplicateOwner {
        /// The owner.
        owner_id: OwnerId,
    },

    /// The backend failed. Nothing was written.
    #[error("store backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },
}

/// Storage for companion records and their audit trail.
pub trait CompanionStore: Send + Sync {
    /// Fetch a record.
    fn load(&self, id: CompanionId) -> impl Future<Output = Result<Companion, StoreError>> + Send;

    /// Fetch the record adopted by `owner_id`, if any.
    fn find_by_owner(
        &self,
        owner_id: OwnerId,
    ) -> impl Future<Output = Result<Option<Companion>, StoreError>> + Send;

    /// Insert a new record. Fails with [`StoreError::DuplicateOwner`] if the
    /// owner already has one.
    fn insert(&self, companion: &Companion)
    -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Write `companion` if the stored version equals `companion.version`,
    /// together with `audit` when given. Returns the new version.
    fn save(
        &self,
        companion: &Companion,
        audit: Option<&AuditEntry>,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Ids of every stored record.
    fn list_ids(&self) -> impl Future<Output = Result<Vec<CompanionId>, StoreError>> + Send;
}

#[derive(Debug, Default)]
struct MemoryState {
    companions: BTreeMap<CompanionId, Companion>,
    audit: Vec<AuditEntry>,
}

/// In-process [`CompanionStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Audit entries recorded for `id`, oldest first.
    pub async fn audit_entries(&self, id: CompanionId) -> Vec<AuditEntry> {
        let state = self.state.read().await;
        state
            .audit
            .iter()
            .filter(|entry| entry.companion_id == id)
            .cloned()
            .collect()
    }
}

impl CompanionStore for MemoryStore {
    async fn load(&self, id: CompanionId) -> Result<Companion, StoreError> {
        let state = self.state.read().await;
        state
            .companions
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { id })
    }

    async fn find_by_owner(&self, owner_id: OwnerId) -> Result<Option<Companion>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .companions
            .values()
            .find(|c| c.owner_id == owner_id)
            .cloned())
    }

    async fn insert(&self, companion: &Companion) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state
            .companions
            .values()
            .any(|c| c.owner_id == companion.owner_id)
        {
            return Err(StoreError::DuplicateOwner {
                owner_id: companion.owner_id,
            });
        }
        state.companions.insert(companion.id, companion.clone());
        Ok(())
    }

    async fn save(
        &self,
        companion: &Companion,
        audit: Option<&AuditEntry>,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let stored = state
            .companions
            .get_mut(&companion.id)
            .ok_or(StoreError::NotFound { id: companion.id })?;
        if stored.version != companion.version {
            return Err(StoreError::VersionConflict {
                id: companion.id,
                expected: companion.version,
            });
        }
        let version = companion
            .version
            .checked_add(1)
            .ok_or_else(|| StoreError::Backend {
                message: String::from("version counter overflow"),
            })?;
        *stored = Companion {
            version,
            ..companion.clone()
        };
        if let Some(entry) = audit {
            state.audit.push(entry.clone());
        }
        Ok(version)
    }

    async fn list_ids(&self) -> Result<Vec<CompanionId>, StoreError> {
        let state = self.state.read().await;
        Ok(state.companions.keys().copied().collect())
    }
}
