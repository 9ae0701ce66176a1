//! `PostgreSQL` implementation of [`CompanionStore`].
//!
//! One row per companion in `companions`. Saves are compare-and-swap on the
//! `version` column: the `UPDATE` matches only when the stored version still
//! equals the version the caller loaded, and the audit entry is inserted in
//! the same transaction.

use chrono::{DateTime, Utc};
use companion_core::{CompanionStore, StoreError};
use companion_types::{
    Attributes, AuditEntry, Companion, CompanionId, GrowthStage, OwnerId, UltimateForm,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::audit_store::{self, AuditStore};
use crate::error::DbError;
use crate::postgres::PostgresPool;

/// Name of the unique constraint on `companions.owner_id`.
const OWNER_CONSTRAINT: &str = "companions_owner_id_key";

const SELECT_COLUMNS: &str = r"SELECT id, owner_id, name, hunger, happiness, health, intimacy,
       experience, level, growth_stage, sub_stage, attributes, ultimate_form,
       last_feed_at, last_play_at, last_touch_at,
       hunger_decay_anchor, happiness_decay_anchor, exp_growth_anchor,
       created_at, updated_at, version
  FROM companions";

/// Companion records stored in `PostgreSQL`.
#[derive(Clone)]
pub struct PgCompanionStore {
    pool: PgPool,
}

impl PgCompanionStore {
    /// Create a store over an open pool.
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool().clone(),
        }
    }

    /// Audit queries sharing this store's pool.
    pub const fn audit(&self) -> AuditStore<'_> {
        AuditStore::new(&self.pool)
    }

    async fn fetch(&self, id: CompanionId) -> Result<Option<Companion>, DbError> {
        let row = sqlx::query_as::<_, CompanionRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id.into_inner())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Companion::try_from).transpose()
    }

    async fn fetch_by_owner(&self, owner_id: OwnerId) -> Result<Option<Companion>, DbError> {
        let row =
            sqlx::query_as::<_, CompanionRow>(&format!("{SELECT_COLUMNS} WHERE owner_id = $1"))
                .bind(owner_id.into_inner())
                .fetch_optional(&self.pool)
                .await?;
        row.map(Companion::try_from).transpose()
    }

    async fn insert_row(&self, companion: &Companion) -> Result<(), DbError> {
        let cols = Columns::from_companion(companion)?;
        sqlx::query(
            r"INSERT INTO companions (id, owner_id, name, hunger, happiness, health, intimacy,
                  experience, level, growth_stage, sub_stage, attributes, ultimate_form,
                  last_feed_at, last_play_at, last_touch_at,
                  hunger_decay_anchor, happiness_decay_anchor, exp_growth_anchor,
                  updated_at, created_at, version)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                      $17, $18, $19, $20, $21, $22)",
        )
        .bind(companion.id.into_inner())
        .bind(companion.owner_id.into_inner())
        .bind(&companion.name)
        .bind(cols.hunger)
        .bind(cols.happiness)
        .bind(cols.health)
        .bind(cols.intimacy)
        .bind(cols.experience)
        .bind(cols.level)
        .bind(companion.growth_stage.as_str())
        .bind(cols.sub_stage)
        .bind(&cols.attributes)
        .bind(companion.ultimate_form.map(UltimateForm::as_str))
        .bind(companion.last_feed_at)
        .bind(companion.last_play_at)
        .bind(companion.last_touch_at)
        .bind(companion.hunger_decay_anchor)
        .bind(companion.happiness_decay_anchor)
        .bind(companion.exp_growth_anchor)
        .bind(companion.updated_at)
        .bind(companion.created_at)
        .bind(cols.version)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Run the conditional update and audit insert. `Ok(None)` means no row
    /// matched `(id, version)`.
    async fn save_row(
        &self,
        companion: &Companion,
        audit: Option<&AuditEntry>,
    ) -> Result<Option<u64>, DbError> {
        let cols = Columns::from_companion(companion)?;
        let mut tx = self.pool.begin().await?;

        let updated: Option<(i64,)> = sqlx::query_as(
            r"UPDATE companions
                 SET name = $3, hunger = $4, happiness = $5, health = $6, intimacy = $7,
                     experience = $8, level = $9, growth_stage = $10, sub_stage = $11,
                     attributes = $12, ultimate_form = $13,
                     last_feed_at = $14, last_play_at = $15, last_touch_at = $16,
                     hunger_decay_anchor = $17, happiness_decay_anchor = $18,
                     exp_growth_anchor = $19, updated_at = $20,
                     version = version + 1
               WHERE id = $1 AND version = $2
           RETURNING version",
        )
        .bind(companion.id.into_inner())
        .bind(cols.version)
        .bind(&companion.name)
        .bind(cols.hunger)
        .bind(cols.happiness)
        .bind(cols.health)
        .bind(cols.intimacy)
        .bind(cols.experience)
        .bind(cols.level)
        .bind(companion.growth_stage.as_str())
        .bind(cols.sub_stage)
        .bind(&cols.attributes)
        .bind(companion.ultimate_form.map(UltimateForm::as_str))
        .bind(companion.last_feed_at)
        .bind(companion.last_play_at)
        .bind(companion.last_touch_at)
        .bind(companion.hunger_decay_anchor)
        .bind(companion.happiness_decay_anchor)
        .bind(companion.exp_growth_anchor)
        .bind(companion.updated_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((version,)) = updated else {
            return Ok(None);
        };

        if let Some(entry) = audit {
            audit_store::insert_entry(&mut *tx, entry).await?;
        }
        tx.commit().await?;

        let version = from_db_u64(version, "version")?;
        tracing::debug!(
            companion_id = %companion.id,
            version,
            audited = audit.is_some(),
            "Saved companion"
        );
        Ok(Some(version))
    }

    async fn exists(&self, id: CompanionId) -> Result<bool, DbError> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM companions WHERE id = $1)")
            .bind(id.into_inner())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    async fn ids(&self) -> Result<Vec<CompanionId>, DbError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM companions ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| CompanionId::from(id)).collect())
    }
}

impl CompanionStore for PgCompanionStore {
    async fn load(&self, id: CompanionId) -> Result<Companion, StoreError> {
        self.fetch(id).await?.ok_or(StoreError::NotFound { id })
    }

    async fn find_by_owner(&self, owner_id: OwnerId) -> Result<Option<Companion>, StoreError> {
        Ok(self.fetch_by_owner(owner_id).await?)
    }

    async fn insert(&self, companion: &Companion) -> Result<(), StoreError> {
        match self.insert_row(companion).await {
            Ok(()) => Ok(()),
            Err(DbError::Postgres(e)) if is_owner_conflict(&e) => Err(StoreError::DuplicateOwner {
                owner_id: companion.owner_id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(
        &self,
        companion: &Companion,
        audit: Option<&AuditEntry>,
    ) -> Result<u64, StoreError> {
        if let Some(version) = self.save_row(companion, audit).await? {
            return Ok(version);
        }
        if self.exists(companion.id).await? {
            tracing::warn!(
                companion_id = %companion.id,
                expected = companion.version,
                "Version conflict on save"
            );
            Err(StoreError::VersionConflict {
                id: companion.id,
                expected: companion.version,
            })
        } else {
            Err(StoreError::NotFound { id: companion.id })
        }
    }

    async fn list_ids(&self) -> Result<Vec<CompanionId>, StoreError> {
        Ok(self.ids().await?)
    }
}

fn is_owner_conflict(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db)
            if db.is_unique_violation() && db.constraint() == Some(OWNER_CONSTRAINT)
    )
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

/// Numeric and JSON columns converted to their database representation.
struct Columns {
    hunger: i32,
    happiness: i32,
    health: i32,
    intimacy: i32,
    experience: i64,
    level: i32,
    sub_stage: i32,
    attributes: serde_json::Value,
    version: i64,
}

impl Columns {
    fn from_companion(c: &Companion) -> Result<Self, DbError> {
        Ok(Self {
            hunger: to_db_u32(c.hunger, "hunger")?,
            happiness: to_db_u32(c.happiness, "happiness")?,
            health: to_db_u32(c.health, "health")?,
            intimacy: to_db_u32(c.intimacy, "intimacy")?,
            experience: to_db_u64(c.experience, "experience")?,
            level: to_db_u32(c.level, "level")?,
            sub_stage: to_db_u32(c.sub_stage, "sub_stage")?,
            attributes: serde_json::to_value(c.attributes)?,
            version: to_db_u64(c.version, "version")?,
        })
    }
}

/// A row from the `companions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CompanionRow {
    /// Companion id.
    pub id: Uuid,
    /// Owning account.
    pub owner_id: Uuid,
    /// Display name.
    pub name: String,
    /// Satiety.
    pub hunger: i32,
    /// Mood.
    pub happiness: i32,
    /// Health.
    pub health: i32,
    /// Bond with the owner.
    pub intimacy: i32,
    /// Experience towards the next level.
    pub experience: i64,
    /// Current level.
    pub level: i32,
    /// Growth stage name.
    pub growth_stage: String,
    /// Sub-stage within the growth stage.
    pub sub_stage: i32,
    /// Attributes as JSON.
    pub attributes: serde_json::Value,
    /// Ultimate form name, once reached.
    pub ultimate_form: Option<String>,
    /// Last feed.
    pub last_feed_at: Option<DateTime<Utc>>,
    /// Last play.
    pub last_play_at: Option<DateTime<Utc>>,
    /// Last touch.
    pub last_touch_at: Option<DateTime<Utc>>,
    /// Hunger decay anchor.
    pub hunger_decay_anchor: Option<DateTime<Utc>>,
    /// Happiness decay anchor.
    pub happiness_decay_anchor: Option<DateTime<Utc>>,
    /// Experience growth anchor.
    pub exp_growth_anchor: Option<DateTime<Utc>>,
    /// Adoption time.
    pub created_at: DateTime<Utc>,
    /// Last write.
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency counter.
    pub version: i64,
}

impl TryFrom<CompanionRow> for Companion {
    type Error = DbError;

    fn try_from(row: CompanionRow) -> Result<Self, Self::Error> {
        let growth_stage: GrowthStage =
            row.growth_stage
                .parse()
                .map_err(|e: companion_types::ParseEnumError| DbError::InvalidRow {
                    column: "growth_stage",
                    reason: e.to_string(),
                })?;
        let ultimate_form = row
            .ultimate_form
            .as_deref()
            .map(str::parse::<UltimateForm>)
            .transpose()
            .map_err(|e| DbError::InvalidRow {
                column: "ultimate_form",
                reason: e.to_string(),
            })?;
        let attributes: Attributes = serde_json::from_value(row.attributes)?;

        Ok(Self {
            id: CompanionId::from(row.id),
            owner_id: OwnerId::from(row.owner_id),
            name: row.name,
            hunger: from_db_u32(row.hunger, "hunger")?,
            happiness: from_db_u32(row.happiness, "happiness")?,
            health: from_db_u32(row.health, "health")?,
            intimacy: from_db_u32(row.intimacy, "intimacy")?,
            experience: from_db_u64(row.experience, "experience")?,
            level: from_db_u32(row.level, "level")?,
            growth_stage,
            sub_stage: from_db_u32(row.sub_stage, "sub_stage")?,
            attributes,
            ultimate_form,
            last_feed_at: row.last_feed_at,
            last_play_at: row.last_play_at,
            last_touch_at: row.last_touch_at,
            hunger_decay_anchor: row.hunger_decay_anchor,
            happiness_decay_anchor: row.happiness_decay_anchor,
            exp_growth_anchor: row.exp_growth_anchor,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: from_db_u64(row.version, "version")?,
        })
    }
}

pub(crate) fn to_db_u32(value: u32, column: &'static str) -> Result<i32, DbError> {
    i32::try_from(value).map_err(|e| DbError::InvalidRow {
        column,
        reason: e.to_string(),
    })
}

pub(crate) fn from_db_u32(value: i32, column: &'static str) -> Result<u32, DbError> {
    u32::try_from(value).map_err(|e| DbError::InvalidRow {
        column,
        reason: e.to_string(),
    })
}

fn to_db_u64(value: u64, column: &'static str) -> Result<i64, DbError> {
    i64::try_from(value).map_err(|e| DbError::InvalidRow {
        column,
        reason: e.to_string(),
    })
}

fn from_db_u64(value: i64, column: &'static str) -> Result<u64, DbError> {
    u64::try_from(value).map_err(|e| DbError::InvalidRow {
        column,
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row() -> CompanionRow {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        CompanionRow {
            id: Uuid::now_v7(),
            owner_id: Uuid::now_v7(),
            name: String::from("Mochi"),
            hunger: 7,
            happiness: 10,
            health: 10,
            intimacy: 3,
            experience: 42,
            level: 2,
            growth_stage: String::from("teen"),
            sub_stage: 2,
            attributes: serde_json::to_value(Attributes::default()).unwrap(),
            ultimate_form: None,
            last_feed_at: Some(now),
            last_play_at: None,
            last_touch_at: None,
            hunger_decay_anchor: Some(now),
            happiness_decay_anchor: None,
            exp_growth_anchor: None,
            created_at: now,
            updated_at: now,
            version: 5,
        }
    }

    #[test]
    fn row_converts_to_companion() {
        let companion = Companion::try_from(row()).unwrap();
        assert_eq!(companion.name, "Mochi");
        assert_eq!(companion.hunger, 7);
        assert_eq!(companion.growth_stage, GrowthStage::Teen);
        assert_eq!(companion.attributes, Attributes::default());
        assert_eq!(companion.version, 5);
    }

    #[test]
    fn negative_vital_is_rejected() {
        let mut bad = row();
        bad.health = -1;
        let err = Companion::try_from(bad).unwrap_err();
        assert!(matches!(err, DbError::InvalidRow { column: "health", .. }));
    }

    #[test]
    fn unknown_stage_is_rejected() {
        let mut bad = row();
        bad.growth_stage = String::from("larva");
        let err = Companion::try_from(bad).unwrap_err();
        assert!(matches!(err, DbError::InvalidRow { column: "growth_stage", .. }));
    }

    #[test]
    fn columns_roundtrip_through_row() {
        let companion = Companion::try_from(row()).unwrap();
        let cols = Columns::from_companion(&companion).unwrap();
        assert_eq!(cols.hunger, 7);
        assert_eq!(cols.experience, 42);
        assert_eq!(cols.version, 5);
    }
}
