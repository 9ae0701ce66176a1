//! The `companion_audit` table: one immutable row per executed action.
//!
//! Rows are written by [`PgCompanionStore`](crate::PgCompanionStore) inside
//! the same transaction as the record update; this module also provides
//! the read side.

use chrono::{DateTime, Utc};
use companion_types::{ActionKind, AuditEntry, AuditEntryId, CompanionId, VitalsSnapshot};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::companion_store::{from_db_u32, to_db_u32};
use crate::error::DbError;

/// Read access to the audit trail.
pub struct AuditStore<'a> {
    pool: &'a PgPool,
}

impl<'a> AuditStore<'a> {
    /// Create an audit store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The most recent `limit` entries for a companion, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails, or
    /// [`DbError::InvalidRow`] if a stored row cannot be decoded.
    pub async fn entries_for(
        &self,
        companion_id: CompanionId,
        limit: u32,
    ) -> Result<Vec<AuditEntry>, DbError> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r"SELECT id, companion_id, action, action_value, before, after, created_at
                FROM (SELECT * FROM companion_audit
                       WHERE companion_id = $1
                       ORDER BY created_at DESC, id DESC
                       LIMIT $2) recent
               ORDER BY created_at, id",
        )
        .bind(companion_id.into_inner())
        .bind(i64::from(limit))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(AuditEntry::try_from).collect()
    }

    /// Number of entries recorded for a companion.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn count_for(&self, companion_id: CompanionId) -> Result<u64, DbError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM companion_audit WHERE companion_id = $1")
                .bind(companion_id.into_inner())
                .fetch_one(self.pool)
                .await?;
        Ok(u64::try_from(row.0).unwrap_or(0))
    }
}

/// Insert one entry on an open connection or transaction.
pub(crate) async fn insert_entry(
    conn: &mut PgConnection,
    entry: &AuditEntry,
) -> Result<(), DbError> {
    sqlx::query(
        r"INSERT INTO companion_audit (id, companion_id, action, action_value, before, after, created_at)
          VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(entry.id.into_inner())
    .bind(entry.companion_id.into_inner())
    .bind(entry.action.as_str())
    .bind(to_db_u32(entry.action_value, "action_value")?)
    .bind(serde_json::to_value(entry.before)?)
    .bind(serde_json::to_value(entry.after)?)
    .bind(entry.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// A row from the `companion_audit` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditRow {
    /// Entry id.
    pub id: Uuid,
    /// Companion the action applied to.
    pub companion_id: Uuid,
    /// Action name.
    pub action: String,
    /// Primary increment of the action.
    pub action_value: i32,
    /// Vitals before, as JSON.
    pub before: serde_json::Value,
    /// Vitals after, as JSON.
    pub after: serde_json::Value,
    /// When the action ran.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = DbError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let action: ActionKind = row.action.parse().map_err(
            |e: companion_types::ParseEnumError| DbError::InvalidRow {
                column: "action",
                reason: e.to_string(),
            },
        )?;
        let before: VitalsSnapshot = serde_json::from_value(row.before)?;
        let after: VitalsSnapshot = serde_json::from_value(row.after)?;
        Ok(Self {
            id: AuditEntryId::from(row.id),
            companion_id: CompanionId::from(row.companion_id),
            action,
            action_value: from_db_u32(row.action_value, "action_value")?,
            before,
            after,
            created_at: row.created_at,
        })
    }
}
