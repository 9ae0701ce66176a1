//! `PostgreSQL` persistence for the companion service.
//!
//! Implements [`companion_core::CompanionStore`] over two tables:
//!
//! ```text
//! companions       one row per companion, CAS on `version`
//! companion_audit  one row per executed action, written in the same
//!                  transaction as the record update
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- Connection pool built from the infrastructure config, migrations
//! - [`companion_store`] -- [`PgCompanionStore`], the record store
//! - [`audit_store`] -- Audit trail insert and queries
//! - [`error`] -- Shared error types

pub mod audit_store;
pub mod companion_store;
pub mod error;
pub mod postgres;

// Re-export primary types for convenience.
pub use audit_store::{AuditRow, AuditStore};
pub use companion_store::{CompanionRow, PgCompanionStore};
pub use error::DbError;
pub use postgres::PostgresPool;
