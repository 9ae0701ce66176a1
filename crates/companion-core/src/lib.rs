//! Service layer for the companion vitals engine.
//!
//! This crate wires the pure engine to the outside world: it reads the
//! clock, serializes writers per companion, persists through a
//! [`CompanionStore`](store::CompanionStore), keeps chat transcripts and
//! runs the background sweep.
//!
//! # Modules
//!
//! - [`clock`] -- [`Clock`](clock::Clock) trait, system and manual clocks
//! - [`config`] -- Configuration loading from `companion-config.yaml` into
//!   strongly-typed structs
//! - [`locks`] -- Per-companion async locks
//! - [`service`] -- [`CompanionService`](service::CompanionService), the
//!   operation surface
//! - [`store`] -- Persistence port and the in-memory store
//! - [`sweep`] -- Periodic catch-up and chat eviction loops
//! - [`ttl`] -- Keyed entry lists with time-to-live eviction

pub mod clock;
pub mod config;
pub mod locks;
pub mod service;
pub mod store;
pub mod sweep;
pub mod ttl;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CompanionConfig, ConfigError, LogFormat};
pub use service::{
    ActionResponse, ChatResponse, CompanionService, DEFAULT_HISTORY_LIMIT, ServiceError,
    SweepSummary,
};
pub use store::{CompanionStore, MemoryStore, StoreError};
pub use ttl::TtlStore;
