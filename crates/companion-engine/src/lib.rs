//! Vitals decay, cooldowns, actions and progression for virtual companions.
//!
//! This crate contains the pure logic layer -- everything that operates on a
//! [`Companion`](companion_types::Companion) record without touching I/O. It
//! sits between `companion-types` (which defines the records) and
//! `companion-core` (which handles locking, persistence and scheduling).
//!
//! Every entry point takes `now` explicitly. Given the same record, `now` and
//! configuration, the result is the same no matter how often the engine ran
//! before.
//!
//! # Modules
//!
//! - [`actions`] -- Feed, play and touch with cooldowns and audit entries
//! - [`adoption`] -- Creating a new companion
//! - [`chat`] -- Reply selection and chat rewards ([`RandomSource`], [`ReplySource`])
//! - [`config`] -- Tunable parameters ([`EngineConfig`])
//! - [`cooldown`] -- Per-action cooldown gate
//! - [`decay`] -- Catch-up of hunger, happiness and passive experience
//! - [`derived`] -- Health capped by starvation
//! - [`error`] -- Error types for all engine operations ([`EngineError`])
//! - [`integrity`] -- Load-time range checks
//! - [`progression`] -- Levels, growth stages, ultimate form
//! - [`timeline`] -- Cycle arithmetic on nanosecond instants

pub mod actions;
pub mod adoption;
pub mod chat;
pub mod config;
pub mod cooldown;
pub mod decay;
pub mod derived;
pub mod error;
pub mod integrity;
pub mod progression;
pub mod timeline;

// Re-export primary types at crate root for convenience.
pub use actions::{ActionOutcome, ActionResult, execute};
pub use adoption::{MAX_NAME_CHARS, adopt};
pub use chat::{
    CannedReplies, ChatTurn, RandomSource, ReplyReason, ReplySource, RngSource, respond,
};
pub use config::{
    ActionEffect, ActionsConfig, ChatConfig, EngineConfig, ProgressionConfig, VitalsConfig,
};
pub use cooldown::CooldownCheck;
pub use decay::{AdvanceReport, advance};
pub use error::EngineError;
pub use integrity::{IntegrityFault, sanitize};
pub use progression::LevelReport;
