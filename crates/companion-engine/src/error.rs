//! Error types for the companion-engine crate.
//!
//! All engine operations that can fail return typed errors rather than
//! panicking. Cooldowns and capped vitals are *not* errors; they are
//! reported through the action outcome.

/// Errors that can occur while advancing or mutating a companion record.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// An arithmetic overflow occurred during a vital computation.
    #[error("arithmetic overflow in vital computation: {context}")]
    ArithmeticOverflow {
        /// Description of what was being computed.
        context: String,
    },

    /// A computed instant fell outside the representable time range.
    #[error("timestamp out of range: {context}")]
    TimeOutOfRange {
        /// Description of what was being computed.
        context: String,
    },

    /// The engine configuration is unusable.
    #[error("invalid engine configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },

    /// A companion name was rejected at adoption.
    #[error("invalid companion name: {reason}")]
    InvalidName {
        /// Why the name was rejected.
        reason: String,
    },
}
