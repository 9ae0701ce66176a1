//! Shared type definitions for the companion vitals engine.
//!
//! This crate is the single source of truth for the records exchanged
//! between the engine, the service layer and the persistence adapters.
//! Types flow to `TypeScript` via `ts-rs` for client consumers.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for all entity identifiers
//! - [`enums`] -- Growth stages, ultimate forms, action kinds, vitals
//! - [`structs`] -- The companion record, audit entries and chat messages

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{ActionKind, ChatSender, GrowthStage, ParseEnumError, UltimateForm, Vital};
pub use ids::{AuditEntryId, ChatMessageId, CompanionId, OwnerId};
pub use structs::{Attributes, AuditEntry, ChatMessage, Companion, VitalsSnapshot};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for every exported type.

    #[test]
    fn export_bindings() {
        // Calling export_all writes the bindings into `bindings/`
        // relative to the crate root.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::CompanionId::export_all();
        let _ = crate::ids::OwnerId::export_all();
        let _ = crate::ids::AuditEntryId::export_all();
        let _ = crate::ids::ChatMessageId::export_all();

        // Enums
        let _ = crate::enums::GrowthStage::export_all();
        let _ = crate::enums::UltimateForm::export_all();
        let _ = crate::enums::ActionKind::export_all();
        let _ = crate::enums::Vital::export_all();
        let _ = crate::enums::ChatSender::export_all();

        // Structs
        let _ = crate::structs::Attributes::export_all();
        let _ = crate::structs::Companion::export_all();
        let _ = crate::structs::VitalsSnapshot::export_all();
        let _ = crate::structs::AuditEntry::export_all();
        let _ = crate::structs::ChatMessage::export_all();
    }
}
