// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Nagare delivery engine.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Nagare workspace: the contact directory,
//! scenario/delivery state machine, segment builder, and AI reply pipeline
//! all speak the vocabulary defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::NagareError;
pub use types::{
    AdapterType, ChatLogId, ChatReply, ChatRequest, ChatTurn, ContactId, ContactStatus,
    DeliveryLogId, DeliveryStatus, Direction, EscalationId, EscalationPriority,
    EscalationStatus, HealthStatus, KnowledgeId, MessageId, OutgoingMessage, Profile,
    ReplyMode, ScenarioId, ScenarioStepId, TagId, TriggerKind, TurnRole,
};

// Re-export all adapter traits at crate root.
pub use traits::{PlatformAdapter, PluginAdapter, ProviderAdapter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nagare_error_variants_construct_and_display() {
        let errors = [
            NagareError::Config("bad".into()),
            NagareError::Storage {
                source: Box::new(std::io::Error::other("db")),
            },
            NagareError::SignatureMissing,
            NagareError::SignatureInvalid,
            NagareError::PayloadMalformed("not json".into()),
            NagareError::Platform {
                message: "push failed".into(),
                source: None,
            },
            NagareError::Provider {
                message: "api down".into(),
                source: None,
            },
            NagareError::ContactUnresolved {
                contact_id: "c-1".into(),
            },
            NagareError::TriggerConfig {
                scenario_id: "s-1".into(),
                detail: "expected keywords".into(),
            },
            NagareError::InvalidCondition("bad operator".into()),
            NagareError::NotFound("scenario s-1".into()),
            NagareError::Internal("boom".into()),
        ];
        for e in errors {
            assert!(!e.to_string().is_empty());
        }
    }

    #[test]
    fn signature_errors_display_without_leaking_detail() {
        assert_eq!(
            NagareError::SignatureMissing.to_string(),
            "missing webhook signature"
        );
        assert_eq!(
            NagareError::SignatureInvalid.to_string(),
            "invalid webhook signature"
        );
    }

    #[test]
    fn adapter_traits_are_object_safe() {
        fn _platform(_: &dyn PlatformAdapter) {}
        fn _provider(_: &dyn ProviderAdapter) {}
        fn _base(_: &dyn PluginAdapter) {}
    }
}
