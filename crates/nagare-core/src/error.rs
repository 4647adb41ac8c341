// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Nagare delivery engine.

use thiserror::Error;

/// The primary error type used across all Nagare adapter traits and core operations.
#[derive(Debug, Error)]
pub enum NagareError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Webhook request carried no signature header. Rejected before the body is parsed.
    #[error("missing webhook signature")]
    SignatureMissing,

    /// Webhook signature did not match the request body. Rejected before the body is parsed.
    #[error("invalid webhook signature")]
    SignatureInvalid,

    /// A webhook payload or event could not be deserialized.
    #[error("malformed payload: {0}")]
    PayloadMalformed(String),

    /// Messaging platform errors (reply/push send failure, profile fetch, rate limiting).
    #[error("platform error: {message}")]
    Platform {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// LLM provider errors (API failure, token limits, model not found).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A delivery references a contact that can no longer be resolved to a
    /// sendable address. Counted as a failed delivery, never a batch abort.
    #[error("contact not resolvable: {contact_id}")]
    ContactUnresolved { contact_id: String },

    /// A scenario's trigger configuration failed to parse. The scenario is
    /// skipped for evaluation; others are unaffected.
    #[error("invalid trigger config for scenario {scenario_id}: {detail}")]
    TriggerConfig { scenario_id: String, detail: String },

    /// A segment condition failed operator or value validation.
    #[error("invalid segment condition: {0}")]
    InvalidCondition(String),

    /// A referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
