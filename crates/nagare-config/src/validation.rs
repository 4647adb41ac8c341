// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as valid bind addresses, non-empty paths, and confidence ranges.

use crate::diagnostic::ConfigError;
use crate::model::NagareConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &NagareConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // Validate server.host is not empty
    if config.server.host.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    }

    // Validate server.host looks like a valid IP or hostname
    if !config.server.host.trim().is_empty() {
        let addr = config.server.host.trim();
        // Accept valid IPv4, IPv6, or hostname patterns
        let is_valid_ip = addr.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = addr
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("server.host `{addr}` is not a valid IP address or hostname"),
            });
        }
    }

    // Validate database_path is not empty
    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    // Validate confidence values are probabilities
    for (key, value) in [
        ("grounded", config.ai.confidence.grounded),
        ("grounded_escalated", config.ai.confidence.grounded_escalated),
        ("ungrounded", config.ai.confidence.ungrounded),
    ] {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ConfigError::Validation {
                message: format!("ai.confidence.{key} must be within 0.0..=1.0, got {value}"),
            });
        }
    }

    // An empty phrase is a substring of every reply and would escalate everything
    for (i, phrase) in config.ai.escalation_phrases.iter().enumerate() {
        if phrase.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("ai.escalation_phrases[{i}] must not be empty"),
            });
        }
    }

    if config.ai.fallback_reply.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "ai.fallback_reply must not be empty".to_string(),
        });
    }

    if config.poller.batch_size < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "poller.batch_size must be at least 1, got {}",
                config.poller.batch_size
            ),
        });
    }

    if config.poller.interval_secs < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "poller.interval_secs must be at least 1, got {}",
                config.poller.interval_secs
            ),
        });
    }

    if config.anthropic.max_tokens < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "anthropic.max_tokens must be at least 1, got {}",
                config.anthropic.max_tokens
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
