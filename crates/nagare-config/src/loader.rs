// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./nagare.toml` > `~/.config/nagare/nagare.toml` > `/etc/nagare/nagare.toml`
//! with environment variable overrides via `NAGARE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::NagareConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/nagare/nagare.toml` (system-wide)
/// 3. `~/.config/nagare/nagare.toml` (user XDG config)
/// 4. `./nagare.toml` (local directory)
/// 5. `NAGARE_*` environment variables
pub fn load_config() -> Result<NagareConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(NagareConfig::default()))
        .merge(Toml::file("/etc/nagare/nagare.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("nagare/nagare.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("nagare.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env vars).
///
/// Used for testing and explicit config file specification.
pub fn load_config_from_str(toml_content: &str) -> Result<NagareConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(NagareConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<NagareConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(NagareConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// CRITICAL: Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names. For example, `NAGARE_LINE_CHANNEL_SECRET` must
/// map to `line.channel_secret`, not `line.channel.secret`.
fn env_provider() -> Env {
    Env::prefixed("NAGARE_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: NAGARE_LINE_CHANNEL_SECRET -> "line_channel_secret"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("app_", "app.", 1)
            .replacen("server_", "server.", 1)
            .replacen("line_", "line.", 1)
            .replacen("anthropic_", "anthropic.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("ai_", "ai.", 1)
            .replacen("poller_", "poller.", 1)
            .replacen("confidence_", "confidence.", 1);
        mapped.into()
    })
}
