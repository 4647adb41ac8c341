// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Nagare delivery engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use nagare_core::types::ReplyMode;
use serde::{Deserialize, Serialize};

/// Top-level Nagare configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NagareConfig {
    /// Application identity and logging.
    #[serde(default)]
    pub app: AppConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// LINE messaging platform settings.
    #[serde(default)]
    pub line: LineConfig,

    /// Anthropic API settings.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// AI reply pipeline settings.
    #[serde(default)]
    pub ai: AiConfig,

    /// Scheduled delivery poller settings.
    #[serde(default)]
    pub poller: PollerConfig,
}

/// Application identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Display name of the service.
    #[serde(default = "default_app_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_app_name() -> String {
    "nagare".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the server to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token protecting the admin API. `None` rejects all admin
    /// requests (fail closed); the public webhook route is unaffected.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

/// LINE messaging platform configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LineConfig {
    /// Channel secret used to verify webhook signatures. `None` rejects all
    /// webhook requests (fail closed).
    #[serde(default)]
    pub channel_secret: Option<String>,

    /// Channel access token used for reply/push/profile API calls.
    #[serde(default)]
    pub channel_access_token: Option<String>,

    /// Base URL of the messaging API.
    #[serde(default = "default_line_api_base")]
    pub api_base: String,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            channel_secret: None,
            channel_access_token: None,
            api_base: default_line_api_base(),
        }
    }
}

fn default_line_api_base() -> String {
    "https://api.line.me".to_string()
}

/// Anthropic API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// Anthropic API key. `None` disables the `ai` reply mode.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model to use for reply generation.
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens to generate per reply.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Base URL of the messages API.
    #[serde(default = "default_anthropic_base")]
    pub base_url: String,

    /// Anthropic API version string.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            base_url: default_anthropic_base(),
            api_version: default_api_version(),
        }
    }
}

fn default_model() -> String {
    "claude-3-5-haiku-20241022".to_string()
}

fn default_max_tokens() -> u32 {
    500
}

fn default_anthropic_base() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("nagare").join("nagare.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("nagare.db"))
        .to_string_lossy()
        .into_owned()
}

/// AI reply pipeline configuration.
///
/// The escalation phrase list and confidence table are configuration data so
/// they can be swapped and unit-tested independently of the LLM call path.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AiConfig {
    /// How inbound text messages are answered.
    #[serde(default = "default_reply_mode")]
    pub reply_mode: ReplyMode,

    /// Operator-handoff phrases; a generated reply containing any of them
    /// escalates the conversation.
    #[serde(default = "default_escalation_phrases")]
    pub escalation_phrases: Vec<String>,

    /// Fixed reply substituted when the LLM call fails.
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,

    /// Confidence heuristic values.
    #[serde(default)]
    pub confidence: ConfidenceConfig,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            reply_mode: default_reply_mode(),
            escalation_phrases: default_escalation_phrases(),
            fallback_reply: default_fallback_reply(),
            confidence: ConfidenceConfig::default(),
        }
    }
}

fn default_reply_mode() -> ReplyMode {
    ReplyMode::Echo
}

fn default_escalation_phrases() -> Vec<String> {
    [
        "担当者に確認",
        "担当者にお繋ぎ",
        "オペレーター",
        "確認いたします",
        "わかりかねます",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_fallback_reply() -> String {
    "申し訳ございません。現在応答を生成できません。担当者におつなぎいたします。".to_string()
}

/// Confidence heuristic table for the AI reply pipeline.
///
/// Not a model-reported score: `grounded` applies when knowledge was retrieved
/// and no escalation phrase fired, `grounded_escalated` when knowledge was
/// retrieved but an escalation phrase fired, `ungrounded` when no knowledge
/// was retrieved at all.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfidenceConfig {
    #[serde(default = "default_confidence_grounded")]
    pub grounded: f64,

    #[serde(default = "default_confidence_grounded_escalated")]
    pub grounded_escalated: f64,

    #[serde(default = "default_confidence_ungrounded")]
    pub ungrounded: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            grounded: default_confidence_grounded(),
            grounded_escalated: default_confidence_grounded_escalated(),
            ungrounded: default_confidence_ungrounded(),
        }
    }
}

fn default_confidence_grounded() -> f64 {
    0.8
}

fn default_confidence_grounded_escalated() -> f64 {
    0.3
}

fn default_confidence_ungrounded() -> f64 {
    0.2
}

/// Scheduled delivery poller configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PollerConfig {
    /// Seconds between poller invocations.
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,

    /// Maximum delivery-log rows claimed per invocation. Bounds per-invocation
    /// latency, not total throughput; backlog waits for the next tick.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_batch_size() -> u32 {
    50
}
