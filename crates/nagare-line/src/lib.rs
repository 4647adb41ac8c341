// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LINE Messaging API platform adapter.
//!
//! Implements [`PlatformAdapter`] over the LINE Messaging API: webhook
//! signature verification, webhook event payload types, and an HTTP client
//! for reply/push/profile calls.

pub mod client;
pub mod events;
pub mod signature;

use async_trait::async_trait;
use nagare_config::NagareConfig;
use nagare_core::traits::{PlatformAdapter, PluginAdapter};
use nagare_core::types::{AdapterType, HealthStatus, OutgoingMessage, Profile};
use nagare_core::NagareError;
use tracing::{debug, info};

pub use client::LineClient;
pub use events::{WebhookEnvelope, WebhookEvent};
pub use signature::verify_signature;

/// LINE platform adapter backed by the Messaging API.
pub struct LinePlatform {
    client: LineClient,
}

impl LinePlatform {
    /// Creates the adapter from configuration.
    ///
    /// Requires `line.channel_access_token`; the channel secret is only
    /// needed by the webhook endpoint and is checked there.
    pub fn new(config: &NagareConfig) -> Result<Self, NagareError> {
        let token = config
            .line
            .channel_access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                NagareError::Config(
                    "LINE channel access token is not configured. \
                     Set line.channel_access_token or NAGARE_LINE_CHANNEL_ACCESS_TOKEN."
                        .to_string(),
                )
            })?;

        let client = LineClient::new(token, &config.line.api_base)?;
        info!(api_base = config.line.api_base, "LINE platform adapter initialized");
        Ok(Self { client })
    }
}

#[async_trait]
impl PluginAdapter for LinePlatform {
    fn name(&self) -> &str {
        "line"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Platform
    }

    async fn health_check(&self) -> Result<HealthStatus, NagareError> {
        match self.client.bot_info().await {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), NagareError> {
        debug!("LINE platform adapter shut down");
        Ok(())
    }
}

#[async_trait]
impl PlatformAdapter for LinePlatform {
    async fn send_reply(
        &self,
        reply_token: &str,
        messages: &[OutgoingMessage],
    ) -> Result<(), NagareError> {
        self.client.reply(reply_token, messages).await
    }

    async fn send_push(&self, to: &str, messages: &[OutgoingMessage]) -> Result<(), NagareError> {
        self.client.push(to, messages).await
    }

    async fn get_profile(&self, external_id: &str) -> Result<Profile, NagareError> {
        self.client.profile(external_id).await
    }
}
