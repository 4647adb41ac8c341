// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Claude provider adapter for Nagare.
//!
//! Implements [`ProviderAdapter`] over the Anthropic Messages API: one
//! synchronous completion per request, no streaming.

pub mod client;
pub mod types;

use async_trait::async_trait;
use nagare_config::NagareConfig;
use nagare_core::error::NagareError;
use nagare_core::traits::{PluginAdapter, ProviderAdapter};
use nagare_core::types::{AdapterType, ChatReply, ChatRequest, HealthStatus, TurnRole};
use tracing::{debug, info};

use crate::client::AnthropicClient;
use crate::types::{ApiMessage, MessageRequest};

/// Anthropic Claude provider implementing [`ProviderAdapter`].
///
/// API key resolution order: config -> `ANTHROPIC_API_KEY` env var -> error.
pub struct AnthropicProvider {
    client: AnthropicClient,
    model: String,
}

impl AnthropicProvider {
    /// Creates a new Anthropic provider from the given configuration.
    pub fn new(config: &NagareConfig) -> Result<Self, NagareError> {
        let api_key = resolve_api_key(&config.anthropic.api_key)?;
        let client = AnthropicClient::new(
            &api_key,
            &config.anthropic.api_version,
            &config.anthropic.base_url,
        )?;

        info!(model = config.anthropic.model, "Anthropic provider initialized");

        Ok(Self {
            client,
            model: config.anthropic.model.clone(),
        })
    }
}

#[async_trait]
impl PluginAdapter for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, NagareError> {
        // Verifying the key would cost tokens; report healthy when the
        // client is constructed.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), NagareError> {
        debug!("Anthropic provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    async fn complete(&self, request: ChatRequest) -> Result<ChatReply, NagareError> {
        let messages: Vec<ApiMessage> = request
            .turns
            .iter()
            .map(|turn| ApiMessage {
                role: match turn.role {
                    TurnRole::User => "user".to_string(),
                    TurnRole::Assistant => "assistant".to_string(),
                },
                content: turn.content.clone(),
            })
            .collect();

        let api_request = MessageRequest {
            model: self.model.clone(),
            messages,
            system: Some(request.system),
            max_tokens: request.max_tokens,
        };
        let response = self.client.complete_message(&api_request).await?;

        Ok(ChatReply {
            text: response.first_text().to_string(),
            model: response.model,
        })
    }
}

/// Resolves the API key from config or environment.
fn resolve_api_key(config_key: &Option<String>) -> Result<String, NagareError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.clone());
    }

    std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
        NagareError::Config(
            "Anthropic API key not found. Set anthropic.api_key in config or ANTHROPIC_API_KEY environment variable.".into(),
        )
    })
}
