// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock LLM provider adapter for deterministic testing.
//!
//! `MockProvider` implements `ProviderAdapter` with pre-configured replies,
//! enabling fast, CI-runnable tests without external API calls.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use nagare_core::traits::adapter::PluginAdapter;
use nagare_core::traits::provider::ProviderAdapter;
use nagare_core::types::{AdapterType, ChatReply, ChatRequest, HealthStatus};
use nagare_core::NagareError;

/// A mock LLM provider that returns pre-configured replies.
///
/// Completions are popped from a FIFO queue; `fail_next` scripts a provider
/// error at that queue position. When the queue is empty, a default
/// "mock reply" text is returned. Every request is recorded for assertion.
pub struct MockProvider {
    completions: Arc<Mutex<VecDeque<Result<String, String>>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl MockProvider {
    /// Create a new mock provider with an empty completion queue.
    pub fn new() -> Self {
        Self {
            completions: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock provider pre-loaded with the given reply texts.
    pub fn with_replies(replies: Vec<String>) -> Self {
        let completions: VecDeque<Result<String, String>> =
            replies.into_iter().map(Ok).collect();
        Self {
            completions: Arc::new(Mutex::new(completions)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a reply text to the end of the queue.
    pub async fn add_reply(&self, text: impl Into<String>) {
        self.completions.lock().await.push_back(Ok(text.into()));
    }

    /// Script a provider failure at the end of the queue.
    pub async fn fail_next(&self, message: impl Into<String>) {
        self.completions.lock().await.push_back(Err(message.into()));
    }

    /// All requests received so far, in call order.
    pub async fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, NagareError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), NagareError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn complete(&self, request: ChatRequest) -> Result<ChatReply, NagareError> {
        self.requests.lock().await.push(request);
        let next = self.completions.lock().await.pop_front();
        match next {
            Some(Ok(text)) => Ok(ChatReply {
                text,
                model: "mock-model".to_string(),
            }),
            Some(Err(message)) => Err(NagareError::Provider {
                message,
                source: None,
            }),
            None => Ok(ChatReply {
                text: "mock reply".to_string(),
                model: "mock-model".to_string(),
            }),
        }
    }
}
