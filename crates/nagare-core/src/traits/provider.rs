// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for the LLM collaborator.

use async_trait::async_trait;

use crate::error::NagareError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChatReply, ChatRequest};

/// Adapter for LLM provider integrations.
///
/// A provider turns a system prompt plus conversation turns into one reply.
/// Model and endpoint selection are configuration owned by the adapter.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Sends a completion request and returns the full response.
    async fn complete(&self, request: ChatRequest) -> Result<ChatReply, NagareError>;
}
