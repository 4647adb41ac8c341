// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform adapter trait for the messaging platform collaborator.

use async_trait::async_trait;

use crate::error::NagareError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{OutgoingMessage, Profile};

/// Adapter for the messaging platform (reply, push, profile lookup).
///
/// Reply tokens are single-use and short-lived; their expiry is owned by the
/// external platform. Push sends have no such constraint.
#[async_trait]
pub trait PlatformAdapter: PluginAdapter {
    /// Sends messages in response to a received event, consuming its reply token.
    async fn send_reply(
        &self,
        reply_token: &str,
        messages: &[OutgoingMessage],
    ) -> Result<(), NagareError>;

    /// Sends messages to a contact by its external platform id.
    async fn send_push(
        &self,
        to: &str,
        messages: &[OutgoingMessage],
    ) -> Result<(), NagareError>;

    /// Fetches the display profile of a contact by its external platform id.
    async fn get_profile(&self, external_id: &str) -> Result<Profile, NagareError>;
}
