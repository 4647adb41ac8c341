// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook event payload types.
//!
//! The envelope keeps each event as raw JSON so one undeserializable event
//! never poisons the batch; events are parsed individually at handling time.

use serde::Deserialize;

/// The webhook request body: `{"destination": ..., "events": [...]}`.
///
/// A missing `events` array is treated as an empty batch.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub events: Vec<serde_json::Value>,
}

/// One webhook event, keyed by its `type` field.
///
/// Kinds this integration does not handle (join, beacon, ...) deserialize to
/// [`WebhookEvent::Other`] rather than failing.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WebhookEvent {
    #[serde(rename_all = "camelCase")]
    Message {
        #[serde(default)]
        reply_token: Option<String>,
        #[serde(default)]
        source: Option<EventSource>,
        #[serde(default)]
        message: Option<MessagePayload>,
    },
    #[serde(rename_all = "camelCase")]
    Follow {
        #[serde(default)]
        reply_token: Option<String>,
        #[serde(default)]
        source: Option<EventSource>,
    },
    #[serde(rename_all = "camelCase")]
    Unfollow {
        #[serde(default)]
        source: Option<EventSource>,
    },
    #[serde(rename_all = "camelCase")]
    Postback {
        #[serde(default)]
        reply_token: Option<String>,
        #[serde(default)]
        source: Option<EventSource>,
        #[serde(default)]
        postback: Option<PostbackPayload>,
    },
    #[serde(other)]
    Other,
}

/// Who the event came from. `user_id` is absent for group/room sources
/// without user context.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// The message object inside a message event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    /// Message kind ("text", "image", "sticker", ...).
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Text body, present only for text messages.
    #[serde(default)]
    pub text: Option<String>,
}

/// The postback object inside a postback event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostbackPayload {
    #[serde(default)]
    pub data: String,
}
