// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the LINE Messaging API.

use std::time::Duration;

use nagare_core::types::{OutgoingMessage, Profile};
use nagare_core::NagareError;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::debug;

/// Client for the LINE Messaging API (reply, push, profile, bot info).
#[derive(Debug, Clone)]
pub struct LineClient {
    client: reqwest::Client,
    api_base: String,
}

/// Profile response wire shape.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    display_name: Option<String>,
    picture_url: Option<String>,
    status_message: Option<String>,
}

impl LineClient {
    /// Creates a new client authenticated with the channel access token.
    pub fn new(channel_access_token: &str, api_base: &str) -> Result<Self, NagareError> {
        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {channel_access_token}");
        let mut auth = HeaderValue::from_str(&bearer).map_err(|e| {
            NagareError::Config(format!("invalid channel access token header value: {e}"))
        })?;
        auth.set_sensitive(true);
        headers.insert("authorization", auth);
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NagareError::Platform {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Sends messages consuming a reply token.
    pub async fn reply(
        &self,
        reply_token: &str,
        messages: &[OutgoingMessage],
    ) -> Result<(), NagareError> {
        let body = serde_json::json!({
            "replyToken": reply_token,
            "messages": messages,
        });
        self.post("/v2/bot/message/reply", &body).await
    }

    /// Sends messages to a user by id, without a reply token.
    pub async fn push(&self, to: &str, messages: &[OutgoingMessage]) -> Result<(), NagareError> {
        let body = serde_json::json!({
            "to": to,
            "messages": messages,
        });
        self.post("/v2/bot/message/push", &body).await
    }

    /// Fetches a user's display profile.
    pub async fn profile(&self, user_id: &str) -> Result<Profile, NagareError> {
        let url = format!("{}/v2/bot/profile/{user_id}", self.api_base);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| NagareError::Platform {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NagareError::Platform {
                message: format!("LINE API returned {status}: {body}"),
                source: None,
            });
        }

        let profile: ProfileResponse =
            response.json().await.map_err(|e| NagareError::Platform {
                message: format!("failed to parse profile response: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Profile {
            display_name: profile.display_name,
            picture_url: profile.picture_url,
            status_message: profile.status_message,
        })
    }

    /// Calls the bot info endpoint; used as a liveness probe.
    pub async fn bot_info(&self) -> Result<(), NagareError> {
        let url = format!("{}/v2/bot/info", self.api_base);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| NagareError::Platform {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NagareError::Platform {
                message: format!("LINE API returned {status}: {body}"),
                source: None,
            });
        }
        Ok(())
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<(), NagareError> {
        let url = format!("{}{path}", self.api_base);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| NagareError::Platform {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, path, "LINE API response");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NagareError::Platform {
                message: format!("LINE API returned {status}: {body}"),
                source: None,
            });
        }
        Ok(())
    }
}
