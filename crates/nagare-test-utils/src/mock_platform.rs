// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock messaging platform adapter for deterministic testing.
//!
//! `MockPlatform` implements `PlatformAdapter` with captured outbound sends
//! and scriptable per-recipient failures, enabling fast, CI-runnable tests
//! without the LINE API.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use nagare_core::traits::adapter::PluginAdapter;
use nagare_core::traits::platform::PlatformAdapter;
use nagare_core::types::{AdapterType, HealthStatus, OutgoingMessage, Profile};
use nagare_core::NagareError;

/// A mock messaging platform that records sends instead of making API calls.
///
/// Replies and pushes are captured for assertion. Failures are scripted
/// per recipient (`fail_push_to`) or globally for replies (`fail_replies`),
/// and profile lookups resolve from a configurable map.
pub struct MockPlatform {
    replies: Arc<Mutex<Vec<(String, Vec<OutgoingMessage>)>>>,
    pushes: Arc<Mutex<Vec<(String, Vec<OutgoingMessage>)>>>,
    profiles: Arc<Mutex<HashMap<String, Profile>>>,
    profile_requests: Arc<Mutex<Vec<String>>>,
    failing_profile_users: Arc<Mutex<HashSet<String>>>,
    failing_push_recipients: Arc<Mutex<HashSet<String>>>,
    fail_all_replies: AtomicBool,
}

impl MockPlatform {
    /// Create a new mock platform with no scripted failures.
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(Vec::new())),
            pushes: Arc::new(Mutex::new(Vec::new())),
            profiles: Arc::new(Mutex::new(HashMap::new())),
            profile_requests: Arc::new(Mutex::new(Vec::new())),
            failing_profile_users: Arc::new(Mutex::new(HashSet::new())),
            failing_push_recipients: Arc::new(Mutex::new(HashSet::new())),
            fail_all_replies: AtomicBool::new(false),
        }
    }

    /// Register the profile returned for a user id.
    ///
    /// Users without a registered profile resolve to an empty profile.
    pub async fn set_profile(&self, user_id: &str, profile: Profile) {
        self.profiles.lock().await.insert(user_id.to_string(), profile);
    }

    /// Make profile lookups for this user id fail.
    pub async fn fail_profile_for(&self, user_id: &str) {
        self.failing_profile_users
            .lock()
            .await
            .insert(user_id.to_string());
    }

    /// Make pushes to this recipient fail.
    pub async fn fail_push_to(&self, user_id: &str) {
        self.failing_push_recipients
            .lock()
            .await
            .insert(user_id.to_string());
    }

    /// Make all subsequent replies fail.
    pub fn fail_replies(&self) {
        self.fail_all_replies.store(true, Ordering::SeqCst);
    }

    /// All captured replies, as (reply_token, messages) pairs in send order.
    pub async fn replies(&self) -> Vec<(String, Vec<OutgoingMessage>)> {
        self.replies.lock().await.clone()
    }

    /// All captured pushes, as (recipient, messages) pairs in send order.
    pub async fn pushes(&self) -> Vec<(String, Vec<OutgoingMessage>)> {
        self.pushes.lock().await.clone()
    }

    /// Number of captured replies.
    pub async fn reply_count(&self) -> usize {
        self.replies.lock().await.len()
    }

    /// Number of captured pushes.
    pub async fn push_count(&self) -> usize {
        self.pushes.lock().await.len()
    }

    /// User ids whose profiles were requested, in request order.
    pub async fn profile_requests(&self) -> Vec<String> {
        self.profile_requests.lock().await.clone()
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockPlatform {
    fn name(&self) -> &str {
        "mock-platform"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Platform
    }

    async fn health_check(&self) -> Result<HealthStatus, NagareError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), NagareError> {
        Ok(())
    }
}

#[async_trait]
impl PlatformAdapter for MockPlatform {
    async fn send_reply(
        &self,
        reply_token: &str,
        messages: &[OutgoingMessage],
    ) -> Result<(), NagareError> {
        if self.fail_all_replies.load(Ordering::SeqCst) {
            return Err(NagareError::Platform {
                message: "mock reply failure".to_string(),
                source: None,
            });
        }
        self.replies
            .lock()
            .await
            .push((reply_token.to_string(), messages.to_vec()));
        Ok(())
    }

    async fn send_push(&self, to: &str, messages: &[OutgoingMessage]) -> Result<(), NagareError> {
        if self.failing_push_recipients.lock().await.contains(to) {
            return Err(NagareError::Platform {
                message: format!("mock push rejected for {to}"),
                source: None,
            });
        }
        self.pushes
            .lock()
            .await
            .push((to.to_string(), messages.to_vec()));
        Ok(())
    }

    async fn get_profile(&self, external_id: &str) -> Result<Profile, NagareError> {
        self.profile_requests
            .lock()
            .await
            .push(external_id.to_string());
        if self.failing_profile_users.lock().await.contains(external_id) {
            return Err(NagareError::Platform {
                message: format!("mock profile fetch failed for {external_id}"),
                source: None,
            });
        }
        Ok(self
            .profiles
            .lock()
            .await
            .get(external_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_reply_is_captured() {
        let platform = MockPlatform::new();
        platform
            .send_reply("rt-1", &[OutgoingMessage::text("hello")])
            .await
            .unwrap();

        let replies = platform.replies().await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, "rt-1");
        let OutgoingMessage::Text { text } = &replies[0].1[0];
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn push_failure_is_scoped_to_recipient() {
        let platform = MockPlatform::new();
        platform.fail_push_to("U-bad").await;

        let err = platform
            .send_push("U-bad", &[OutgoingMessage::text("x")])
            .await
            .unwrap_err();
        assert!(matches!(err, NagareError::Platform { .. }));

        platform
            .send_push("U-good", &[OutgoingMessage::text("x")])
            .await
            .unwrap();
        assert_eq!(platform.push_count().await, 1);
    }

    #[tokio::test]
    async fn fail_replies_affects_all_replies() {
        let platform = MockPlatform::new();
        platform.fail_replies();
        let err = platform
            .send_reply("rt-1", &[OutgoingMessage::text("x")])
            .await
            .unwrap_err();
        assert!(matches!(err, NagareError::Platform { .. }));
        assert_eq!(platform.reply_count().await, 0);
    }

    #[tokio::test]
    async fn profile_resolves_from_map_and_records_requests() {
        let platform = MockPlatform::new();
        platform
            .set_profile(
                "U-1",
                Profile {
                    display_name: Some("太郎".to_string()),
                    ..Profile::default()
                },
            )
            .await;

        let known = platform.get_profile("U-1").await.unwrap();
        assert_eq!(known.display_name.as_deref(), Some("太郎"));

        let unknown = platform.get_profile("U-2").await.unwrap();
        assert!(unknown.display_name.is_none());

        assert_eq!(platform.profile_requests().await, vec!["U-1", "U-2"]);
    }

    #[tokio::test]
    async fn profile_failure_is_scoped_to_user() {
        let platform = MockPlatform::new();
        platform.fail_profile_for("U-broken").await;

        assert!(platform.get_profile("U-broken").await.is_err());
        assert!(platform.get_profile("U-fine").await.is_ok());
    }
}
