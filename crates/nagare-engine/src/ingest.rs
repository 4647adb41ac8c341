// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook event ingestion.
//!
//! Events arrive in batches and are processed sequentially, each inside its
//! own error boundary: one bad event is logged and skipped, the rest of the
//! batch still runs. The webhook response is decided before any of this
//! happens, so nothing here can fail the HTTP exchange.

use std::sync::Arc;

use nagare_ai::AiReplyPipeline;
use nagare_core::traits::platform::PlatformAdapter;
use nagare_core::types::{Direction, OutgoingMessage, TriggerKind};
use nagare_core::NagareError;
use nagare_line::events::{EventSource, MessagePayload, PostbackPayload, WebhookEvent};
use nagare_line::WebhookEnvelope;
use nagare_storage::queries::{contacts, messages};
use nagare_storage::{Contact, Database, NewMessage};
use tracing::{debug, info, warn};

use crate::scenario::ScenarioEngine;
use crate::triggers;

/// How inbound text messages are answered.
pub enum ReplyStrategy {
    /// Echo the received text back.
    Echo,
    /// Generate a reply through the AI pipeline.
    Ai(Arc<AiReplyPipeline>),
}

/// Processes webhook event batches.
pub struct WebhookIngestor {
    db: Database,
    platform: Arc<dyn PlatformAdapter>,
    engine: ScenarioEngine,
    strategy: ReplyStrategy,
}

impl WebhookIngestor {
    pub fn new(db: Database, platform: Arc<dyn PlatformAdapter>, strategy: ReplyStrategy) -> Self {
        let engine = ScenarioEngine::new(db.clone(), platform.clone());
        Self {
            db,
            platform,
            engine,
            strategy,
        }
    }

    /// Handles every event in the envelope, sequentially.
    pub async fn handle_batch(&self, envelope: WebhookEnvelope) {
        for (index, raw) in envelope.events.into_iter().enumerate() {
            let event = match serde_json::from_value::<WebhookEvent>(raw.clone()) {
                Ok(event) => event,
                Err(e) => {
                    warn!(index, error = %e, "skipping malformed webhook event");
                    continue;
                }
            };
            if let Err(e) = self.handle_event(event, &raw).await {
                warn!(index, error = %e, "webhook event handling failed");
            }
        }
    }

    async fn handle_event(
        &self,
        event: WebhookEvent,
        raw: &serde_json::Value,
    ) -> Result<(), NagareError> {
        match event {
            WebhookEvent::Message {
                reply_token,
                source,
                message,
            } => self.handle_message(reply_token, source, message, raw).await,
            WebhookEvent::Follow { source, .. } => self.handle_follow(source).await,
            WebhookEvent::Unfollow { source } => self.handle_unfollow(source).await,
            WebhookEvent::Postback {
                source, postback, ..
            } => self.handle_postback(source, postback, raw).await,
            WebhookEvent::Other => {
                debug!("unhandled webhook event kind skipped");
                Ok(())
            }
        }
    }

    /// Resolves a contact by external id, creating it on first sight.
    ///
    /// New contacts get one profile fetch for their display name and picture;
    /// a failed fetch stores the contact with null display fields.
    async fn find_or_create_contact(&self, line_user_id: &str) -> Result<Contact, NagareError> {
        if let Some(existing) = contacts::find_by_line_user_id(&self.db, line_user_id).await? {
            return Ok(existing);
        }
        let profile = match self.platform.get_profile(line_user_id).await {
            Ok(mut profile) => {
                profile.status_message = None;
                Some(profile)
            }
            Err(e) => {
                warn!(error = %e, "profile fetch for new contact failed");
                None
            }
        };
        contacts::insert(&self.db, line_user_id, profile.as_ref()).await
    }

    async fn handle_message(
        &self,
        reply_token: Option<String>,
        source: Option<EventSource>,
        message: Option<MessagePayload>,
        raw: &serde_json::Value,
    ) -> Result<(), NagareError> {
        let Some(user_id) = source.and_then(|s| s.user_id) else {
            debug!("message event without user id skipped");
            return Ok(());
        };
        let contact = self.find_or_create_contact(&user_id).await?;

        let kind = message
            .as_ref()
            .and_then(|m| m.kind.clone())
            .unwrap_or_else(|| "unknown".to_string());
        let text = message.and_then(|m| m.text);
        let content = if kind == "text" {
            text.clone()
        } else {
            Some(format!("[{kind}]"))
        };
        messages::append(
            &self.db,
            &NewMessage {
                contact_id: contact.id.clone(),
                direction: Direction::Inbound,
                message_kind: kind.clone(),
                content,
                raw_json: Some(raw.to_string()),
            },
        )
        .await?;

        if kind != "text" {
            return Ok(());
        }
        let Some(text) = text else {
            debug!("text message without body skipped");
            return Ok(());
        };

        let reply_text = match &self.strategy {
            ReplyStrategy::Echo => format!("受信: {text}"),
            ReplyStrategy::Ai(pipeline) => pipeline.reply(&contact.id, &text).await?.text,
        };
        let token = reply_token.ok_or_else(|| NagareError::Platform {
            message: "message event carried no reply token".to_string(),
            source: None,
        })?;
        self.platform
            .send_reply(&token, &[OutgoingMessage::text(reply_text.as_str())])
            .await?;
        messages::append(
            &self.db,
            &NewMessage::outbound_text(contact.id.clone(), reply_text),
        )
        .await?;

        let matched = triggers::evaluate(&self.db, TriggerKind::MessageKeyword, Some(&text)).await?;
        for scenario_id in matched {
            self.engine.execute(&scenario_id, &contact.id).await?;
        }
        Ok(())
    }

    async fn handle_follow(&self, source: Option<EventSource>) -> Result<(), NagareError> {
        let Some(user_id) = source.and_then(|s| s.user_id) else {
            debug!("follow event without user id skipped");
            return Ok(());
        };
        let profile = match self.platform.get_profile(&user_id).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(error = %e, "profile fetch on follow failed");
                None
            }
        };
        let contact = match contacts::reactivate(&self.db, &user_id, profile.as_ref()).await? {
            Some(existing) => existing,
            None => contacts::insert(&self.db, &user_id, profile.as_ref()).await?,
        };
        info!(contact_id = contact.id.as_str(), "contact followed");

        let matched = triggers::evaluate(&self.db, TriggerKind::Follow, None).await?;
        for scenario_id in matched {
            self.engine.execute(&scenario_id, &contact.id).await?;
        }
        Ok(())
    }

    async fn handle_unfollow(&self, source: Option<EventSource>) -> Result<(), NagareError> {
        let Some(user_id) = source.and_then(|s| s.user_id) else {
            debug!("unfollow event without user id skipped");
            return Ok(());
        };
        contacts::mark_unfollowed(&self.db, &user_id).await?;
        info!("contact unfollowed");
        Ok(())
    }

    async fn handle_postback(
        &self,
        source: Option<EventSource>,
        postback: Option<PostbackPayload>,
        raw: &serde_json::Value,
    ) -> Result<(), NagareError> {
        let Some(user_id) = source.and_then(|s| s.user_id) else {
            debug!("postback event without user id skipped");
            return Ok(());
        };
        let contact = self.find_or_create_contact(&user_id).await?;
        let data = postback.map(|p| p.data).unwrap_or_default();
        messages::append(
            &self.db,
            &NewMessage {
                contact_id: contact.id.clone(),
                direction: Direction::Inbound,
                message_kind: "postback".to_string(),
                content: Some(data.clone()),
                raw_json: Some(raw.to_string()),
            },
        )
        .await?;
        debug!(data, "postback received");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nagare_config::NagareConfig;
    use nagare_core::types::{ContactStatus, Profile};
    use nagare_test_utils::{
        open_test_db, seed_contact, seed_keyword_scenario, seed_scenario, MockPlatform,
        MockProvider, TestDb,
    };

    struct Setup {
        test_db: TestDb,
        platform: Arc<MockPlatform>,
        ingestor: WebhookIngestor,
    }

    async fn setup() -> Setup {
        let test_db = open_test_db().await.unwrap();
        let platform = Arc::new(MockPlatform::new());
        let ingestor = WebhookIngestor::new(
            test_db.db.clone(),
            platform.clone(),
            ReplyStrategy::Echo,
        );
        Setup {
            test_db,
            platform,
            ingestor,
        }
    }

    fn envelope(events: Vec<serde_json::Value>) -> WebhookEnvelope {
        WebhookEnvelope { events }
    }

    fn text_message(user_id: &str, reply_token: &str, text: &str) -> serde_json::Value {
        serde_json::json!({
            "type": "message",
            "replyToken": reply_token,
            "source": { "type": "user", "userId": user_id },
            "message": { "id": "m-1", "type": "text", "text": text }
        })
    }

    fn follow(user_id: &str) -> serde_json::Value {
        serde_json::json!({
            "type": "follow",
            "replyToken": "rt-f",
            "source": { "type": "user", "userId": user_id }
        })
    }

    /// (direction, message_kind, content, raw_json) per stored message.
    async fn stored_messages(
        db: &Database,
    ) -> Vec<(String, String, Option<String>, Option<String>)> {
        db.connection()
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT direction, message_kind, content, raw_json
                     FROM messages ORDER BY sent_at, rowid",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok::<_, rusqlite::Error>(rows)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn text_message_creates_contact_stores_and_echoes() {
        let s = setup().await;
        s.platform
            .set_profile(
                "U-new",
                Profile {
                    display_name: Some("田中".to_string()),
                    picture_url: Some("https://example.com/p.jpg".to_string()),
                    status_message: Some("よろしく".to_string()),
                },
            )
            .await;

        s.ingestor
            .handle_batch(envelope(vec![text_message("U-new", "rt-1", "こんにちは")]))
            .await;

        let contact = contacts::find_by_line_user_id(&s.test_db.db, "U-new")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(contact.status, ContactStatus::Active);
        assert_eq!(contact.display_name.as_deref(), Some("田中"));
        // The message path stores display fields only.
        assert!(contact.status_message.is_none());

        let messages = stored_messages(&s.test_db.db).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].0, "inbound");
        assert_eq!(messages[0].1, "text");
        assert_eq!(messages[0].2.as_deref(), Some("こんにちは"));
        assert!(messages[0].3.as_deref().unwrap().contains("replyToken"));
        assert_eq!(messages[1].0, "outbound");
        assert_eq!(messages[1].2.as_deref(), Some("受信: こんにちは"));

        let replies = s.platform.replies().await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, "rt-1");
        let OutgoingMessage::Text { text } = &replies[0].1[0];
        assert_eq!(text, "受信: こんにちは");
    }

    #[tokio::test]
    async fn profile_is_fetched_only_for_first_time_contacts() {
        let s = setup().await;

        s.ingestor
            .handle_batch(envelope(vec![
                text_message("U-repeat", "rt-1", "一通目"),
                text_message("U-repeat", "rt-2", "二通目"),
            ]))
            .await;

        assert_eq!(s.platform.profile_requests().await, vec!["U-repeat"]);
        assert_eq!(s.platform.reply_count().await, 2);
    }

    #[tokio::test]
    async fn profile_fetch_failure_still_creates_contact() {
        let s = setup().await;
        s.platform.fail_profile_for("U-noprofile").await;

        s.ingestor
            .handle_batch(envelope(vec![text_message("U-noprofile", "rt-1", "やあ")]))
            .await;

        let contact = contacts::find_by_line_user_id(&s.test_db.db, "U-noprofile")
            .await
            .unwrap()
            .unwrap();
        assert!(contact.display_name.is_none());
        assert!(contact.picture_url.is_none());
        assert_eq!(contact.status, ContactStatus::Active);
        // The reply still went out.
        assert_eq!(s.platform.reply_count().await, 1);
    }

    #[tokio::test]
    async fn non_text_message_stores_placeholder_without_reply() {
        let s = setup().await;

        s.ingestor
            .handle_batch(envelope(vec![serde_json::json!({
                "type": "message",
                "replyToken": "rt-1",
                "source": { "type": "user", "userId": "U-img" },
                "message": { "id": "m-9", "type": "image" }
            })]))
            .await;

        let messages = stored_messages(&s.test_db.db).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].1, "image");
        assert_eq!(messages[0].2.as_deref(), Some("[image]"));
        assert_eq!(s.platform.reply_count().await, 0);
    }

    #[tokio::test]
    async fn message_without_user_id_is_skipped() {
        let s = setup().await;

        s.ingestor
            .handle_batch(envelope(vec![serde_json::json!({
                "type": "message",
                "replyToken": "rt-1",
                "source": { "type": "group", "groupId": "G-1" },
                "message": { "id": "m-1", "type": "text", "text": "こんにちは" }
            })]))
            .await;

        assert!(stored_messages(&s.test_db.db).await.is_empty());
        assert_eq!(s.platform.reply_count().await, 0);
    }

    #[tokio::test]
    async fn malformed_event_does_not_poison_the_batch() {
        let s = setup().await;

        s.ingestor
            .handle_batch(envelope(vec![
                serde_json::json!("not an object"),
                text_message("U-ok", "rt-2", "次は届く"),
            ]))
            .await;

        assert!(contacts::find_by_line_user_id(&s.test_db.db, "U-ok")
            .await
            .unwrap()
            .is_some());
        assert_eq!(s.platform.reply_count().await, 1);
    }

    #[tokio::test]
    async fn keyword_match_executes_scenario() {
        let s = setup().await;
        seed_keyword_scenario(
            &s.test_db.db,
            "在庫案内",
            &["在庫"],
            &[("在庫を確認します。", 0)],
        )
        .await
        .unwrap();

        s.ingestor
            .handle_batch(envelope(vec![text_message("U-kw", "rt-1", "在庫ありますか")]))
            .await;

        // Echo reply plus the scenario's immediate push.
        assert_eq!(s.platform.reply_count().await, 1);
        let pushes = s.platform.pushes().await;
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].0, "U-kw");
        let OutgoingMessage::Text { text } = &pushes[0].1[0];
        assert_eq!(text, "在庫を確認します。");
    }

    #[tokio::test]
    async fn follow_creates_active_contact_with_full_profile_and_triggers() {
        let s = setup().await;
        s.platform
            .set_profile(
                "U-follow",
                Profile {
                    display_name: Some("佐藤".to_string()),
                    picture_url: None,
                    status_message: Some("はじめまして".to_string()),
                },
            )
            .await;
        seed_scenario(
            &s.test_db.db,
            "歓迎",
            TriggerKind::Follow,
            None,
            &[("フォローありがとうございます！", 0)],
        )
        .await
        .unwrap();

        s.ingestor.handle_batch(envelope(vec![follow("U-follow")])).await;

        let contact = contacts::find_by_line_user_id(&s.test_db.db, "U-follow")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(contact.status, ContactStatus::Active);
        assert_eq!(contact.display_name.as_deref(), Some("佐藤"));
        // The follow path keeps the status message.
        assert_eq!(contact.status_message.as_deref(), Some("はじめまして"));

        let pushes = s.platform.pushes().await;
        assert_eq!(pushes.len(), 1);
        let OutgoingMessage::Text { text } = &pushes[0].1[0];
        assert_eq!(text, "フォローありがとうございます！");
    }

    #[tokio::test]
    async fn refollow_reactivates_and_refreshes_profile() {
        let s = setup().await;
        seed_contact(&s.test_db.db, "U-back", "旧名").await.unwrap();
        contacts::mark_unfollowed(&s.test_db.db, "U-back").await.unwrap();
        s.platform
            .set_profile(
                "U-back",
                Profile {
                    display_name: Some("新名".to_string()),
                    ..Profile::default()
                },
            )
            .await;

        s.ingestor.handle_batch(envelope(vec![follow("U-back")])).await;

        let contact = contacts::find_by_line_user_id(&s.test_db.db, "U-back")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(contact.status, ContactStatus::Active);
        assert_eq!(contact.display_name.as_deref(), Some("新名"));
    }

    #[tokio::test]
    async fn refollow_with_failed_profile_keeps_existing_fields() {
        let s = setup().await;
        seed_contact(&s.test_db.db, "U-keep", "保持名").await.unwrap();
        contacts::mark_unfollowed(&s.test_db.db, "U-keep").await.unwrap();
        s.platform.fail_profile_for("U-keep").await;

        s.ingestor.handle_batch(envelope(vec![follow("U-keep")])).await;

        let contact = contacts::find_by_line_user_id(&s.test_db.db, "U-keep")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(contact.status, ContactStatus::Active);
        assert_eq!(contact.display_name.as_deref(), Some("保持名"));
    }

    #[tokio::test]
    async fn unfollow_marks_contact_and_tolerates_unknown() {
        let s = setup().await;
        seed_contact(&s.test_db.db, "U-bye", "太郎").await.unwrap();

        s.ingestor
            .handle_batch(envelope(vec![
                serde_json::json!({
                    "type": "unfollow",
                    "source": { "type": "user", "userId": "U-bye" }
                }),
                serde_json::json!({
                    "type": "unfollow",
                    "source": { "type": "user", "userId": "U-stranger" }
                }),
            ]))
            .await;

        let contact = contacts::find_by_line_user_id(&s.test_db.db, "U-bye")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(contact.status, ContactStatus::Unfollowed);
        assert!(contacts::find_by_line_user_id(&s.test_db.db, "U-stranger")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn postback_stores_data_without_reply_or_triggers() {
        let s = setup().await;
        seed_keyword_scenario(&s.test_db.db, "購入", &["buy"], &[("購入ですね", 0)])
            .await
            .unwrap();

        s.ingestor
            .handle_batch(envelope(vec![serde_json::json!({
                "type": "postback",
                "replyToken": "rt-p",
                "source": { "type": "user", "userId": "U-pb" },
                "postback": { "data": "action=buy&item=42" }
            })]))
            .await;

        let messages = stored_messages(&s.test_db.db).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].1, "postback");
        assert_eq!(messages[0].2.as_deref(), Some("action=buy&item=42"));
        assert_eq!(s.platform.reply_count().await, 0);
        assert_eq!(s.platform.push_count().await, 0);
    }

    #[tokio::test]
    async fn postback_data_defaults_to_empty() {
        let s = setup().await;

        s.ingestor
            .handle_batch(envelope(vec![serde_json::json!({
                "type": "postback",
                "source": { "type": "user", "userId": "U-pb2" }
            })]))
            .await;

        let messages = stored_messages(&s.test_db.db).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].2.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn unhandled_event_kinds_are_skipped() {
        let s = setup().await;

        s.ingestor
            .handle_batch(envelope(vec![serde_json::json!({
                "type": "join",
                "source": { "type": "group", "groupId": "G-7" }
            })]))
            .await;

        assert!(stored_messages(&s.test_db.db).await.is_empty());
    }

    #[tokio::test]
    async fn reply_failure_skips_outbound_and_triggers_but_not_the_batch() {
        let s = setup().await;
        s.platform.fail_replies();
        seed_keyword_scenario(&s.test_db.db, "在庫案内", &["在庫"], &[("在庫あり", 0)])
            .await
            .unwrap();

        s.ingestor
            .handle_batch(envelope(vec![text_message("U-err", "rt-1", "在庫ありますか")]))
            .await;

        let messages = stored_messages(&s.test_db.db).await;
        // Inbound stored, outbound not; triggers never ran.
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "inbound");
        assert_eq!(s.platform.push_count().await, 0);
    }

    #[tokio::test]
    async fn ai_mode_replies_with_generated_text() {
        let test_db = open_test_db().await.unwrap();
        let platform = Arc::new(MockPlatform::new());
        let provider = Arc::new(MockProvider::with_replies(vec![
            "営業時間は平日10時から18時です。".to_string(),
        ]));
        let pipeline = Arc::new(AiReplyPipeline::new(
            test_db.db.clone(),
            provider,
            &NagareConfig::default(),
        ));
        let ingestor = WebhookIngestor::new(
            test_db.db.clone(),
            platform.clone(),
            ReplyStrategy::Ai(pipeline),
        );

        ingestor
            .handle_batch(envelope(vec![text_message(
                "U-ai",
                "rt-ai",
                "営業時間を教えてください",
            )]))
            .await;

        let replies = platform.replies().await;
        assert_eq!(replies.len(), 1);
        let OutgoingMessage::Text { text } = &replies[0].1[0];
        assert_eq!(text, "営業時間は平日10時から18時です。");

        let messages = stored_messages(&test_db.db).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[1].2.as_deref(),
            Some("営業時間は平日10時から18時です。")
        );
    }
}
