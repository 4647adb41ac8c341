// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Knowledge-grounded reply generation with escalation handoff.
//!
//! The pipeline retrieves matching knowledge articles, replays recent
//! conversation history, and asks the LLM provider for a reply. Every call
//! leaves one `ai_chat_logs` row behind; replies that contain an
//! operator-handoff phrase additionally open an escalation.

use std::sync::Arc;
use std::time::Instant;

use nagare_config::model::AiConfig;
use nagare_config::NagareConfig;
use nagare_core::traits::provider::ProviderAdapter;
use nagare_core::types::{
    ChatRequest, ChatTurn, ContactId, Direction, EscalationPriority, KnowledgeId,
};
use nagare_core::NagareError;
use nagare_storage::queries::{ai_logs, messages};
use nagare_storage::{Database, KnowledgeArticle, NewAiChatLog};
use tracing::{debug, warn};

use crate::retrieval;

/// How many knowledge articles ground a reply.
const KNOWLEDGE_LIMIT: u32 = 5;
/// How many stored messages are loaded as conversation history.
const HISTORY_LIMIT: u32 = 10;
/// How many history turns are sent to the provider.
const HISTORY_TURNS_SENT: usize = 8;
/// Below this confidence an escalation is opened with high priority.
const HIGH_PRIORITY_CONFIDENCE: f64 = 0.2;

/// Substituted when the provider returns a reply with no text content.
const EMPTY_REPLY_TEXT: &str = "申し訳ございません。応答を生成できませんでした。";

const SYSTEM_RULES: &str = "あなたはLINE公式アカウントのAIアシスタントです。
以下のルールに従って応答してください:
- 丁寧で親しみやすい日本語で応答する
- 簡潔に回答する（LINE メッセージなので200文字以内が理想）
- ナレッジベースの情報を優先して回答する
- ナレッジベースに該当する情報がない場合は正直に「担当者に確認いたします」と回答する
- 絵文字は控えめに使う
- 個人情報や機密情報を聞き出そうとしない

";

/// Outcome of one reply generation.
#[derive(Debug, Clone, PartialEq)]
pub struct AiReply {
    pub text: String,
    pub should_escalate: bool,
    pub confidence: f64,
    pub knowledge_ids: Vec<KnowledgeId>,
    pub latency_ms: i64,
}

/// Generates replies to inbound messages via the LLM provider.
pub struct AiReplyPipeline {
    db: Database,
    provider: Arc<dyn ProviderAdapter>,
    ai: AiConfig,
    max_tokens: u32,
}

impl AiReplyPipeline {
    pub fn new(db: Database, provider: Arc<dyn ProviderAdapter>, config: &NagareConfig) -> Self {
        Self {
            db,
            provider,
            ai: config.ai.clone(),
            max_tokens: config.anthropic.max_tokens,
        }
    }

    /// Generates one reply for an inbound text message.
    ///
    /// Provider failures never surface: the configured fallback reply is
    /// substituted and the conversation escalates. Storage failures while
    /// loading knowledge or history do propagate; logging failures are
    /// swallowed with a warning.
    pub async fn reply(
        &self,
        contact_id: &ContactId,
        user_message: &str,
    ) -> Result<AiReply, NagareError> {
        let started = Instant::now();

        let articles = retrieval::retrieve(&self.db, user_message, KNOWLEDGE_LIMIT).await?;
        let knowledge_ids: Vec<KnowledgeId> = articles.iter().map(|a| a.id.clone()).collect();

        let history = messages::recent_text_turns(&self.db, contact_id, HISTORY_LIMIT).await?;
        let mut turns: Vec<ChatTurn> = history
            .into_iter()
            .map(|(direction, content)| match direction {
                Direction::Inbound => ChatTurn::user(content),
                Direction::Outbound => ChatTurn::assistant(content),
            })
            .collect();
        let skip = turns.len().saturating_sub(HISTORY_TURNS_SENT);
        turns.drain(..skip);
        turns.push(ChatTurn::user(user_message));

        let request = ChatRequest {
            system: build_system_prompt(&articles),
            turns,
            max_tokens: self.max_tokens,
        };

        let (text, should_escalate, confidence) = match self.provider.complete(request).await {
            Ok(reply) => {
                let text = if reply.text.is_empty() {
                    EMPTY_REPLY_TEXT.to_string()
                } else {
                    reply.text
                };
                let escalate = self
                    .ai
                    .escalation_phrases
                    .iter()
                    .any(|phrase| text.contains(phrase.as_str()));
                let confidence = if articles.is_empty() {
                    self.ai.confidence.ungrounded
                } else if escalate {
                    self.ai.confidence.grounded_escalated
                } else {
                    self.ai.confidence.grounded
                };
                (text, escalate, confidence)
            }
            Err(e) => {
                warn!(error = %e, "AI provider call failed, using fallback reply");
                (self.ai.fallback_reply.clone(), true, 0.0)
            }
        };

        let latency_ms = started.elapsed().as_millis() as i64;
        debug!(
            contact_id = contact_id.as_str(),
            articles = knowledge_ids.len(),
            should_escalate,
            confidence,
            latency_ms,
            "AI reply generated"
        );

        self.record(
            contact_id,
            user_message,
            &text,
            confidence,
            should_escalate,
            &knowledge_ids,
            latency_ms,
        )
        .await;

        Ok(AiReply {
            text,
            should_escalate,
            confidence,
            knowledge_ids,
            latency_ms,
        })
    }

    /// Persists the chat log and, when escalating, the escalation row.
    ///
    /// An escalation always references its chat log, so a failed log insert
    /// also skips the escalation.
    #[allow(clippy::too_many_arguments)]
    async fn record(
        &self,
        contact_id: &ContactId,
        user_message: &str,
        reply_text: &str,
        confidence: f64,
        should_escalate: bool,
        knowledge_ids: &[KnowledgeId],
        latency_ms: i64,
    ) {
        let log = NewAiChatLog {
            contact_id: contact_id.clone(),
            user_message: user_message.to_string(),
            ai_reply: reply_text.to_string(),
            confidence,
            should_escalate,
            knowledge_ids: knowledge_ids.to_vec(),
            response_time_ms: latency_ms,
        };
        match ai_logs::insert_chat_log(&self.db, &log).await {
            Ok(log_id) => {
                if should_escalate {
                    let priority = if confidence < HIGH_PRIORITY_CONFIDENCE {
                        EscalationPriority::High
                    } else {
                        EscalationPriority::Normal
                    };
                    if let Err(e) =
                        ai_logs::insert_escalation(&self.db, contact_id, Some(&log_id), priority)
                            .await
                    {
                        warn!(error = %e, "failed to record escalation");
                    }
                }
            }
            Err(e) => warn!(error = %e, "failed to record AI chat log"),
        }
    }
}

fn build_system_prompt(articles: &[KnowledgeArticle]) -> String {
    let mut prompt = String::from(SYSTEM_RULES);
    if articles.is_empty() {
        prompt.push_str(
            "## ナレッジベース\n登録された情報がありません。担当者への確認を案内してください。",
        );
    } else {
        prompt.push_str("## ナレッジベース（参考情報）\n");
        let joined = articles
            .iter()
            .map(|a| format!("【{}】\n{}", a.title, a.content))
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");
        prompt.push_str(&joined);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use nagare_core::types::{EscalationStatus, TurnRole};
    use nagare_storage::queries::knowledge;
    use nagare_storage::NewMessage;
    use nagare_test_utils::{open_test_db, seed_contact, MockProvider, TestDb};

    struct Setup {
        test_db: TestDb,
        provider: Arc<MockProvider>,
        pipeline: AiReplyPipeline,
        contact_id: ContactId,
    }

    async fn setup() -> Setup {
        let test_db = open_test_db().await.unwrap();
        let contact = seed_contact(&test_db.db, "U-ai", "太郎").await.unwrap();
        let provider = Arc::new(MockProvider::new());
        let pipeline = AiReplyPipeline::new(
            test_db.db.clone(),
            provider.clone(),
            &NagareConfig::default(),
        );
        Setup {
            test_db,
            provider,
            pipeline,
            contact_id: contact.id,
        }
    }

    async fn seed_article(db: &Database, title: &str, content: &str) {
        knowledge::insert(db, title, content, None, true).await.unwrap();
    }

    #[tokio::test]
    async fn grounded_reply_without_handoff_phrase_scores_high() {
        let s = setup().await;
        seed_article(&s.test_db.db, "営業時間", "営業時間は平日10時から18時です。").await;
        s.provider.add_reply("平日10時から18時です。").await;

        let reply = s.pipeline.reply(&s.contact_id, "営業時間は？").await.unwrap();

        assert_eq!(reply.text, "平日10時から18時です。");
        assert!(!reply.should_escalate);
        assert_eq!(reply.confidence, 0.8);
        assert_eq!(reply.knowledge_ids.len(), 1);

        let escalations = ai_logs::list_escalations(&s.test_db.db, None).await.unwrap();
        assert!(escalations.is_empty());
    }

    #[tokio::test]
    async fn handoff_phrase_escalates_with_normal_priority() {
        let s = setup().await;
        seed_article(&s.test_db.db, "営業時間", "営業時間は平日10時から18時です。").await;
        s.provider.add_reply("そちらは担当者に確認いたしますね。").await;

        let reply = s.pipeline.reply(&s.contact_id, "営業時間 祝日はどうですか？").await.unwrap();

        assert!(reply.should_escalate);
        assert_eq!(reply.confidence, 0.3);

        let escalations = ai_logs::list_escalations(&s.test_db.db, None).await.unwrap();
        assert_eq!(escalations.len(), 1);
        assert_eq!(escalations[0].priority, EscalationPriority::Normal);
        assert_eq!(escalations[0].status, EscalationStatus::Open);
        assert!(escalations[0].ai_chat_log_id.is_some());
    }

    #[tokio::test]
    async fn ungrounded_reply_scores_low_without_escalating() {
        let s = setup().await;
        s.provider.add_reply("はい、おそらく大丈夫だと思います。").await;

        let reply = s.pipeline.reply(&s.contact_id, "予約できますか").await.unwrap();

        assert!(!reply.should_escalate);
        assert_eq!(reply.confidence, 0.2);
        assert!(reply.knowledge_ids.is_empty());

        let escalations = ai_logs::list_escalations(&s.test_db.db, None).await.unwrap();
        assert!(escalations.is_empty());
    }

    #[tokio::test]
    async fn provider_failure_uses_fallback_and_escalates_high() {
        let s = setup().await;
        s.provider.fail_next("upstream down").await;

        let reply = s.pipeline.reply(&s.contact_id, "こんにちは").await.unwrap();

        assert_eq!(reply.text, NagareConfig::default().ai.fallback_reply);
        assert!(reply.should_escalate);
        assert_eq!(reply.confidence, 0.0);

        // The log row is written even though the provider call failed.
        let escalations = ai_logs::list_escalations(&s.test_db.db, None).await.unwrap();
        assert_eq!(escalations.len(), 1);
        assert_eq!(escalations[0].priority, EscalationPriority::High);
        let log_id = escalations[0].ai_chat_log_id.clone().unwrap();
        let log = ai_logs::get_chat_log(&s.test_db.db, &log_id).await.unwrap().unwrap();
        assert_eq!(log.ai_reply, reply.text);
        assert_eq!(log.confidence, 0.0);
        assert!(log.should_escalate);
    }

    #[tokio::test]
    async fn empty_provider_text_is_substituted_then_scored_normally() {
        let s = setup().await;
        seed_article(&s.test_db.db, "配送", "配送は3営業日です。").await;
        s.provider.add_reply("").await;

        let reply = s.pipeline.reply(&s.contact_id, "配送は？").await.unwrap();

        assert_eq!(reply.text, EMPTY_REPLY_TEXT);
        assert!(!reply.should_escalate);
        assert_eq!(reply.confidence, 0.8);
    }

    #[tokio::test]
    async fn system_prompt_embeds_matched_articles() {
        let s = setup().await;
        seed_article(&s.test_db.db, "返品規定", "返品は14日以内にご連絡ください。").await;
        s.provider.add_reply("14日以内であれば可能です。").await;

        s.pipeline.reply(&s.contact_id, "返品、お願いできますか？").await.unwrap();

        let requests = s.provider.requests().await;
        assert_eq!(requests.len(), 1);
        let system = &requests[0].system;
        assert!(system.contains("【返品規定】\n返品は14日以内にご連絡ください。"));
        assert!(system.contains("## ナレッジベース（参考情報）"));
    }

    #[tokio::test]
    async fn system_prompt_notes_missing_knowledge() {
        let s = setup().await;
        s.provider.add_reply("申し訳ございません、わかりかねます。").await;

        s.pipeline.reply(&s.contact_id, "株価を教えて").await.unwrap();

        let requests = s.provider.requests().await;
        assert!(requests[0].system.contains("登録された情報がありません"));
    }

    #[tokio::test]
    async fn history_is_capped_to_eight_turns_oldest_dropped() {
        let s = setup().await;
        for i in 0..12 {
            let new = NewMessage {
                contact_id: s.contact_id.clone(),
                direction: if i % 2 == 0 { Direction::Inbound } else { Direction::Outbound },
                message_kind: "text".to_string(),
                content: Some(format!("メッセージ{i}")),
                raw_json: None,
            };
            messages::append(&s.test_db.db, &new).await.unwrap();
        }
        s.provider.add_reply("承知しました。").await;

        s.pipeline.reply(&s.contact_id, "最新の質問").await.unwrap();

        let requests = s.provider.requests().await;
        let turns = &requests[0].turns;
        // 8 history turns plus the new user message.
        assert_eq!(turns.len(), 9);
        assert_eq!(turns[0].content, "メッセージ4");
        assert_eq!(turns[0].role, TurnRole::User);
        assert_eq!(turns[8].content, "最新の質問");
        assert_eq!(turns[8].role, TurnRole::User);
    }

    #[tokio::test]
    async fn history_roles_follow_message_direction() {
        let s = setup().await;
        for (direction, content) in [
            (Direction::Inbound, "こんにちは"),
            (Direction::Outbound, "こんにちは！ご用件をどうぞ。"),
        ] {
            let new = NewMessage {
                contact_id: s.contact_id.clone(),
                direction,
                message_kind: "text".to_string(),
                content: Some(content.to_string()),
                raw_json: None,
            };
            messages::append(&s.test_db.db, &new).await.unwrap();
        }
        s.provider.add_reply("かしこまりました。").await;

        s.pipeline.reply(&s.contact_id, "予約をお願いします").await.unwrap();

        let requests = s.provider.requests().await;
        let turns = &requests[0].turns;
        assert_eq!(turns[0].role, TurnRole::User);
        assert_eq!(turns[1].role, TurnRole::Assistant);
        assert_eq!(turns[2].role, TurnRole::User);
    }

    #[tokio::test]
    async fn chat_log_records_knowledge_ids_as_json() {
        let s = setup().await;
        let article = knowledge::insert(
            &s.test_db.db,
            "料金",
            "基本料金は月額980円です。",
            None,
            true,
        )
        .await
        .unwrap();
        s.provider.add_reply("料金は担当者に確認いたします。").await;

        s.pipeline.reply(&s.contact_id, "料金は？").await.unwrap();

        // The escalation row leads back to the chat log.
        let escalations = ai_logs::list_escalations(&s.test_db.db, None).await.unwrap();
        let log_id = escalations[0].ai_chat_log_id.clone().unwrap();
        let log = ai_logs::get_chat_log(&s.test_db.db, &log_id).await.unwrap().unwrap();
        let ids: Vec<String> =
            serde_json::from_str(log.knowledge_ids.as_deref().unwrap()).unwrap();
        assert_eq!(ids, vec![article.id.as_str().to_string()]);
        assert_eq!(log.user_message, "料金は？");
        assert!(log.response_time_ms.unwrap() >= 0);
    }
}
