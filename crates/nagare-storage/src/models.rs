// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for storage entities.
//!
//! Ids and status enums are the typed versions from `nagare-core`; timestamps
//! stay ISO-8601 strings end to end, matching the TEXT columns.

use nagare_core::types::{
    ChatLogId, ContactId, ContactStatus, DeliveryLogId, DeliveryStatus, Direction, EscalationId,
    EscalationPriority, EscalationStatus, KnowledgeId, MessageId, ScenarioId, ScenarioStepId,
    TagId, TriggerKind,
};
use serde::{Deserialize, Serialize};

/// A contact in the directory, keyed by the platform's stable user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub line_user_id: String,
    pub display_name: Option<String>,
    pub picture_url: Option<String>,
    pub status_message: Option<String>,
    pub status: ContactStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// A stored message, inbound or outbound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: MessageId,
    pub contact_id: ContactId,
    pub direction: Direction,
    pub message_kind: String,
    pub content: Option<String>,
    pub raw_json: Option<String>,
    pub sent_at: String,
}

/// Insert form for a message; id and sent_at are generated on insert.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub contact_id: ContactId,
    pub direction: Direction,
    pub message_kind: String,
    pub content: Option<String>,
    pub raw_json: Option<String>,
}

impl NewMessage {
    /// Convenience for the common outbound-text case.
    pub fn outbound_text(contact_id: ContactId, text: impl Into<String>) -> Self {
        Self {
            contact_id,
            direction: Direction::Outbound,
            message_kind: "text".to_string(),
            content: Some(text.into()),
            raw_json: None,
        }
    }
}

/// A drip scenario definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: ScenarioId,
    pub name: String,
    pub description: Option<String>,
    pub trigger_kind: TriggerKind,
    pub trigger_config: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// One ordered step of a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioStep {
    pub id: ScenarioStepId,
    pub scenario_id: ScenarioId,
    pub step_order: i64,
    pub message_kind: String,
    pub message_content: String,
    pub delay_minutes: i64,
    pub condition_json: Option<String>,
    pub created_at: String,
}

/// Insert form for a scenario with its inline steps.
#[derive(Debug, Clone)]
pub struct NewScenario {
    pub name: String,
    pub description: Option<String>,
    pub trigger_kind: TriggerKind,
    pub trigger_config: Option<String>,
    pub is_active: bool,
    pub steps: Vec<NewScenarioStep>,
}

/// Insert form for one step; step_order is assigned from list position.
#[derive(Debug, Clone)]
pub struct NewScenarioStep {
    pub message_kind: String,
    pub message_content: String,
    pub delay_minutes: i64,
    pub condition_json: Option<String>,
}

/// List-view row for scenarios: definition plus its step count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSummary {
    #[serde(flatten)]
    pub scenario: Scenario,
    pub step_count: i64,
}

/// A delivery-log row; the unit of send idempotence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryLog {
    pub id: DeliveryLogId,
    pub scenario_id: Option<ScenarioId>,
    pub scenario_step_id: Option<ScenarioStepId>,
    pub contact_id: ContactId,
    pub status: DeliveryStatus,
    pub scheduled_at: Option<String>,
    pub sent_at: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
}

/// A row claimed by the poller, joined with its step content.
///
/// `message_content` is None when the step row has been deleted since the
/// delivery was scheduled; the poller fails such rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedDelivery {
    pub id: DeliveryLogId,
    pub contact_id: ContactId,
    pub message_content: Option<String>,
}

/// A knowledge-base article, input to lexical retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeArticle {
    pub id: KnowledgeId,
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Insert form for an AI conversation log row.
#[derive(Debug, Clone)]
pub struct NewAiChatLog {
    pub contact_id: ContactId,
    pub user_message: String,
    pub ai_reply: String,
    pub confidence: f64,
    pub should_escalate: bool,
    pub knowledge_ids: Vec<KnowledgeId>,
    pub response_time_ms: i64,
}

/// A persisted AI conversation log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiChatLog {
    pub id: ChatLogId,
    pub contact_id: ContactId,
    pub user_message: String,
    pub ai_reply: String,
    pub confidence: f64,
    pub should_escalate: bool,
    pub knowledge_ids: Option<String>,
    pub response_time_ms: Option<i64>,
    pub created_at: String,
}

/// An operator-escalation workflow row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Escalation {
    pub id: EscalationId,
    pub contact_id: ContactId,
    pub ai_chat_log_id: Option<ChatLogId>,
    pub status: EscalationStatus,
    pub priority: EscalationPriority,
    pub assigned_to: Option<String>,
    pub note: Option<String>,
    pub resolved_at: Option<String>,
    pub created_at: String,
}

/// Partial update for an escalation; None fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EscalationUpdate {
    pub status: Option<EscalationStatus>,
    pub priority: Option<EscalationPriority>,
    pub assigned_to: Option<String>,
    pub note: Option<String>,
}

/// History-view row for segment broadcasts, joined with contact display fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastHistoryEntry {
    pub id: DeliveryLogId,
    pub contact_id: ContactId,
    pub status: DeliveryStatus,
    pub sent_at: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub display_name: Option<String>,
    pub picture_url: Option<String>,
}

/// LINE brand green, applied when a tag is created without a color.
pub const DEFAULT_TAG_COLOR: &str = "#06C755";

/// A tag definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub color: String,
    pub description: Option<String>,
    pub created_at: String,
}

/// Parse a TEXT column into a strum-backed enum, surfacing failures as a
/// rusqlite conversion error so they propagate through `call` closures.
pub(crate) fn parse_enum<T>(idx: usize, raw: String) -> Result<T, rusqlite::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_enum_accepts_known_status() {
        let status: DeliveryStatus = parse_enum(0, "pending".to_string()).unwrap();
        assert_eq!(status, DeliveryStatus::Pending);
    }

    #[test]
    fn parse_enum_rejects_unknown_status() {
        let result: Result<DeliveryStatus, _> = parse_enum(0, "exploded".to_string());
        assert!(result.is_err());
    }

    #[test]
    fn outbound_text_fills_kind_and_direction() {
        let msg = NewMessage::outbound_text(ContactId::from("c-1".to_string()), "hello");
        assert_eq!(msg.direction, Direction::Outbound);
        assert_eq!(msg.message_kind, "text");
        assert_eq!(msg.content.as_deref(), Some("hello"));
        assert!(msg.raw_json.is_none());
    }
}
