// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI conversation logs and operator escalations.

use nagare_core::types::{ChatLogId, ContactId, EscalationId, EscalationPriority, EscalationStatus};
use nagare_core::NagareError;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};

use crate::database::Database;
use crate::models::{parse_enum, AiChatLog, Escalation, EscalationUpdate, NewAiChatLog};

const CHAT_LOG_COLUMNS: &str = "id, contact_id, user_message, ai_reply, confidence, \
                                should_escalate, knowledge_ids, response_time_ms, created_at";
const ESCALATION_COLUMNS: &str = "id, contact_id, ai_chat_log_id, status, priority, \
                                  assigned_to, note, resolved_at, created_at";

fn row_to_chat_log(row: &rusqlite::Row<'_>) -> Result<AiChatLog, rusqlite::Error> {
    Ok(AiChatLog {
        id: ChatLogId::from(row.get::<_, String>(0)?),
        contact_id: ContactId::from(row.get::<_, String>(1)?),
        user_message: row.get(2)?,
        ai_reply: row.get(3)?,
        confidence: row.get(4)?,
        should_escalate: row.get(5)?,
        knowledge_ids: row.get(6)?,
        response_time_ms: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn row_to_escalation(row: &rusqlite::Row<'_>) -> Result<Escalation, rusqlite::Error> {
    Ok(Escalation {
        id: EscalationId::from(row.get::<_, String>(0)?),
        contact_id: ContactId::from(row.get::<_, String>(1)?),
        ai_chat_log_id: row.get::<_, Option<String>>(2)?.map(ChatLogId::from),
        status: parse_enum(3, row.get::<_, String>(3)?)?,
        priority: parse_enum(4, row.get::<_, String>(4)?)?,
        assigned_to: row.get(5)?,
        note: row.get(6)?,
        resolved_at: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Persist one conversation log row. Knowledge ids are stored as JSON.
pub async fn insert_chat_log(db: &Database, log: &NewAiChatLog) -> Result<ChatLogId, NagareError> {
    let id = ChatLogId::new();
    let result_id = id.clone();
    let log = log.clone();
    let knowledge_ids = serde_json::to_string(&log.knowledge_ids)
        .map_err(|e| NagareError::Internal(format!("serialize knowledge ids: {e}")))?;
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO ai_chat_logs
                 (id, contact_id, user_message, ai_reply, confidence, should_escalate, knowledge_ids, response_time_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id.as_str(),
                    log.contact_id.as_str(),
                    log.user_message,
                    log.ai_reply,
                    log.confidence,
                    log.should_escalate,
                    knowledge_ids,
                    log.response_time_ms,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(result_id)
}

/// Fetch one conversation log row.
pub async fn get_chat_log(db: &Database, id: &ChatLogId) -> Result<Option<AiChatLog>, NagareError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| {
            let log = conn
                .query_row(
                    &format!("SELECT {CHAT_LOG_COLUMNS} FROM ai_chat_logs WHERE id = ?1"),
                    params![id.as_str()],
                    row_to_chat_log,
                )
                .optional()?;
            Ok(log)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Open a new escalation for a contact, optionally tied to a chat log.
pub async fn insert_escalation(
    db: &Database,
    contact_id: &ContactId,
    chat_log_id: Option<&ChatLogId>,
    priority: EscalationPriority,
) -> Result<EscalationId, NagareError> {
    let id = EscalationId::new();
    let result_id = id.clone();
    let contact_id = contact_id.clone();
    let chat_log_id = chat_log_id.cloned();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO escalations (id, contact_id, ai_chat_log_id, status, priority)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.as_str(),
                    contact_id.as_str(),
                    chat_log_id.as_ref().map(|c| c.as_str().to_string()),
                    EscalationStatus::Open.to_string(),
                    priority.to_string(),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(result_id)
}

/// Escalations newest first, optionally filtered by status.
pub async fn list_escalations(
    db: &Database,
    status: Option<EscalationStatus>,
) -> Result<Vec<Escalation>, NagareError> {
    db.connection()
        .call(move |conn| {
            let escalations = match status {
                Some(status) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {ESCALATION_COLUMNS} FROM escalations WHERE status = ?1
                         ORDER BY created_at DESC, rowid DESC"
                    ))?;
                    stmt.query_map(params![status.to_string()], row_to_escalation)?
                        .collect::<Result<Vec<_>, _>>()?
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {ESCALATION_COLUMNS} FROM escalations
                         ORDER BY created_at DESC, rowid DESC"
                    ))?;
                    stmt.query_map([], row_to_escalation)?
                        .collect::<Result<Vec<_>, _>>()?
                }
            };
            Ok(escalations)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch one escalation.
pub async fn get_escalation(
    db: &Database,
    id: &EscalationId,
) -> Result<Option<Escalation>, NagareError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| {
            let escalation = conn
                .query_row(
                    &format!("SELECT {ESCALATION_COLUMNS} FROM escalations WHERE id = ?1"),
                    params![id.as_str()],
                    row_to_escalation,
                )
                .optional()?;
            Ok(escalation)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Apply a partial update. Setting status to `resolved` stamps `resolved_at`.
/// Returns the updated row, or `None` when the escalation does not exist.
pub async fn update_escalation(
    db: &Database,
    id: &EscalationId,
    update: &EscalationUpdate,
) -> Result<Option<Escalation>, NagareError> {
    let mut sets: Vec<&str> = Vec::new();
    let mut binds: Vec<Value> = Vec::new();
    if let Some(status) = update.status {
        sets.push("status = ?");
        binds.push(Value::from(status.to_string()));
        if status == EscalationStatus::Resolved {
            sets.push("resolved_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')");
        }
    }
    if let Some(priority) = update.priority {
        sets.push("priority = ?");
        binds.push(Value::from(priority.to_string()));
    }
    if let Some(assigned_to) = &update.assigned_to {
        sets.push("assigned_to = ?");
        binds.push(Value::from(assigned_to.clone()));
    }
    if let Some(note) = &update.note {
        sets.push("note = ?");
        binds.push(Value::from(note.clone()));
    }
    if sets.is_empty() {
        return get_escalation(db, id).await;
    }
    let sql = format!("UPDATE escalations SET {} WHERE id = ?", sets.join(", "));
    binds.push(Value::from(id.as_str().to_string()));

    let id = id.clone();
    db.connection()
        .call(move |conn| {
            let affected = conn.execute(&sql, params_from_iter(binds))?;
            if affected == 0 {
                return Ok(None);
            }
            let escalation = conn
                .query_row(
                    &format!("SELECT {ESCALATION_COLUMNS} FROM escalations WHERE id = ?1"),
                    params![id.as_str()],
                    row_to_escalation,
                )
                .optional()?;
            Ok(escalation)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::contacts;
    use nagare_core::types::KnowledgeId;
    use tempfile::tempdir;

    async fn setup() -> (Database, ContactId, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let contact = contacts::insert(&db, "U-ai", None).await.unwrap();
        (db, contact.id, dir)
    }

    fn chat_log(contact_id: &ContactId) -> NewAiChatLog {
        NewAiChatLog {
            contact_id: contact_id.clone(),
            user_message: "営業時間を教えてください".to_string(),
            ai_reply: "平日10時から18時まで営業しています。".to_string(),
            confidence: 0.8,
            should_escalate: false,
            knowledge_ids: vec![KnowledgeId::from("k-1".to_string())],
            response_time_ms: 420,
        }
    }

    #[tokio::test]
    async fn chat_log_roundtrips_with_json_knowledge_ids() {
        let (db, contact_id, _dir) = setup().await;
        let id = insert_chat_log(&db, &chat_log(&contact_id)).await.unwrap();

        let log = get_chat_log(&db, &id).await.unwrap().unwrap();
        assert_eq!(log.confidence, 0.8);
        assert!(!log.should_escalate);
        assert_eq!(log.knowledge_ids.as_deref(), Some(r#"["k-1"]"#));
        assert_eq!(log.response_time_ms, Some(420));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn escalation_opens_with_defaults() {
        let (db, contact_id, _dir) = setup().await;
        let log_id = insert_chat_log(&db, &chat_log(&contact_id)).await.unwrap();
        let id = insert_escalation(&db, &contact_id, Some(&log_id), EscalationPriority::High)
            .await
            .unwrap();

        let escalation = get_escalation(&db, &id).await.unwrap().unwrap();
        assert_eq!(escalation.status, EscalationStatus::Open);
        assert_eq!(escalation.priority, EscalationPriority::High);
        assert_eq!(escalation.ai_chat_log_id, Some(log_id));
        assert!(escalation.resolved_at.is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_filters_by_status_newest_first() {
        let (db, contact_id, _dir) = setup().await;
        let first = insert_escalation(&db, &contact_id, None, EscalationPriority::Normal)
            .await
            .unwrap();
        let second = insert_escalation(&db, &contact_id, None, EscalationPriority::Normal)
            .await
            .unwrap();
        update_escalation(
            &db,
            &first,
            &EscalationUpdate {
                status: Some(EscalationStatus::Resolved),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let all = list_escalations(&db, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second, "newest first");

        let open = list_escalations(&db, Some(EscalationStatus::Open)).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, second);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn resolve_stamps_resolved_at() {
        let (db, contact_id, _dir) = setup().await;
        let id = insert_escalation(&db, &contact_id, None, EscalationPriority::Normal)
            .await
            .unwrap();

        let updated = update_escalation(
            &db,
            &id,
            &EscalationUpdate {
                status: Some(EscalationStatus::Resolved),
                assigned_to: Some("support-taro".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(updated.status, EscalationStatus::Resolved);
        assert!(updated.resolved_at.is_some());
        assert_eq!(updated.assigned_to.as_deref(), Some("support-taro"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn partial_update_leaves_other_fields() {
        let (db, contact_id, _dir) = setup().await;
        let id = insert_escalation(&db, &contact_id, None, EscalationPriority::Normal)
            .await
            .unwrap();

        let updated = update_escalation(
            &db,
            &id,
            &EscalationUpdate {
                note: Some("requires refund approval".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(updated.status, EscalationStatus::Open);
        assert_eq!(updated.priority, EscalationPriority::Normal);
        assert_eq!(updated.note.as_deref(), Some("requires refund approval"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn update_unknown_returns_none() {
        let (db, _contact_id, _dir) = setup().await;
        let missing = update_escalation(
            &db,
            &EscalationId::new(),
            &EscalationUpdate {
                status: Some(EscalationStatus::InProgress),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(missing.is_none());
        db.close().await.unwrap();
    }
}
