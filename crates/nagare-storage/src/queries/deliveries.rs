// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery log state machine.
//!
//! Rows move `pending -> claimed -> sent|failed`, or `pending -> cancelled`.
//! Immediate sends insert terminal rows directly. Broadcast rows carry a NULL
//! scenario id. `sent`, `failed` and `cancelled` are terminal.

use nagare_core::types::{ContactId, DeliveryLogId, DeliveryStatus, ScenarioId, ScenarioStepId};
use nagare_core::NagareError;
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::models::{parse_enum, BroadcastHistoryEntry, ClaimedDelivery, DeliveryLog};

const DELIVERY_COLUMNS: &str = "id, scenario_id, scenario_step_id, contact_id, status, \
                                scheduled_at, sent_at, error_message, created_at";

fn row_to_delivery(row: &rusqlite::Row<'_>) -> Result<DeliveryLog, rusqlite::Error> {
    Ok(DeliveryLog {
        id: DeliveryLogId::from(row.get::<_, String>(0)?),
        scenario_id: row.get::<_, Option<String>>(1)?.map(ScenarioId::from),
        scenario_step_id: row.get::<_, Option<String>>(2)?.map(ScenarioStepId::from),
        contact_id: ContactId::from(row.get::<_, String>(3)?),
        status: parse_enum(4, row.get::<_, String>(4)?)?,
        scheduled_at: row.get(5)?,
        sent_at: row.get(6)?,
        error_message: row.get(7)?,
        created_at: row.get(8)?,
    })
}

async fn insert_row(
    db: &Database,
    scenario_id: Option<ScenarioId>,
    step_id: Option<ScenarioStepId>,
    contact_id: ContactId,
    status: DeliveryStatus,
    scheduled_at: Option<String>,
    sent_at: Option<String>,
    error_message: Option<String>,
) -> Result<DeliveryLogId, NagareError> {
    let id = DeliveryLogId::new();
    let result_id = id.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO delivery_logs
                 (id, scenario_id, scenario_step_id, contact_id, status, scheduled_at, sent_at, error_message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id.as_str(),
                    scenario_id.as_ref().map(|s| s.as_str().to_string()),
                    step_id.as_ref().map(|s| s.as_str().to_string()),
                    contact_id.as_str(),
                    status.to_string(),
                    scheduled_at,
                    sent_at,
                    error_message,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(result_id)
}

/// Record an already-delivered scenario step.
pub async fn insert_sent(
    db: &Database,
    scenario_id: &ScenarioId,
    step_id: &ScenarioStepId,
    contact_id: &ContactId,
) -> Result<DeliveryLogId, NagareError> {
    insert_row(
        db,
        Some(scenario_id.clone()),
        Some(step_id.clone()),
        contact_id.clone(),
        DeliveryStatus::Sent,
        None,
        Some(crate::database::now_utc()),
        None,
    )
    .await
}

/// Record a scenario step whose immediate send failed.
pub async fn insert_failed(
    db: &Database,
    scenario_id: &ScenarioId,
    step_id: &ScenarioStepId,
    contact_id: &ContactId,
    error: &str,
) -> Result<DeliveryLogId, NagareError> {
    insert_row(
        db,
        Some(scenario_id.clone()),
        Some(step_id.clone()),
        contact_id.clone(),
        DeliveryStatus::Failed,
        None,
        None,
        Some(error.to_string()),
    )
    .await
}

/// Schedule a scenario step for later delivery.
pub async fn insert_pending(
    db: &Database,
    scenario_id: &ScenarioId,
    step_id: &ScenarioStepId,
    contact_id: &ContactId,
    scheduled_at: &str,
) -> Result<DeliveryLogId, NagareError> {
    insert_row(
        db,
        Some(scenario_id.clone()),
        Some(step_id.clone()),
        contact_id.clone(),
        DeliveryStatus::Pending,
        Some(scheduled_at.to_string()),
        None,
        None,
    )
    .await
}

/// Record a delivered broadcast message (no scenario attached).
pub async fn insert_broadcast_sent(
    db: &Database,
    contact_id: &ContactId,
) -> Result<DeliveryLogId, NagareError> {
    insert_row(
        db,
        None,
        None,
        contact_id.clone(),
        DeliveryStatus::Sent,
        None,
        Some(crate::database::now_utc()),
        None,
    )
    .await
}

/// Record a failed broadcast send.
pub async fn insert_broadcast_failed(
    db: &Database,
    contact_id: &ContactId,
    error: &str,
) -> Result<DeliveryLogId, NagareError> {
    insert_row(
        db,
        None,
        None,
        contact_id.clone(),
        DeliveryStatus::Failed,
        None,
        None,
        Some(error.to_string()),
    )
    .await
}

/// Atomically claim up to `limit` due pending rows.
///
/// One transaction selects the due rows joined to their step content, then
/// flips each to `claimed` conditional on it still being `pending`. A row
/// another poller claimed in between is dropped from the batch, so two
/// overlapping invocations never deliver the same row twice.
pub async fn claim_due_batch(
    db: &Database,
    limit: u32,
) -> Result<Vec<ClaimedDelivery>, NagareError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let due: Vec<(String, String, Option<String>)> = {
                let mut stmt = tx.prepare(
                    "SELECT dl.id, dl.contact_id, ss.message_content
                     FROM delivery_logs dl
                     LEFT JOIN scenario_steps ss ON ss.id = dl.scenario_step_id
                     WHERE dl.status = ?1
                       AND dl.scheduled_at <= strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     ORDER BY dl.scheduled_at
                     LIMIT ?2",
                )?;
                stmt.query_map(params![DeliveryStatus::Pending.to_string(), limit], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })?
                .collect::<Result<Vec<_>, _>>()?
            };
            let mut claimed = Vec::with_capacity(due.len());
            for (id, contact_id, message_content) in due {
                let affected = tx.execute(
                    "UPDATE delivery_logs SET status = ?1 WHERE id = ?2 AND status = ?3",
                    params![
                        DeliveryStatus::Claimed.to_string(),
                        id,
                        DeliveryStatus::Pending.to_string(),
                    ],
                )?;
                if affected == 1 {
                    claimed.push(ClaimedDelivery {
                        id: DeliveryLogId::from(id),
                        contact_id: ContactId::from(contact_id),
                        message_content,
                    });
                }
            }
            tx.commit()?;
            Ok(claimed)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Transition a claimed row to `sent`. Returns false when the row was not
/// in `claimed`.
pub async fn mark_sent(db: &Database, id: &DeliveryLogId) -> Result<bool, NagareError> {
    let id = id.clone();
    let sent_at = crate::database::now_utc();
    db.connection()
        .call(move |conn| {
            let affected = conn.execute(
                "UPDATE delivery_logs SET status = ?1, sent_at = ?2 WHERE id = ?3 AND status = ?4",
                params![
                    DeliveryStatus::Sent.to_string(),
                    sent_at,
                    id.as_str(),
                    DeliveryStatus::Claimed.to_string(),
                ],
            )?;
            Ok(affected == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Transition a claimed row to `failed` with the error text. Returns false
/// when the row was not in `claimed`.
pub async fn mark_failed(
    db: &Database,
    id: &DeliveryLogId,
    error: &str,
) -> Result<bool, NagareError> {
    let id = id.clone();
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            let affected = conn.execute(
                "UPDATE delivery_logs SET status = ?1, error_message = ?2
                 WHERE id = ?3 AND status = ?4",
                params![
                    DeliveryStatus::Failed.to_string(),
                    error,
                    id.as_str(),
                    DeliveryStatus::Claimed.to_string(),
                ],
            )?;
            Ok(affected == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Cancel a pending row. Returns false when the row is absent or already
/// claimed, terminal, or cancelled.
pub async fn cancel(db: &Database, id: &DeliveryLogId) -> Result<bool, NagareError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| {
            let affected = conn.execute(
                "UPDATE delivery_logs SET status = ?1 WHERE id = ?2 AND status = ?3",
                params![
                    DeliveryStatus::Cancelled.to_string(),
                    id.as_str(),
                    DeliveryStatus::Pending.to_string(),
                ],
            )?;
            Ok(affected == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch one delivery log row.
pub async fn get(db: &Database, id: &DeliveryLogId) -> Result<Option<DeliveryLog>, NagareError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| {
            let log = conn
                .query_row(
                    &format!("SELECT {DELIVERY_COLUMNS} FROM delivery_logs WHERE id = ?1"),
                    params![id.as_str()],
                    row_to_delivery,
                )
                .optional()?;
            Ok(log)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Broadcast delivery history (rows without a scenario), newest first, with
/// the total row count for pagination. `page` is 1-based.
pub async fn broadcast_history(
    db: &Database,
    page: u32,
    limit: u32,
) -> Result<(Vec<BroadcastHistoryEntry>, i64), NagareError> {
    let offset = page.saturating_sub(1).saturating_mul(limit);
    db.connection()
        .call(move |conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM delivery_logs WHERE scenario_id IS NULL",
                [],
                |row| row.get(0),
            )?;
            let mut stmt = conn.prepare(
                "SELECT dl.id, dl.contact_id, dl.status, dl.sent_at, dl.error_message,
                        dl.created_at, c.display_name, c.picture_url
                 FROM delivery_logs dl
                 LEFT JOIN contacts c ON c.id = dl.contact_id
                 WHERE dl.scenario_id IS NULL
                 ORDER BY dl.created_at DESC, dl.rowid DESC
                 LIMIT ?1 OFFSET ?2",
            )?;
            let entries = stmt
                .query_map(params![limit, offset], |row| {
                    Ok(BroadcastHistoryEntry {
                        id: DeliveryLogId::from(row.get::<_, String>(0)?),
                        contact_id: ContactId::from(row.get::<_, String>(1)?),
                        status: parse_enum(2, row.get::<_, String>(2)?)?,
                        sent_at: row.get(3)?,
                        error_message: row.get(4)?,
                        created_at: row.get(5)?,
                        display_name: row.get(6)?,
                        picture_url: row.get(7)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok((entries, total))
        })
        .await
        .map_err(crate::database::map_tr_err)
}
