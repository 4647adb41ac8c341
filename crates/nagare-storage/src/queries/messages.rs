// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message log operations.

use nagare_core::types::{ContactId, Direction, MessageId};
use nagare_core::NagareError;
use rusqlite::params;

use crate::database::Database;
use crate::models::{parse_enum, NewMessage};

/// Append a message row and return its id. `sent_at` is stamped here.
pub async fn append(db: &Database, message: &NewMessage) -> Result<MessageId, NagareError> {
    let id = MessageId::new();
    let message = message.clone();
    let sent_at = crate::database::now_utc();
    let result_id = id.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, contact_id, direction, message_kind, content, raw_json, sent_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id.as_str(),
                    message.contact_id.as_str(),
                    message.direction.to_string(),
                    message.message_kind,
                    message.content,
                    message.raw_json,
                    sent_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(result_id)
}

/// The contact's most recent text messages with non-null content, returned
/// oldest first. Feeds conversation history for reply generation.
pub async fn recent_text_turns(
    db: &Database,
    contact_id: &ContactId,
    limit: u32,
) -> Result<Vec<(Direction, String)>, NagareError> {
    let contact_id = contact_id.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT direction, content FROM messages
                 WHERE contact_id = ?1 AND message_kind = 'text' AND content IS NOT NULL
                 ORDER BY sent_at DESC, rowid DESC
                 LIMIT ?2",
            )?;
            let mut turns = stmt
                .query_map(params![contact_id.as_str(), limit], |row| {
                    let direction: Direction = parse_enum(0, row.get::<_, String>(0)?)?;
                    Ok((direction, row.get::<_, String>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            turns.reverse();
            Ok(turns)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
