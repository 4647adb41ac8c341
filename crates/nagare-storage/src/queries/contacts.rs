// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact directory operations.

use nagare_core::types::{ContactId, ContactStatus, Profile};
use nagare_core::NagareError;
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::models::{parse_enum, Contact};

const CONTACT_COLUMNS: &str =
    "id, line_user_id, display_name, picture_url, status_message, status, created_at, updated_at";

fn row_to_contact(row: &rusqlite::Row<'_>) -> Result<Contact, rusqlite::Error> {
    Ok(Contact {
        id: ContactId::from(row.get::<_, String>(0)?),
        line_user_id: row.get(1)?,
        display_name: row.get(2)?,
        picture_url: row.get(3)?,
        status_message: row.get(4)?,
        status: parse_enum(5, row.get::<_, String>(5)?)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Look up a contact by the platform's stable user id.
pub async fn find_by_line_user_id(
    db: &Database,
    line_user_id: &str,
) -> Result<Option<Contact>, NagareError> {
    let line_user_id = line_user_id.to_string();
    db.connection()
        .call(move |conn| {
            let contact = conn
                .query_row(
                    &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE line_user_id = ?1"),
                    params![line_user_id],
                    row_to_contact,
                )
                .optional()?;
            Ok(contact)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Look up a contact by internal id.
pub async fn find_by_id(db: &Database, id: &ContactId) -> Result<Option<Contact>, NagareError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| {
            let contact = conn
                .query_row(
                    &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1"),
                    params![id.as_str()],
                    row_to_contact,
                )
                .optional()?;
            Ok(contact)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert a new active contact, optionally seeded with profile fields.
pub async fn insert(
    db: &Database,
    line_user_id: &str,
    profile: Option<&Profile>,
) -> Result<Contact, NagareError> {
    let id = ContactId::new();
    let line_user_id = line_user_id.to_string();
    let profile = profile.cloned().unwrap_or_default();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO contacts (id, line_user_id, display_name, picture_url, status_message, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.as_str(),
                    line_user_id,
                    profile.display_name,
                    profile.picture_url,
                    profile.status_message,
                    ContactStatus::Active.to_string(),
                ],
            )?;
            let contact = conn.query_row(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1"),
                params![id.as_str()],
                row_to_contact,
            )?;
            Ok(contact)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Reactivate a contact on re-follow, refreshing any profile fields the
/// platform returned. Missing fields keep their stored values.
///
/// Returns the updated contact, or `None` when no such contact exists.
pub async fn reactivate(
    db: &Database,
    line_user_id: &str,
    profile: Option<&Profile>,
) -> Result<Option<Contact>, NagareError> {
    let line_user_id = line_user_id.to_string();
    let profile = profile.cloned().unwrap_or_default();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE contacts
                 SET status = ?1,
                     display_name = COALESCE(?2, display_name),
                     picture_url = COALESCE(?3, picture_url),
                     status_message = COALESCE(?4, status_message),
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE line_user_id = ?5",
                params![
                    ContactStatus::Active.to_string(),
                    profile.display_name,
                    profile.picture_url,
                    profile.status_message,
                    line_user_id,
                ],
            )?;
            let contact = conn
                .query_row(
                    &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE line_user_id = ?1"),
                    params![line_user_id],
                    row_to_contact,
                )
                .optional()?;
            Ok(contact)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark a contact unfollowed by platform user id. No-op when unknown.
pub async fn mark_unfollowed(db: &Database, line_user_id: &str) -> Result<(), NagareError> {
    let line_user_id = line_user_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE contacts
                 SET status = ?1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE line_user_id = ?2",
                params![ContactStatus::Unfollowed.to_string(), line_user_id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
