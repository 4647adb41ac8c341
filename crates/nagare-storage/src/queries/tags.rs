// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tag creation and assignment.

use nagare_core::types::{ContactId, TagId};
use nagare_core::NagareError;
use rusqlite::params;

use crate::database::Database;
use crate::models::{Tag, DEFAULT_TAG_COLOR};

/// Create a tag. Name must be unique.
pub async fn create(
    db: &Database,
    name: &str,
    color: Option<&str>,
    description: Option<&str>,
) -> Result<Tag, NagareError> {
    let id = TagId::new();
    let name = name.to_string();
    let color = color.unwrap_or(DEFAULT_TAG_COLOR).to_string();
    let description = description.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tags (id, name, color, description) VALUES (?1, ?2, ?3, ?4)",
                params![id.as_str(), name, color, description],
            )?;
            let tag = conn.query_row(
                "SELECT id, name, color, description, created_at FROM tags WHERE id = ?1",
                params![id.as_str()],
                |row| {
                    Ok(Tag {
                        id: TagId::from(row.get::<_, String>(0)?),
                        name: row.get(1)?,
                        color: row.get(2)?,
                        description: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )?;
            Ok(tag)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Attach a tag to a contact. Already-assigned pairs are left untouched.
pub async fn assign(
    db: &Database,
    contact_id: &ContactId,
    tag_id: &TagId,
) -> Result<(), NagareError> {
    let contact_id = contact_id.clone();
    let tag_id = tag_id.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO contact_tags (contact_id, tag_id) VALUES (?1, ?2)",
                params![contact_id.as_str(), tag_id.as_str()],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
