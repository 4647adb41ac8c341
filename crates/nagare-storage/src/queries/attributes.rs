// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Free-form per-contact attributes (key/value).

use nagare_core::types::ContactId;
use nagare_core::NagareError;
use rusqlite::{params, OptionalExtension};

use crate::database::Database;

/// Upsert one attribute for a contact.
pub async fn set(
    db: &Database,
    contact_id: &ContactId,
    key: &str,
    value: &str,
) -> Result<(), NagareError> {
    let contact_id = contact_id.clone();
    let key = key.to_string();
    let value = value.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO contact_attributes (contact_id, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(contact_id, key) DO UPDATE
                 SET value = excluded.value,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![contact_id.as_str(), key, value],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Read one attribute value.
pub async fn get(
    db: &Database,
    contact_id: &ContactId,
    key: &str,
) -> Result<Option<String>, NagareError> {
    let contact_id = contact_id.clone();
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM contact_attributes WHERE contact_id = ?1 AND key = ?2",
                    params![contact_id.as_str(), key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::contacts;
    use tempfile::tempdir;

    #[tokio::test]
    async fn set_overwrites_existing_value() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let contact = contacts::insert(&db, "U-attr", None).await.unwrap();

        set(&db, &contact.id, "plan", "free").await.unwrap();
        assert_eq!(get(&db, &contact.id, "plan").await.unwrap().as_deref(), Some("free"));

        set(&db, &contact.id, "plan", "premium").await.unwrap();
        assert_eq!(
            get(&db, &contact.id, "plan").await.unwrap().as_deref(),
            Some("premium")
        );
        assert!(get(&db, &contact.id, "missing").await.unwrap().is_none());

        db.close().await.unwrap();
    }
}
