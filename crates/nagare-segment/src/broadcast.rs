// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Segment preview, broadcast send, and delivery history.
//!
//! A broadcast writes one delivery_log row per recipient with a NULL
//! scenario_id; history reads those rows back. One recipient's push failure
//! never stops the rest of the audience.

use nagare_core::traits::platform::PlatformAdapter;
use nagare_core::types::{ContactId, OutgoingMessage};
use nagare_core::NagareError;
use nagare_storage::queries::{deliveries, messages};
use nagare_storage::{map_tr_err, BroadcastHistoryEntry, Database, NewMessage};
use rusqlite::params_from_iter;
use serde::Serialize;
use tracing::{info, warn};

use crate::builder;
use crate::conditions::SegmentCondition;

/// Preview lists at most this many contacts; the total stays exact.
pub const PREVIEW_CAP: usize = 100;

/// A contact matched by a segment query.
#[derive(Debug, Clone, Serialize)]
pub struct MatchedContact {
    pub id: ContactId,
    pub line_user_id: String,
    pub display_name: Option<String>,
    pub picture_url: Option<String>,
}

/// Matched-audience summary for a condition set.
#[derive(Debug, Serialize)]
pub struct SegmentPreview {
    pub total: u32,
    pub contacts: Vec<MatchedContact>,
}

/// Per-recipient result counts for one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastOutcome {
    pub total: u32,
    pub sent: u32,
    pub failed: u32,
}

/// One page of broadcast delivery history.
#[derive(Debug, Serialize)]
pub struct BroadcastHistoryPage {
    pub entries: Vec<BroadcastHistoryEntry>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

/// Run the segment query and return every matched contact.
pub async fn matched_contacts(
    db: &Database,
    conditions: &[SegmentCondition],
) -> Result<Vec<MatchedContact>, NagareError> {
    let (sql, binds) = builder::build(conditions)?;
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let contacts = stmt
                .query_map(params_from_iter(binds), |row| {
                    Ok(MatchedContact {
                        id: ContactId::from(row.get::<_, String>(0)?),
                        line_user_id: row.get(1)?,
                        display_name: row.get(2)?,
                        picture_url: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(contacts)
        })
        .await
        .map_err(map_tr_err)
}

/// Count every match, list the first [`PREVIEW_CAP`].
pub async fn preview(
    db: &Database,
    conditions: &[SegmentCondition],
) -> Result<SegmentPreview, NagareError> {
    let matched = matched_contacts(db, conditions).await?;
    let total = matched.len() as u32;
    let contacts = matched.into_iter().take(PREVIEW_CAP).collect();
    Ok(SegmentPreview { total, contacts })
}

/// Push `text` to every matched contact.
///
/// Each success appends an outbound message and a `sent` delivery log; each
/// push failure records a `failed` log with the error and moves on.
pub async fn send(
    db: &Database,
    platform: &dyn PlatformAdapter,
    conditions: &[SegmentCondition],
    text: &str,
) -> Result<BroadcastOutcome, NagareError> {
    let matched = matched_contacts(db, conditions).await?;
    let mut outcome = BroadcastOutcome {
        total: matched.len() as u32,
        ..BroadcastOutcome::default()
    };
    for contact in matched {
        match platform
            .send_push(&contact.line_user_id, &[OutgoingMessage::text(text)])
            .await
        {
            Ok(()) => {
                messages::append(db, &NewMessage::outbound_text(contact.id.clone(), text)).await?;
                deliveries::insert_broadcast_sent(db, &contact.id).await?;
                outcome.sent += 1;
            }
            Err(e) => {
                warn!(contact_id = contact.id.as_str(), error = %e, "broadcast push failed");
                deliveries::insert_broadcast_failed(db, &contact.id, &e.to_string()).await?;
                outcome.failed += 1;
            }
        }
    }
    info!(
        total = outcome.total,
        sent = outcome.sent,
        failed = outcome.failed,
        "segment broadcast finished"
    );
    Ok(outcome)
}

/// Paginated broadcast delivery history, newest first.
pub async fn history(
    db: &Database,
    page: u32,
    limit: u32,
) -> Result<BroadcastHistoryPage, NagareError> {
    let page = page.max(1);
    let limit = limit.clamp(1, 100);
    let (entries, total) = deliveries::broadcast_history(db, page, limit).await?;
    let total_pages = (total as u64).div_ceil(u64::from(limit)) as i64;
    Ok(BroadcastHistoryPage {
        entries,
        page,
        limit,
        total,
        total_pages,
    })
}
