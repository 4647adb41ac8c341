// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduled delivery processing.
//!
//! Due pending rows are claimed atomically (status flip guarded by
//! `WHERE status = 'pending'`), so overlapping invocations never send the
//! same row twice. Each claimed row is then delivered independently; one
//! row's failure never aborts the rest of the batch.

use std::sync::Arc;

use nagare_core::traits::platform::PlatformAdapter;
use nagare_core::types::OutgoingMessage;
use nagare_core::NagareError;
use nagare_storage::queries::{contacts, deliveries, messages};
use nagare_storage::{ClaimedDelivery, Database, NewMessage};
use serde::Serialize;
use tracing::{info, warn};

/// Counts from one poller invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollOutcome {
    pub processed: u32,
    pub sent: u32,
    pub failed: u32,
}

/// Claims and delivers due scheduled messages.
#[derive(Clone)]
pub struct DeliveryPoller {
    db: Database,
    platform: Arc<dyn PlatformAdapter>,
    batch_size: u32,
}

impl DeliveryPoller {
    pub fn new(db: Database, platform: Arc<dyn PlatformAdapter>, batch_size: u32) -> Self {
        Self {
            db,
            platform,
            batch_size,
        }
    }

    /// Processes one batch of due deliveries.
    ///
    /// Backlog beyond `batch_size` stays pending for the next invocation.
    pub async fn run_once(&self) -> Result<PollOutcome, NagareError> {
        let claimed = deliveries::claim_due_batch(&self.db, self.batch_size).await?;
        let mut outcome = PollOutcome {
            processed: claimed.len() as u32,
            sent: 0,
            failed: 0,
        };

        for delivery in &claimed {
            match self.deliver_one(delivery).await {
                Ok(true) => outcome.sent += 1,
                Ok(false) => outcome.failed += 1,
                Err(e) => {
                    outcome.failed += 1;
                    warn!(
                        delivery_id = delivery.id.as_str(),
                        error = %e,
                        "delivery processing failed"
                    );
                }
            }
        }

        if outcome.processed > 0 {
            info!(
                processed = outcome.processed,
                sent = outcome.sent,
                failed = outcome.failed,
                "delivery batch processed"
            );
        }
        Ok(outcome)
    }

    /// Delivers one claimed row; `Ok(true)` when it reached `sent`.
    async fn deliver_one(&self, delivery: &ClaimedDelivery) -> Result<bool, NagareError> {
        let Some(content) = delivery.message_content.as_deref() else {
            deliveries::mark_failed(&self.db, &delivery.id, "scenario step no longer exists")
                .await?;
            return Ok(false);
        };

        let Some(contact) = contacts::find_by_id(&self.db, &delivery.contact_id).await? else {
            let err = NagareError::ContactUnresolved {
                contact_id: delivery.contact_id.to_string(),
            };
            deliveries::mark_failed(&self.db, &delivery.id, &err.to_string()).await?;
            return Ok(false);
        };

        match self
            .platform
            .send_push(&contact.line_user_id, &[OutgoingMessage::text(content)])
            .await
        {
            Ok(()) => {
                messages::append(&self.db, &NewMessage::outbound_text(contact.id, content))
                    .await?;
                deliveries::mark_sent(&self.db, &delivery.id).await?;
                Ok(true)
            }
            Err(e) => {
                deliveries::mark_failed(&self.db, &delivery.id, &e.to_string()).await?;
                Ok(false)
            }
        }
    }
}
