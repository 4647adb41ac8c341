// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scenario execution: turning a triggered scenario into delivery-log rows.
//!
//! Only the first step, and only when its delay is zero, is sent inline.
//! Every other step becomes a `pending` delivery-log row picked up later by
//! the poller. The delivery log is the idempotence record: executing the
//! same scenario twice for the same contact schedules two full row sets.

use std::sync::Arc;

use nagare_core::traits::platform::PlatformAdapter;
use nagare_core::types::{ContactId, OutgoingMessage, ScenarioId};
use nagare_core::NagareError;
use nagare_storage::queries::{contacts, deliveries, messages, scenarios};
use nagare_storage::{utc_after_minutes, Database, NewMessage};
use tracing::{debug, info, warn};

/// Executes scenarios for individual contacts.
#[derive(Clone)]
pub struct ScenarioEngine {
    db: Database,
    platform: Arc<dyn PlatformAdapter>,
}

impl ScenarioEngine {
    pub fn new(db: Database, platform: Arc<dyn PlatformAdapter>) -> Self {
        Self { db, platform }
    }

    /// Runs one scenario for one contact.
    ///
    /// A scenario without steps and an unresolvable contact are both
    /// no-ops. An immediate-send failure is recorded as a `failed` delivery
    /// row and does not surface; storage failures do.
    pub async fn execute(
        &self,
        scenario_id: &ScenarioId,
        contact_id: &ContactId,
    ) -> Result<(), NagareError> {
        let steps = scenarios::steps_ordered(&self.db, scenario_id).await?;
        if steps.is_empty() {
            debug!(scenario_id = scenario_id.as_str(), "scenario has no steps");
            return Ok(());
        }

        let Some(contact) = contacts::find_by_id(&self.db, contact_id).await? else {
            warn!(
                scenario_id = scenario_id.as_str(),
                contact_id = contact_id.as_str(),
                "scenario execution for unknown contact skipped"
            );
            return Ok(());
        };

        let mut immediate = 0u32;
        let mut scheduled = 0u32;
        for (index, step) in steps.iter().enumerate() {
            if index == 0 && step.delay_minutes == 0 {
                let message = OutgoingMessage::text(step.message_content.as_str());
                match self
                    .platform
                    .send_push(&contact.line_user_id, &[message])
                    .await
                {
                    Ok(()) => {
                        messages::append(
                            &self.db,
                            &NewMessage::outbound_text(
                                contact.id.clone(),
                                step.message_content.as_str(),
                            ),
                        )
                        .await?;
                        deliveries::insert_sent(&self.db, scenario_id, &step.id, contact_id)
                            .await?;
                        immediate += 1;
                    }
                    Err(e) => {
                        warn!(
                            scenario_id = scenario_id.as_str(),
                            step_id = step.id.as_str(),
                            error = %e,
                            "immediate scenario step send failed"
                        );
                        deliveries::insert_failed(
                            &self.db,
                            scenario_id,
                            &step.id,
                            contact_id,
                            &e.to_string(),
                        )
                        .await?;
                    }
                }
            } else {
                let scheduled_at = utc_after_minutes(step.delay_minutes);
                deliveries::insert_pending(
                    &self.db,
                    scenario_id,
                    &step.id,
                    contact_id,
                    &scheduled_at,
                )
                .await?;
                scheduled += 1;
            }
        }

        info!(
            scenario_id = scenario_id.as_str(),
            contact_id = contact_id.as_str(),
            immediate,
            scheduled,
            "scenario executed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nagare_core::types::{DeliveryStatus, TriggerKind};
    use nagare_test_utils::{open_test_db, seed_contact, seed_scenario, MockPlatform, TestDb};

    struct Setup {
        test_db: TestDb,
        platform: Arc<MockPlatform>,
        engine: ScenarioEngine,
    }

    async fn setup() -> Setup {
        let test_db = open_test_db().await.unwrap();
        let platform = Arc::new(MockPlatform::new());
        let engine = ScenarioEngine::new(test_db.db.clone(), platform.clone());
        Setup {
            test_db,
            platform,
            engine,
        }
    }

    /// (status, scheduled_at, sent_at, error_message) per delivery row.
    async fn delivery_rows(
        db: &Database,
    ) -> Vec<(String, Option<String>, Option<String>, Option<String>)> {
        db.connection()
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT status, scheduled_at, sent_at, error_message
                     FROM delivery_logs ORDER BY created_at, rowid",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok::<_, rusqlite::Error>(rows)
            })
            .await
            .unwrap()
    }

    async fn message_count(db: &Database) -> i64 {
        db.connection()
            .call(|conn| {
                let count =
                    conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
                Ok::<_, rusqlite::Error>(count)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn first_zero_delay_step_sends_immediately_and_schedules_rest() {
        let s = setup().await;
        let contact = seed_contact(&s.test_db.db, "U-exec", "太郎").await.unwrap();
        let (scenario, _) = seed_scenario(
            &s.test_db.db,
            "ようこそ",
            TriggerKind::Follow,
            None,
            &[("ようこそ！", 0), ("使い方はこちらです。", 60)],
        )
        .await
        .unwrap();

        s.engine.execute(&scenario.id, &contact.id).await.unwrap();

        let pushes = s.platform.pushes().await;
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].0, "U-exec");
        let OutgoingMessage::Text { text } = &pushes[0].1[0];
        assert_eq!(text, "ようこそ！");

        let rows = delivery_rows(&s.test_db.db).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, DeliveryStatus::Sent.to_string());
        assert!(rows[0].2.is_some());
        assert_eq!(rows[1].0, DeliveryStatus::Pending.to_string());
        assert!(rows[1].1.is_some());

        // The immediate send left one stored outbound message.
        assert_eq!(message_count(&s.test_db.db).await, 1);
    }

    #[tokio::test]
    async fn first_step_with_delay_is_scheduled_not_sent() {
        let s = setup().await;
        let contact = seed_contact(&s.test_db.db, "U-later", "花子").await.unwrap();
        let (scenario, _) = seed_scenario(
            &s.test_db.db,
            "後で",
            TriggerKind::Manual,
            None,
            &[("5分後です", 5)],
        )
        .await
        .unwrap();

        s.engine.execute(&scenario.id, &contact.id).await.unwrap();

        assert_eq!(s.platform.push_count().await, 0);
        let rows = delivery_rows(&s.test_db.db).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, DeliveryStatus::Pending.to_string());
    }

    #[tokio::test]
    async fn immediate_send_failure_is_recorded_not_raised() {
        let s = setup().await;
        let contact = seed_contact(&s.test_db.db, "U-down", "次郎").await.unwrap();
        s.platform.fail_push_to("U-down").await;
        let (scenario, _) = seed_scenario(
            &s.test_db.db,
            "即時",
            TriggerKind::Manual,
            None,
            &[("届きません", 0)],
        )
        .await
        .unwrap();

        s.engine.execute(&scenario.id, &contact.id).await.unwrap();

        let rows = delivery_rows(&s.test_db.db).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, DeliveryStatus::Failed.to_string());
        assert!(rows[0].3.as_deref().unwrap().contains("U-down"));
        // No outbound message is stored for a failed send.
        assert_eq!(message_count(&s.test_db.db).await, 0);
    }

    #[tokio::test]
    async fn empty_scenario_is_a_noop() {
        let s = setup().await;
        let contact = seed_contact(&s.test_db.db, "U-empty", "三郎").await.unwrap();
        let (scenario, _) = seed_scenario(&s.test_db.db, "空", TriggerKind::Manual, None, &[])
            .await
            .unwrap();

        s.engine.execute(&scenario.id, &contact.id).await.unwrap();

        assert!(delivery_rows(&s.test_db.db).await.is_empty());
        assert_eq!(s.platform.push_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_contact_is_a_noop() {
        let s = setup().await;
        let (scenario, _) = seed_scenario(
            &s.test_db.db,
            "宛先なし",
            TriggerKind::Manual,
            None,
            &[("x", 0)],
        )
        .await
        .unwrap();

        s.engine
            .execute(&scenario.id, &ContactId::from("no-such-contact".to_string()))
            .await
            .unwrap();

        assert!(delivery_rows(&s.test_db.db).await.is_empty());
    }

    #[tokio::test]
    async fn double_execute_creates_independent_row_sets() {
        let s = setup().await;
        let contact = seed_contact(&s.test_db.db, "U-twice", "四郎").await.unwrap();
        let (scenario, _) = seed_scenario(
            &s.test_db.db,
            "二重",
            TriggerKind::Manual,
            None,
            &[("a", 0), ("b", 30)],
        )
        .await
        .unwrap();

        s.engine.execute(&scenario.id, &contact.id).await.unwrap();
        s.engine.execute(&scenario.id, &contact.id).await.unwrap();

        let rows = delivery_rows(&s.test_db.db).await;
        assert_eq!(rows.len(), 4);
        assert_eq!(s.platform.push_count().await, 2);
    }
}
