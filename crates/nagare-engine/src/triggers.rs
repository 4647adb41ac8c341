// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trigger evaluation: which active scenarios fire for an event.

use nagare_core::types::{ScenarioId, TriggerKind};
use nagare_core::NagareError;
use nagare_storage::queries::scenarios;
use nagare_storage::Database;
use serde::Deserialize;
use tracing::warn;

/// Wire shape of `trigger_config` for `message_keyword` scenarios.
#[derive(Debug, Deserialize)]
pub struct KeywordTriggerConfig {
    pub keywords: Vec<String>,
}

/// Returns the ids of active scenarios that fire for this event.
///
/// `follow` scenarios all fire. `message_keyword` scenarios fire when any
/// configured keyword is a substring of the message text; a scenario whose
/// config fails to parse is skipped with a warning and does not affect the
/// others. `tag_added` and `manual` scenarios never fire from events.
pub async fn evaluate(
    db: &Database,
    kind: TriggerKind,
    message_text: Option<&str>,
) -> Result<Vec<ScenarioId>, NagareError> {
    match kind {
        TriggerKind::Follow => {
            let matched = scenarios::active_by_kind(db, TriggerKind::Follow)
                .await?
                .into_iter()
                .map(|s| s.id)
                .collect();
            Ok(matched)
        }
        TriggerKind::MessageKeyword => {
            let Some(text) = message_text else {
                return Ok(Vec::new());
            };
            let mut matched = Vec::new();
            for scenario in scenarios::active_by_kind(db, TriggerKind::MessageKeyword).await? {
                let raw = scenario.trigger_config.as_deref().unwrap_or("");
                match serde_json::from_str::<KeywordTriggerConfig>(raw) {
                    Ok(config) => {
                        if config
                            .keywords
                            .iter()
                            .any(|keyword| text.contains(keyword.as_str()))
                        {
                            matched.push(scenario.id);
                        }
                    }
                    Err(e) => {
                        let err = NagareError::TriggerConfig {
                            scenario_id: scenario.id.to_string(),
                            detail: e.to_string(),
                        };
                        warn!(error = %err, "skipping scenario with invalid trigger config");
                    }
                }
            }
            Ok(matched)
        }
        TriggerKind::TagAdded | TriggerKind::Manual => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nagare_test_utils::{open_test_db, seed_keyword_scenario, seed_scenario};

    #[tokio::test]
    async fn follow_matches_every_active_follow_scenario() {
        let test_db = open_test_db().await.unwrap();
        let (a, _) = seed_scenario(&test_db.db, "歓迎A", TriggerKind::Follow, None, &[("A", 0)])
            .await
            .unwrap();
        let (b, _) = seed_scenario(&test_db.db, "歓迎B", TriggerKind::Follow, None, &[("B", 0)])
            .await
            .unwrap();
        seed_keyword_scenario(&test_db.db, "別物", &["在庫"], &[("C", 0)])
            .await
            .unwrap();

        let matched = evaluate(&test_db.db, TriggerKind::Follow, None).await.unwrap();
        assert_eq!(matched.len(), 2);
        assert!(matched.contains(&a.id));
        assert!(matched.contains(&b.id));
    }

    #[tokio::test]
    async fn keyword_matches_by_substring() {
        let test_db = open_test_db().await.unwrap();
        let (stock, _) = seed_keyword_scenario(&test_db.db, "在庫案内", &["在庫"], &[("在庫です", 0)])
            .await
            .unwrap();
        let (check, _) = seed_keyword_scenario(
            &test_db.db,
            "在庫確認フロー",
            &["在庫確認"],
            &[("確認します", 0)],
        )
        .await
        .unwrap();

        // 「在庫ありますか」 contains 在庫 but not 在庫確認.
        let matched = evaluate(
            &test_db.db,
            TriggerKind::MessageKeyword,
            Some("在庫ありますか"),
        )
        .await
        .unwrap();
        assert_eq!(matched, vec![stock.id.clone()]);

        // 「在庫確認お願いします」 contains both keywords.
        let matched = evaluate(
            &test_db.db,
            TriggerKind::MessageKeyword,
            Some("在庫確認お願いします"),
        )
        .await
        .unwrap();
        assert_eq!(matched.len(), 2);
        assert!(matched.contains(&stock.id));
        assert!(matched.contains(&check.id));
    }

    #[tokio::test]
    async fn unmatched_text_fires_nothing() {
        let test_db = open_test_db().await.unwrap();
        seed_keyword_scenario(&test_db.db, "在庫案内", &["在庫"], &[("在庫です", 0)])
            .await
            .unwrap();

        let matched = evaluate(
            &test_db.db,
            TriggerKind::MessageKeyword,
            Some("こんにちは"),
        )
        .await
        .unwrap();
        assert!(matched.is_empty());
    }

    #[tokio::test]
    async fn malformed_config_skips_only_that_scenario() {
        let test_db = open_test_db().await.unwrap();
        seed_scenario(
            &test_db.db,
            "壊れた設定",
            TriggerKind::MessageKeyword,
            Some(serde_json::json!({ "keyword": "在庫" })),
            &[("x", 0)],
        )
        .await
        .unwrap();
        let (good, _) = seed_keyword_scenario(&test_db.db, "正常", &["在庫"], &[("y", 0)])
            .await
            .unwrap();

        let matched = evaluate(
            &test_db.db,
            TriggerKind::MessageKeyword,
            Some("在庫ありますか"),
        )
        .await
        .unwrap();
        assert_eq!(matched, vec![good.id]);
    }

    #[tokio::test]
    async fn missing_config_is_treated_as_malformed() {
        let test_db = open_test_db().await.unwrap();
        seed_scenario(
            &test_db.db,
            "設定なし",
            TriggerKind::MessageKeyword,
            None,
            &[("x", 0)],
        )
        .await
        .unwrap();

        let matched = evaluate(
            &test_db.db,
            TriggerKind::MessageKeyword,
            Some("在庫ありますか"),
        )
        .await
        .unwrap();
        assert!(matched.is_empty());
    }

    #[tokio::test]
    async fn inactive_scenarios_never_fire() {
        let test_db = open_test_db().await.unwrap();
        let (scenario, _) =
            seed_keyword_scenario(&test_db.db, "停止中", &["在庫"], &[("x", 0)])
                .await
                .unwrap();
        test_db
            .db
            .connection()
            .call({
                let id = scenario.id.to_string();
                move |conn| {
                    conn.execute("UPDATE scenarios SET is_active = 0 WHERE id = ?1", [id])?;
                    Ok::<_, rusqlite::Error>(())
                }
            })
            .await
            .unwrap();

        let matched = evaluate(
            &test_db.db,
            TriggerKind::MessageKeyword,
            Some("在庫ありますか"),
        )
        .await
        .unwrap();
        assert!(matched.is_empty());
    }

    #[tokio::test]
    async fn manual_and_tag_added_never_match_events() {
        let test_db = open_test_db().await.unwrap();
        seed_scenario(&test_db.db, "手動", TriggerKind::Manual, None, &[("x", 0)])
            .await
            .unwrap();
        seed_scenario(&test_db.db, "タグ", TriggerKind::TagAdded, None, &[("y", 0)])
            .await
            .unwrap();

        assert!(evaluate(&test_db.db, TriggerKind::Manual, None).await.unwrap().is_empty());
        assert!(evaluate(&test_db.db, TriggerKind::TagAdded, Some("x")).await.unwrap().is_empty());
    }
}
