// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database fixtures for integration tests.
//!
//! `TestDb` owns a migrated SQLite database in a temp directory that is
//! removed on drop. Seed helpers insert the rows most tests start from.

use nagare_core::types::{Profile, TriggerKind};
use nagare_core::NagareError;
use nagare_storage::queries::{contacts, scenarios};
use nagare_storage::{Contact, Database, NewScenario, NewScenarioStep, Scenario, ScenarioStep};

/// A migrated test database; the backing temp directory lives as long as
/// this value.
pub struct TestDb {
    pub db: Database,
    _dir: tempfile::TempDir,
}

/// Opens a fresh migrated database under a temp directory.
pub async fn open_test_db() -> Result<TestDb, NagareError> {
    let dir = tempfile::TempDir::new().map_err(|e| NagareError::Storage {
        source: Box::new(e),
    })?;
    let path = dir.path().join("nagare-test.db");
    let db = Database::open(&path.to_string_lossy()).await?;
    Ok(TestDb { db, _dir: dir })
}

/// Inserts an active contact with the given display name.
pub async fn seed_contact(
    db: &Database,
    line_user_id: &str,
    display_name: &str,
) -> Result<Contact, NagareError> {
    let profile = Profile {
        display_name: Some(display_name.to_string()),
        ..Profile::default()
    };
    contacts::insert(db, line_user_id, Some(&profile)).await
}

/// Inserts an active scenario with inline steps.
///
/// Steps are given as `(message_content, delay_minutes)` pairs; kinds are
/// always `text` and step order follows list position.
pub async fn seed_scenario(
    db: &Database,
    name: &str,
    trigger_kind: TriggerKind,
    trigger_config: Option<serde_json::Value>,
    steps: &[(&str, i64)],
) -> Result<(Scenario, Vec<ScenarioStep>), NagareError> {
    let new = NewScenario {
        name: name.to_string(),
        description: None,
        trigger_kind,
        trigger_config: trigger_config.map(|v| v.to_string()),
        is_active: true,
        steps: steps
            .iter()
            .map(|(content, delay)| NewScenarioStep {
                message_kind: "text".to_string(),
                message_content: (*content).to_string(),
                delay_minutes: *delay,
                condition_json: None,
            })
            .collect(),
    };
    scenarios::create_with_steps(db, &new).await
}

/// Inserts a keyword-triggered scenario matching any of the given keywords.
pub async fn seed_keyword_scenario(
    db: &Database,
    name: &str,
    keywords: &[&str],
    steps: &[(&str, i64)],
) -> Result<(Scenario, Vec<ScenarioStep>), NagareError> {
    seed_scenario(
        db,
        name,
        TriggerKind::MessageKeyword,
        Some(serde_json::json!({ "keywords": keywords })),
        steps,
    )
    .await
}
