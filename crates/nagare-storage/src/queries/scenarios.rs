// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scenario and step persistence.

use nagare_core::types::{ScenarioId, ScenarioStepId, TriggerKind};
use nagare_core::NagareError;
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::models::{parse_enum, NewScenario, Scenario, ScenarioStep, ScenarioSummary};

const SCENARIO_COLUMNS: &str =
    "id, name, description, trigger_kind, trigger_config, is_active, created_at, updated_at";
const STEP_COLUMNS: &str = "id, scenario_id, step_order, message_kind, message_content, \
                            delay_minutes, condition_json, created_at";

fn row_to_scenario(row: &rusqlite::Row<'_>) -> Result<Scenario, rusqlite::Error> {
    Ok(Scenario {
        id: ScenarioId::from(row.get::<_, String>(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        trigger_kind: parse_enum(3, row.get::<_, String>(3)?)?,
        trigger_config: row.get(4)?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn row_to_step(row: &rusqlite::Row<'_>) -> Result<ScenarioStep, rusqlite::Error> {
    Ok(ScenarioStep {
        id: ScenarioStepId::from(row.get::<_, String>(0)?),
        scenario_id: ScenarioId::from(row.get::<_, String>(1)?),
        step_order: row.get(2)?,
        message_kind: row.get(3)?,
        message_content: row.get(4)?,
        delay_minutes: row.get(5)?,
        condition_json: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Create a scenario together with its ordered steps in one transaction.
/// Steps receive `step_order` 1..N in the order given.
pub async fn create_with_steps(
    db: &Database,
    new: &NewScenario,
) -> Result<(Scenario, Vec<ScenarioStep>), NagareError> {
    let id = ScenarioId::new();
    let new = new.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO scenarios (id, name, description, trigger_kind, trigger_config, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.as_str(),
                    new.name,
                    new.description,
                    new.trigger_kind.to_string(),
                    new.trigger_config,
                    new.is_active,
                ],
            )?;
            for (index, step) in new.steps.iter().enumerate() {
                let step_id = ScenarioStepId::new();
                tx.execute(
                    "INSERT INTO scenario_steps
                     (id, scenario_id, step_order, message_kind, message_content, delay_minutes, condition_json)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        step_id.as_str(),
                        id.as_str(),
                        (index + 1) as i64,
                        step.message_kind,
                        step.message_content,
                        step.delay_minutes,
                        step.condition_json,
                    ],
                )?;
            }
            tx.commit()?;

            let scenario = conn.query_row(
                &format!("SELECT {SCENARIO_COLUMNS} FROM scenarios WHERE id = ?1"),
                params![id.as_str()],
                row_to_scenario,
            )?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {STEP_COLUMNS} FROM scenario_steps WHERE scenario_id = ?1 ORDER BY step_order"
            ))?;
            let steps = stmt
                .query_map(params![id.as_str()], row_to_step)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok((scenario, steps))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All scenarios with their step counts, newest first.
pub async fn list_with_step_counts(db: &Database) -> Result<Vec<ScenarioSummary>, NagareError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.name, s.description, s.trigger_kind, s.trigger_config,
                        s.is_active, s.created_at, s.updated_at, COUNT(st.id)
                 FROM scenarios s
                 LEFT JOIN scenario_steps st ON st.scenario_id = s.id
                 GROUP BY s.id
                 ORDER BY s.created_at DESC, s.rowid DESC",
            )?;
            let summaries = stmt
                .query_map([], |row| {
                    Ok(ScenarioSummary {
                        scenario: row_to_scenario(row)?,
                        step_count: row.get(8)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(summaries)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// A scenario and its steps ordered by `step_order`, or `None` when absent.
pub async fn get_with_steps(
    db: &Database,
    id: &ScenarioId,
) -> Result<Option<(Scenario, Vec<ScenarioStep>)>, NagareError> {
    let id = id.clone();
    db.connection()
        .call(move |conn| {
            let scenario = conn
                .query_row(
                    &format!("SELECT {SCENARIO_COLUMNS} FROM scenarios WHERE id = ?1"),
                    params![id.as_str()],
                    row_to_scenario,
                )
                .optional()?;
            let Some(scenario) = scenario else {
                return Ok(None);
            };
            let mut stmt = conn.prepare(&format!(
                "SELECT {STEP_COLUMNS} FROM scenario_steps WHERE scenario_id = ?1 ORDER BY step_order"
            ))?;
            let steps = stmt
                .query_map(params![id.as_str()], row_to_step)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some((scenario, steps)))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Active scenarios with the given trigger kind.
pub async fn active_by_kind(
    db: &Database,
    kind: TriggerKind,
) -> Result<Vec<Scenario>, NagareError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SCENARIO_COLUMNS} FROM scenarios WHERE trigger_kind = ?1 AND is_active = 1"
            ))?;
            let scenarios = stmt
                .query_map(params![kind.to_string()], row_to_scenario)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(scenarios)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Steps of one scenario ordered by `step_order`.
pub async fn steps_ordered(
    db: &Database,
    scenario_id: &ScenarioId,
) -> Result<Vec<ScenarioStep>, NagareError> {
    let scenario_id = scenario_id.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {STEP_COLUMNS} FROM scenario_steps WHERE scenario_id = ?1 ORDER BY step_order"
            ))?;
            let steps = stmt
                .query_map(params![scenario_id.as_str()], row_to_step)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(steps)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
