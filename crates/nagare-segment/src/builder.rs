// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compiles segment conditions into one DISTINCT contact query.
//!
//! Every user-supplied value is bound, including the day count inside the
//! `last_message_days` datetime modifier. Unsupported kind/operator pairs
//! and unparseable numeric values are build errors, not silently dropped
//! conditions.

use nagare_core::NagareError;
use rusqlite::types::Value;

use crate::conditions::{ConditionKind, ConditionOperator, SegmentCondition};

/// Columns the segment query selects; superset of what preview and send need.
pub const SELECT_COLUMNS: &str = "c.id, c.line_user_id, c.display_name, c.picture_url";

/// Build the SQL and bound parameters for the given conditions.
///
/// An empty condition list matches every contact; callers decide whether
/// that is acceptable.
pub fn build(conditions: &[SegmentCondition]) -> Result<(String, Vec<Value>), NagareError> {
    let mut joins: Vec<String> = Vec::new();
    let mut wheres: Vec<String> = Vec::new();
    let mut binds: Vec<Value> = Vec::new();
    let mut tag_idx = 0usize;
    let mut attr_idx = 0usize;

    for condition in conditions {
        match condition.kind {
            ConditionKind::Tag => {
                let ct = format!("ct{tag_idx}");
                let t = format!("t{tag_idx}");
                tag_idx += 1;
                joins.push(format!(
                    "INNER JOIN contact_tags {ct} ON c.id = {ct}.contact_id"
                ));
                joins.push(format!("INNER JOIN tags {t} ON {ct}.tag_id = {t}.id"));
                match condition.operator {
                    ConditionOperator::Eq => {
                        wheres.push(format!("{t}.name = ?"));
                        binds.push(Value::from(condition.value.clone()));
                    }
                    ConditionOperator::Neq => {
                        // Inner join: matches contacts holding at least one
                        // tag with a different name, not untagged contacts.
                        wheres.push(format!("{t}.name != ?"));
                        binds.push(Value::from(condition.value.clone()));
                    }
                    ConditionOperator::Contains => {
                        wheres.push(format!("{t}.name LIKE ?"));
                        binds.push(Value::from(format!("%{}%", condition.value)));
                    }
                    other => return Err(unsupported(condition.kind, other)),
                }
            }
            ConditionKind::Attribute => {
                let field = condition
                    .field
                    .as_deref()
                    .filter(|f| !f.is_empty())
                    .ok_or_else(|| {
                        NagareError::InvalidCondition(
                            "attribute condition requires a field".to_string(),
                        )
                    })?;
                let ca = format!("ca{attr_idx}");
                attr_idx += 1;
                joins.push(format!(
                    "INNER JOIN contact_attributes {ca} ON c.id = {ca}.contact_id AND {ca}.key = ?"
                ));
                binds.push(Value::from(field.to_string()));
                match condition.operator {
                    ConditionOperator::Eq => {
                        wheres.push(format!("{ca}.value = ?"));
                        binds.push(Value::from(condition.value.clone()));
                    }
                    ConditionOperator::Neq => {
                        wheres.push(format!("{ca}.value != ?"));
                        binds.push(Value::from(condition.value.clone()));
                    }
                    ConditionOperator::Contains => {
                        wheres.push(format!("{ca}.value LIKE ?"));
                        binds.push(Value::from(format!("%{}%", condition.value)));
                    }
                    ConditionOperator::Gt => {
                        wheres.push(format!("CAST({ca}.value AS REAL) > ?"));
                        binds.push(Value::from(numeric_value(condition)?));
                    }
                    ConditionOperator::Lt => {
                        wheres.push(format!("CAST({ca}.value AS REAL) < ?"));
                        binds.push(Value::from(numeric_value(condition)?));
                    }
                }
            }
            ConditionKind::Status => match condition.operator {
                ConditionOperator::Eq => {
                    wheres.push("c.status = ?".to_string());
                    binds.push(Value::from(condition.value.clone()));
                }
                ConditionOperator::Neq => {
                    wheres.push("c.status != ?".to_string());
                    binds.push(Value::from(condition.value.clone()));
                }
                other => return Err(unsupported(condition.kind, other)),
            },
            ConditionKind::LastMessageDays => {
                let days = day_count(condition)?;
                match condition.operator {
                    ConditionOperator::Lt => {
                        wheres.push(
                            "c.id IN (SELECT contact_id FROM messages \
                             WHERE direction = 'inbound' \
                             AND sent_at >= datetime('now', '-' || ? || ' days'))"
                                .to_string(),
                        );
                        binds.push(Value::from(days));
                    }
                    ConditionOperator::Gt => {
                        wheres.push(
                            "c.id NOT IN (SELECT contact_id FROM messages \
                             WHERE direction = 'inbound' \
                             AND sent_at >= datetime('now', '-' || ? || ' days'))"
                                .to_string(),
                        );
                        binds.push(Value::from(days));
                    }
                    ConditionOperator::Eq => {
                        wheres.push(
                            "c.id IN (SELECT contact_id FROM messages \
                             WHERE direction = 'inbound' \
                             GROUP BY contact_id \
                             HAVING CAST(julianday('now') - julianday(MAX(sent_at)) AS INTEGER) = ?)"
                                .to_string(),
                        );
                        binds.push(Value::from(days));
                    }
                    other => return Err(unsupported(condition.kind, other)),
                }
            }
        }
    }

    let mut sql = format!("SELECT DISTINCT {SELECT_COLUMNS} FROM contacts c");
    for join in &joins {
        sql.push(' ');
        sql.push_str(join);
    }
    if !wheres.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&wheres.join(" AND "));
    }
    Ok((sql, binds))
}

fn unsupported(kind: ConditionKind, operator: ConditionOperator) -> NagareError {
    NagareError::InvalidCondition(format!(
        "operator {operator} is not supported for {kind} conditions"
    ))
}

fn numeric_value(condition: &SegmentCondition) -> Result<f64, NagareError> {
    condition
        .value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| {
            NagareError::InvalidCondition(format!(
                "attribute {} requires a numeric value, got {:?}",
                condition.operator, condition.value
            ))
        })
}

fn day_count(condition: &SegmentCondition) -> Result<i64, NagareError> {
    condition
        .value
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|days| *days >= 0)
        .ok_or_else(|| {
            NagareError::InvalidCondition(format!(
                "last_message_days requires a whole number of days, got {:?}",
                condition.value
            ))
        })
}
