// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed segment conditions.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// What a condition inspects.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    /// Tag name on the contact.
    Tag,
    /// Custom key/value attribute on the contact.
    Attribute,
    /// Contact status.
    Status,
    /// Days since the contact's last inbound message.
    LastMessageDays,
}

/// Comparison applied by a condition. Each kind supports a subset;
/// unsupported pairs are rejected at build time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConditionOperator {
    Eq,
    Neq,
    Contains,
    Gt,
    Lt,
}

/// One filter in a segment definition. Conditions are AND-combined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentCondition {
    #[serde(rename = "type")]
    pub kind: ConditionKind,
    pub operator: ConditionOperator,
    /// Attribute key; meaningful only for `attribute` conditions.
    #[serde(default)]
    pub field: Option<String>,
    pub value: String,
}

impl SegmentCondition {
    pub fn tag(operator: ConditionOperator, value: impl Into<String>) -> Self {
        Self {
            kind: ConditionKind::Tag,
            operator,
            field: None,
            value: value.into(),
        }
    }

    pub fn attribute(
        operator: ConditionOperator,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            kind: ConditionKind::Attribute,
            operator,
            field: Some(field.into()),
            value: value.into(),
        }
    }

    pub fn status(operator: ConditionOperator, value: impl Into<String>) -> Self {
        Self {
            kind: ConditionKind::Status,
            operator,
            field: None,
            value: value.into(),
        }
    }

    pub fn last_message_days(operator: ConditionOperator, days: impl Into<String>) -> Self {
        Self {
            kind: ConditionKind::LastMessageDays,
            operator,
            field: None,
            value: days.into(),
        }
    }
}
