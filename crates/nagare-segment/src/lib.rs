// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Audience segmentation: typed conditions compiled to a single SQLite
//! query, plus preview, broadcast send, and delivery history on top of it.

pub mod broadcast;
pub mod builder;
pub mod conditions;

pub use broadcast::{
    BroadcastHistoryPage, BroadcastOutcome, MatchedContact, SegmentPreview, PREVIEW_CAP,
};
pub use conditions::{ConditionKind, ConditionOperator, SegmentCondition};
