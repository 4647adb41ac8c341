// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query functions, one module per table family.

pub mod ai_logs;
pub mod attributes;
pub mod contacts;
pub mod deliveries;
pub mod knowledge;
pub mod messages;
pub mod scenarios;
pub mod tags;
