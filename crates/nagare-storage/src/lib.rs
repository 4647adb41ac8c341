// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for nagare.
//!
//! [`Database`] wraps one `tokio-rusqlite` connection with WAL enabled and
//! migrations applied on open. Query functions live under [`queries`] and
//! return the row types in [`models`]. All timestamps are ISO-8601 UTC
//! strings with a trailing `Z`; comparisons against "now" inside SQL use
//! `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')` so text ordering matches time
//! ordering.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::{map_tr_err, now_utc, utc_after_minutes, Database};
pub use models::*;
