// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Nagare delivery engine.
//!
//! Serves the public LINE webhook endpoint and the bearer-authenticated
//! admin API for scenarios, deliveries, segment broadcasts, and
//! escalations.

pub mod auth;
pub mod handlers;
pub mod server;
pub mod webhook;

pub use auth::AuthConfig;
pub use server::{build_router, start_server, AppState};
