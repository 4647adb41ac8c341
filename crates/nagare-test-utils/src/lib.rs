// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Nagare integration tests.
//!
//! Provides mock adapters and database fixtures for fast, deterministic,
//! CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockPlatform`] - Mock messaging platform with send capture and scripted failures
//! - [`MockProvider`] - Mock LLM provider with pre-configured replies
//! - [`fixtures`] - Temp-database and seed-row helpers

pub mod fixtures;
pub mod mock_platform;
pub mod mock_provider;

pub use fixtures::{open_test_db, seed_contact, seed_keyword_scenario, seed_scenario, TestDb};
pub use mock_platform::MockPlatform;
pub use mock_provider::MockProvider;
