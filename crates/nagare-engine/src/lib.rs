// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Marketing automation engine: webhook event ingestion, trigger
//! evaluation, scenario execution, and the scheduled delivery poller.

pub mod ingest;
pub mod poller;
pub mod scenario;
pub mod triggers;

pub use ingest::{ReplyStrategy, WebhookIngestor};
pub use poller::{DeliveryPoller, PollOutcome};
pub use scenario::ScenarioEngine;
