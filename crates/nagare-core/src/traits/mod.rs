// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for Nagare's external collaborators.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod platform;
pub mod provider;

pub use adapter::PluginAdapter;
pub use platform::PlatformAdapter;
pub use provider::ProviderAdapter;
