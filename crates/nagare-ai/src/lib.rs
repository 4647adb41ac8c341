// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI reply pipeline: keyword retrieval over the knowledge base, provider
//! call with conversation history, confidence scoring, and operator
//! escalation.

pub mod pipeline;
pub mod retrieval;

pub use pipeline::{AiReply, AiReplyPipeline};
pub use retrieval::tokenize;
