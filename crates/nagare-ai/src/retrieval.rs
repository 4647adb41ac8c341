// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyword retrieval over the knowledge base.
//!
//! Text-match retrieval, not embeddings: the user message is split into
//! keyword tokens and articles are matched by `LIKE` against content and
//! title. Short tokens carry no signal and are dropped.

use nagare_core::NagareError;
use nagare_storage::queries::knowledge;
use nagare_storage::{Database, KnowledgeArticle};

/// Splits a message into retrieval tokens.
///
/// Splits on whitespace and the Japanese delimiters 、。！？ and drops
/// tokens shorter than two characters.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || matches!(c, '、' | '。' | '！' | '？'))
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

/// Retrieves up to `limit` articles relevant to the query.
///
/// A query with no usable tokens falls back to the most recently updated
/// active articles, so the pipeline always has something to ground on when
/// the knowledge base is populated.
pub async fn retrieve(
    db: &Database,
    query: &str,
    limit: u32,
) -> Result<Vec<KnowledgeArticle>, NagareError> {
    let tokens = tokenize(query);
    if tokens.is_empty() {
        knowledge::recent_active(db, limit).await
    } else {
        knowledge::search(db, &tokens, query, limit).await
    }
}
