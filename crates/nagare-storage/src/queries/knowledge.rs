// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Knowledge article storage and retrieval.

use nagare_core::types::KnowledgeId;
use nagare_core::NagareError;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};

use crate::database::Database;
use crate::models::KnowledgeArticle;

const ARTICLE_COLUMNS: &str = "id, title, content, category, is_active, created_at, updated_at";

fn row_to_article(row: &rusqlite::Row<'_>) -> Result<KnowledgeArticle, rusqlite::Error> {
    Ok(KnowledgeArticle {
        id: KnowledgeId::from(row.get::<_, String>(0)?),
        title: row.get(1)?,
        content: row.get(2)?,
        category: row.get(3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Store an article.
pub async fn insert(
    db: &Database,
    title: &str,
    content: &str,
    category: Option<&str>,
    is_active: bool,
) -> Result<KnowledgeArticle, NagareError> {
    let id = KnowledgeId::new();
    let title = title.to_string();
    let content = content.to_string();
    let category = category.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO knowledge_articles (id, title, content, category, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id.as_str(), title, content, category, is_active],
            )?;
            let article = conn.query_row(
                &format!("SELECT {ARTICLE_COLUMNS} FROM knowledge_articles WHERE id = ?1"),
                params![id.as_str()],
                row_to_article,
            )?;
            Ok(article)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Active articles whose content matches any token, or whose title matches
/// the query prefix (first 50 chars). Most recently updated first.
pub async fn search(
    db: &Database,
    tokens: &[String],
    query: &str,
    limit: u32,
) -> Result<Vec<KnowledgeArticle>, NagareError> {
    let prefix: String = query.chars().take(50).collect();
    let mut predicates: Vec<&str> = tokens.iter().map(|_| "content LIKE ?").collect();
    predicates.push("title LIKE ?");
    let sql = format!(
        "SELECT {ARTICLE_COLUMNS} FROM knowledge_articles
         WHERE is_active = 1 AND ({})
         ORDER BY updated_at DESC, rowid DESC
         LIMIT ?",
        predicates.join(" OR ")
    );
    let mut binds: Vec<Value> = tokens.iter().map(|t| Value::from(format!("%{t}%"))).collect();
    binds.push(Value::from(format!("%{prefix}%")));
    binds.push(Value::from(i64::from(limit)));

    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let articles = stmt
                .query_map(params_from_iter(binds), row_to_article)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(articles)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Most recently updated active articles, for queries with no usable tokens.
pub async fn recent_active(db: &Database, limit: u32) -> Result<Vec<KnowledgeArticle>, NagareError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ARTICLE_COLUMNS} FROM knowledge_articles
                 WHERE is_active = 1
                 ORDER BY updated_at DESC, rowid DESC
                 LIMIT ?1"
            ))?;
            let articles = stmt
                .query_map(params![limit], row_to_article)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(articles)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
