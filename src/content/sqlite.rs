//! SQLite host content adapter / SQLite 内容源
//!
//! Reads the host tables created by `db::run_migrations`:
//! - content_items：条目主体（仅 status = 'publish' 的条目可被索引）
//! - content_terms：分类与标签
//! - content_meta：自定义字段

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

use super::{ContentSource, FallbackHit, FallbackOrder, FallbackQuery, FallbackSearch};
use crate::error::ContentError;
use crate::models::{plain_text, ContentItem, ItemType};
use crate::search::tokenizer::escape_like;

const PUBLISHED: &str = "publish";

/// Candidate rows read per round trip during a scan / 回退扫描每次读取的行数
const SCAN_CHUNK: i64 = 200;

/// Content source over the host database / 主机数据库内容源
#[derive(Clone)]
pub struct SqliteContentSource {
    db: SqlitePool,
}

impl SqliteContentSource {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Empty filter means every type
fn effective_types(types: &[ItemType]) -> Vec<ItemType> {
    if types.is_empty() {
        ItemType::ALL.to_vec()
    } else {
        types.to_vec()
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[async_trait]
impl ContentSource for SqliteContentSource {
    async fn count(&self, types: &[ItemType]) -> Result<u64, ContentError> {
        let types = effective_types(types);
        let sql = format!(
            "SELECT COUNT(*) FROM content_items WHERE status = ? AND item_type IN ({})",
            placeholders(types.len())
        );
        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(PUBLISHED);
        for item_type in &types {
            query = query.bind(item_type.as_str());
        }
        let count = query.fetch_one(&self.db).await?;
        Ok(count.max(0) as u64)
    }

    async fn list_ids(&self, types: &[ItemType], offset: u64, limit: u32) -> Result<Vec<i64>, ContentError> {
        let types = effective_types(types);
        let sql = format!(
            "SELECT id FROM content_items WHERE status = ? AND item_type IN ({}) ORDER BY id ASC LIMIT ? OFFSET ?",
            placeholders(types.len())
        );
        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(PUBLISHED);
        for item_type in &types {
            query = query.bind(item_type.as_str());
        }
        let ids = query
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.db)
            .await?;
        Ok(ids)
    }

    async fn fetch(&self, id: i64) -> Result<ContentItem, ContentError> {
        let row = sqlx::query(
            "SELECT id, item_type, title, body, excerpt, sku, status, published_at FROM content_items WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(ContentError::NotFound(id))?;

        // 非发布状态视为不存在
        let status: String = row.try_get("status")?;
        if status != PUBLISHED {
            return Err(ContentError::NotFound(id));
        }

        let raw_type: String = row.try_get("item_type")?;
        let item_type: ItemType = raw_type
            .parse()
            .map_err(|reason| ContentError::Invalid { id, reason })?;

        let published: i64 = row.try_get("published_at")?;
        let published_at = Utc
            .timestamp_opt(published, 0)
            .single()
            .ok_or_else(|| ContentError::Invalid {
                id,
                reason: format!("publish timestamp {} is out of range", published),
            })?;

        let taxonomies: Vec<String> =
            sqlx::query_scalar("SELECT label FROM content_terms WHERE item_id = ? ORDER BY label")
                .bind(id)
                .fetch_all(&self.db)
                .await?;

        let metadata: BTreeMap<String, String> =
            sqlx::query("SELECT meta_key, meta_value FROM content_meta WHERE item_id = ?")
                .bind(id)
                .fetch_all(&self.db)
                .await?
                .iter()
                .map(|row| -> Result<(String, String), sqlx::Error> {
                    Ok((row.try_get("meta_key")?, row.try_get("meta_value")?))
                })
                .collect::<Result<_, _>>()?;

        Ok(ContentItem {
            id,
            item_type,
            title: row.try_get("title")?,
            body: row.try_get("body")?,
            excerpt: row.try_get("excerpt")?,
            taxonomies,
            metadata,
            sku: row.try_get("sku")?,
            published_at,
        })
    }
}

#[async_trait]
impl FallbackSearch for SqliteContentSource {
    /// LIKE 子串扫描，不计算相关性 / Substring scan without relevance
    ///
    /// LIKE only narrows the candidates; every term must also appear in the
    /// markup-free text, so tags and attributes never produce a match.
    /// Paging is applied after that check.
    async fn scan(&self, query: &FallbackQuery) -> Result<Vec<FallbackHit>, ContentError> {
        if query.terms.is_empty() || query.limit == 0 {
            return Ok(Vec::new());
        }
        let types = effective_types(&query.types);
        let terms: Vec<String> = query.terms.iter().map(|term| term.to_lowercase()).collect();

        let term_clause =
            "(title LIKE ? ESCAPE '\\' OR excerpt LIKE ? ESCAPE '\\' OR body LIKE ? ESCAPE '\\')";
        let conditions = vec![term_clause; terms.len()].join(" AND ");
        let order = match query.order {
            FallbackOrder::Newest => "published_at DESC, id ASC",
            FallbackOrder::Oldest => "published_at ASC, id ASC",
            FallbackOrder::Title => "title COLLATE NOCASE ASC, id ASC",
        };
        let sql = format!(
            r#"
            SELECT id, item_type, title, excerpt, body FROM content_items
            WHERE status = ? AND item_type IN ({}) AND {}
            ORDER BY {}
            LIMIT ? OFFSET ?
        "#,
            placeholders(types.len()),
            conditions,
            order
        );
        let patterns: Vec<String> = terms
            .iter()
            .map(|term| format!("%{}%", escape_like(term)))
            .collect();

        let mut hits = Vec::new();
        let mut skipped = 0usize;
        let mut cursor: i64 = 0;
        loop {
            let mut q = sqlx::query(&sql).bind(PUBLISHED);
            for item_type in &types {
                q = q.bind(item_type.as_str());
            }
            for pattern in &patterns {
                q = q.bind(pattern.as_str()).bind(pattern.as_str()).bind(pattern.as_str());
            }
            let rows = q
                .bind(SCAN_CHUNK)
                .bind(cursor)
                .fetch_all(&self.db)
                .await?;
            let fetched = rows.len() as i64;

            for row in rows {
                let id: i64 = row.try_get("id")?;
                let raw_type: String = row.try_get("item_type")?;
                let Ok(item_type) = raw_type.parse::<ItemType>() else {
                    tracing::warn!("Skipping item {} with unknown type {:?}", id, raw_type);
                    continue;
                };
                let hit = FallbackHit {
                    id,
                    item_type,
                    title: row.try_get("title")?,
                    excerpt: row.try_get("excerpt")?,
                    body: row.try_get("body")?,
                };
                if !matches_plain_text(&hit, &terms) {
                    continue;
                }
                if skipped < query.offset {
                    skipped += 1;
                    continue;
                }
                hits.push(hit);
                if hits.len() >= query.limit {
                    return Ok(hits);
                }
            }

            if fetched < SCAN_CHUNK {
                break;
            }
            cursor += fetched;
        }
        Ok(hits)
    }
}

/// Every term occurs in the title, excerpt or body once markup is removed
fn matches_plain_text(hit: &FallbackHit, terms: &[String]) -> bool {
    let fields = [
        plain_text(&hit.title).to_lowercase(),
        plain_text(&hit.excerpt).to_lowercase(),
        plain_text(&hit.body).to_lowercase(),
    ];
    terms
        .iter()
        .all(|term| fields.iter().any(|field| field.contains(term.as_str())))
}
