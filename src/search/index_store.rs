//! 索引存储 / Index storage
//!
//! 存储方案：
//! - search_entries：每个条目一行，保存派生字段与静态权重
//! - search_fts：FTS5 全文表，rowid = item_id，按字段分列以便分别加权
//! - search_vocab：fts5vocab 词表，用于前缀联想
//!
//! The search database is a standalone SQLite file in WAL mode, so long
//! index builds never contend with the host database.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::time::Duration;

use super::suggest::TermLookup;
use crate::config::FieldWeights;
use crate::error::IndexError;
use crate::models::{IndexDocument, IndexEntry, ItemType};

/// Seconds in the 30-day recency half-life / 新近度衰减周期（秒）
const RECENCY_PERIOD_SECS: f64 = 30.0 * 86_400.0;

/// 索引命中 / A ranked index hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexHit {
    pub item_id: i64,
    pub item_type: ItemType,
    pub title: String,
    pub excerpt: String,
    pub body: String,
    pub score: f64,
}

/// Ranked lookup parameters / 排序查询参数
#[derive(Debug, Clone)]
pub struct IndexQuery<'a> {
    /// FTS5 MATCH expression built from quoted terms
    pub match_expr: &'a str,
    /// Empty means every type
    pub types: &'a [ItemType],
    pub field_weights: FieldWeights,
    pub recency_boost: f64,
    /// Reference time for the recency boost (Unix seconds)
    pub now: i64,
    pub limit: usize,
    pub offset: usize,
}

/// FTS5 backed index storage / 索引存储
#[derive(Clone)]
pub struct IndexStore {
    db: Pool<Sqlite>,
}

impl IndexStore {
    /// 打开独立的搜索数据库（WAL 模式）/ Open the standalone search database
    pub async fn open_standalone(db_path: &Path) -> Result<Self, IndexError> {
        // 确保目录存在
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .synchronous(SqliteSynchronous::Normal);

        let db = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        tracing::info!("Search database opened: {:?} (WAL mode)", db_path);
        Ok(Self { db })
    }

    /// 使用现有数据库连接池
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// Connection pool shared with the build state store
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.db
    }

    /// 关闭数据库连接池 / Close database connection pool
    pub async fn close(&self) {
        self.db.close().await;
    }

    /// 创建索引表，已存在时保留数据 / Create index tables if missing
    pub async fn create_tables(&self) -> Result<(), IndexError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS search_entries (
                item_id INTEGER PRIMARY KEY,
                item_type TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                excerpt TEXT NOT NULL,
                taxonomy TEXT NOT NULL,
                metadata TEXT NOT NULL,
                sku TEXT NOT NULL,
                weight REAL NOT NULL,
                published_at INTEGER NOT NULL,
                indexed_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_search_entries_type ON search_entries(item_type)")
            .execute(&self.db)
            .await?;

        // 列顺序决定 bm25() 的权重参数顺序
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE IF NOT EXISTS search_fts USING fts5(
                title, excerpt, body, taxonomy, metadata, sku,
                tokenize = 'unicode61 remove_diacritics 0'
            )
        "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query("CREATE VIRTUAL TABLE IF NOT EXISTS search_vocab USING fts5vocab('search_fts', 'col')")
            .execute(&self.db)
            .await?;

        tracing::debug!("Search index tables ready");
        Ok(())
    }

    /// 删除全部索引表 / Drop every index table
    pub async fn drop_tables(&self) -> Result<(), IndexError> {
        for table in ["search_vocab", "search_fts", "search_entries"] {
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
                .execute(&self.db)
                .await?;
        }
        tracing::info!("Search index tables dropped");
        Ok(())
    }

    /// 索引表是否存在 / Whether the index tables exist
    pub async fn exists(&self) -> Result<bool, IndexError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE name IN ('search_entries', 'search_fts', 'search_vocab')",
        )
        .fetch_one(&self.db)
        .await?;
        Ok(count == 3)
    }

    /// Exists and holds at least one entry / 索引可用（存在且非空）
    pub async fn is_usable(&self) -> Result<bool, IndexError> {
        if !self.exists().await? {
            return Ok(false);
        }
        let any: Option<i64> = sqlx::query_scalar("SELECT item_id FROM search_entries LIMIT 1")
            .fetch_optional(&self.db)
            .await?;
        Ok(any.is_some())
    }

    /// 条目数量 / Number of entries
    pub async fn count(&self) -> Result<i64, IndexError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM search_entries")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    /// 写入或覆盖一个条目 / Insert or overwrite one entry
    ///
    /// The entry row and its full-text row are replaced in one transaction,
    /// so a reader never sees one without the other.
    pub async fn upsert(&self, document: &IndexDocument, indexed_at: i64) -> Result<(), IndexError> {
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM search_fts WHERE rowid = ?")
            .bind(document.item_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO search_fts (rowid, title, excerpt, body, taxonomy, metadata, sku) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(document.item_id)
        .bind(&document.title)
        .bind(&document.excerpt)
        .bind(&document.body)
        .bind(&document.taxonomy)
        .bind(&document.metadata)
        .bind(&document.sku)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO search_entries
                (item_id, item_type, title, body, excerpt, taxonomy, metadata, sku, weight, published_at, indexed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(document.item_id)
        .bind(document.item_type.as_str())
        .bind(&document.title)
        .bind(&document.body)
        .bind(&document.excerpt)
        .bind(&document.taxonomy)
        .bind(&document.metadata)
        .bind(&document.sku)
        .bind(document.weight)
        .bind(document.published_at)
        .bind(indexed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// 读取一个条目 / Load one entry
    pub async fn get(&self, item_id: i64) -> Result<Option<IndexEntry>, IndexError> {
        let row = sqlx::query(
            r#"
            SELECT item_id, item_type, title, body, excerpt, taxonomy, metadata, sku, weight, published_at, indexed_at
            FROM search_entries WHERE item_id = ?
        "#,
        )
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let document = IndexDocument {
            item_id: row.try_get("item_id")?,
            item_type: parse_type(&row.try_get::<String, _>("item_type")?)?,
            title: row.try_get("title")?,
            body: row.try_get("body")?,
            excerpt: row.try_get("excerpt")?,
            taxonomy: row.try_get("taxonomy")?,
            metadata: row.try_get("metadata")?,
            sku: row.try_get("sku")?,
            weight: row.try_get("weight")?,
            published_at: row.try_get("published_at")?,
        };
        Ok(Some(IndexEntry {
            document,
            indexed_at: row.try_get("indexed_at")?,
        }))
    }

    /// 删除一个条目，返回是否存在 / Delete one entry
    pub async fn delete(&self, item_id: i64) -> Result<bool, IndexError> {
        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM search_fts WHERE rowid = ?")
            .bind(item_id)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM search_entries WHERE item_id = ?")
            .bind(item_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(removed > 0)
    }

    /// 相关性排序查询 / Ranked full-text lookup
    ///
    /// Score = field-weighted bm25 × entry weight × recency factor, higher is
    /// better. Ties are broken by ascending item id so paging is stable.
    pub async fn search(&self, query: &IndexQuery<'_>) -> Result<Vec<IndexHit>, IndexError> {
        let type_filter = if query.types.is_empty() {
            String::new()
        } else {
            let placeholders = vec!["?"; query.types.len()].join(", ");
            format!("AND e.item_type IN ({})", placeholders)
        };

        let sql = format!(
            r#"
            SELECT e.item_id, e.item_type, e.title, e.excerpt, e.body,
                (-bm25(search_fts, ?, ?, ?, ?, ?, ?)) * e.weight
                    * (1.0 + ? / (1.0 + MAX(0, ? - e.published_at) / ?)) AS score
            FROM search_fts
            JOIN search_entries e ON e.item_id = search_fts.rowid
            WHERE search_fts MATCH ? {}
            ORDER BY score DESC, e.item_id ASC
            LIMIT ? OFFSET ?
        "#,
            type_filter
        );

        let w = &query.field_weights;
        let mut q = sqlx::query(&sql)
            .bind(w.title)
            .bind(w.excerpt)
            .bind(w.body)
            .bind(w.taxonomy)
            .bind(w.metadata)
            .bind(w.sku)
            .bind(query.recency_boost)
            .bind(query.now)
            .bind(RECENCY_PERIOD_SECS)
            .bind(query.match_expr);
        for item_type in query.types {
            q = q.bind(item_type.as_str());
        }
        // 超出 i64 的偏移量必然越过末尾
        let rows = q
            .bind(i64::try_from(query.limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(query.offset).unwrap_or(i64::MAX))
            .fetch_all(&self.db)
            .await?;

        rows.iter()
            .map(|row| -> Result<IndexHit, IndexError> {
                Ok(IndexHit {
                    item_id: row.try_get("item_id")?,
                    item_type: parse_type(&row.try_get::<String, _>("item_type")?)?,
                    title: row.try_get("title")?,
                    excerpt: row.try_get("excerpt")?,
                    body: row.try_get("body")?,
                    score: row.try_get("score")?,
                })
            })
            .collect()
    }
}

fn parse_type(value: &str) -> Result<ItemType, IndexError> {
    value.parse().map_err(IndexError::Corrupted)
}

#[async_trait]
impl TermLookup for IndexStore {
    async fn prefix_terms(
        &self,
        prefix: &str,
        weights: &FieldWeights,
        limit: usize,
    ) -> Result<Vec<String>, IndexError> {
        if !self.exists().await? {
            return Ok(Vec::new());
        }

        let upper = format!("{}\u{10FFFF}", prefix);
        let terms: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT term FROM search_vocab
            WHERE term >= ? AND term < ?
            GROUP BY term
            ORDER BY SUM(cnt * CASE col
                WHEN 'title' THEN ?
                WHEN 'excerpt' THEN ?
                WHEN 'body' THEN ?
                WHEN 'taxonomy' THEN ?
                WHEN 'metadata' THEN ?
                WHEN 'sku' THEN ?
                ELSE 0 END) DESC, term ASC
            LIMIT ?
        "#,
        )
        .bind(prefix)
        .bind(&upper)
        .bind(weights.title)
        .bind(weights.excerpt)
        .bind(weights.body)
        .bind(weights.taxonomy)
        .bind(weights.metadata)
        .bind(weights.sku)
        .bind(limit as i64)
        .fetch_all(&self.db)
        .await?;
        Ok(terms)
    }
}
