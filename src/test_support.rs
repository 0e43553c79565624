//! Shared fixtures for unit tests / 测试辅助

use chrono::{Duration, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tempfile::TempDir;

use crate::db;
use crate::models::{ContentItem, IndexDocument, ItemType};
use crate::search::IndexStore;

/// Host database in a throwaway directory, migrated / 临时主数据库
pub async fn temp_content() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().unwrap();
    let options = SqliteConnectOptions::new()
        .filename(dir.path().join("content.db"))
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    (dir, pool)
}

/// Empty search database in a throwaway directory / 临时搜索数据库
pub async fn temp_index() -> (TempDir, IndexStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = IndexStore::open_standalone(&dir.path().join("search").join("search.db"))
        .await
        .unwrap();
    (dir, store)
}

/// Published item; later ids are published later / 测试条目
pub fn item(id: i64, item_type: ItemType, title: &str, body: &str) -> ContentItem {
    ContentItem {
        id,
        item_type,
        title: title.to_string(),
        body: body.to_string(),
        excerpt: String::new(),
        taxonomies: Vec::new(),
        metadata: BTreeMap::new(),
        sku: None,
        published_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(id),
    }
}

pub async fn insert_item(pool: &SqlitePool, item: &ContentItem) {
    sqlx::query(
        r#"
        INSERT INTO content_items (id, item_type, title, body, excerpt, sku, status, published_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, 'publish', ?, ?)
        "#,
    )
    .bind(item.id)
    .bind(item.item_type.as_str())
    .bind(&item.title)
    .bind(&item.body)
    .bind(&item.excerpt)
    .bind(&item.sku)
    .bind(item.published_at.timestamp())
    .bind(item.published_at.timestamp())
    .execute(pool)
    .await
    .unwrap();

    for label in &item.taxonomies {
        sqlx::query("INSERT OR IGNORE INTO content_terms (item_id, label) VALUES (?, ?)")
            .bind(item.id)
            .bind(label)
            .execute(pool)
            .await
            .unwrap();
    }
    for (key, value) in &item.metadata {
        sqlx::query("INSERT INTO content_meta (item_id, meta_key, meta_value) VALUES (?, ?, ?)")
            .bind(item.id)
            .bind(key)
            .bind(value)
            .execute(pool)
            .await
            .unwrap();
    }
}

/// Posts 1..=count sharing the word "catalog" / 批量插入测试条目
pub async fn seed_posts(pool: &SqlitePool, count: i64) {
    for id in 1..=count {
        let title = format!("Catalog entry {}", id);
        insert_item(pool, &item(id, ItemType::Post, &title, "Shared catalog body text")).await;
    }
}

/// Make an item fail to load until repaired / 使条目读取失败
pub async fn break_item(pool: &SqlitePool, id: i64) {
    sqlx::query("UPDATE content_items SET published_at = ? WHERE id = ?")
        .bind(i64::MAX)
        .bind(id)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn repair_item(pool: &SqlitePool, id: i64) {
    sqlx::query("UPDATE content_items SET published_at = ? WHERE id = ?")
        .bind(1_704_067_200_i64 + id * 86_400)
        .bind(id)
        .execute(pool)
        .await
        .unwrap();
}

/// Index document with only title and body set / 测试索引文档
pub fn document(id: i64, item_type: ItemType, title: &str, body: &str) -> IndexDocument {
    IndexDocument {
        item_id: id,
        item_type,
        title: title.to_string(),
        body: body.to_string(),
        excerpt: String::new(),
        taxonomy: String::new(),
        metadata: String::new(),
        sku: String::new(),
        weight: 1.0,
        published_at: 0,
    }
}
