use anyhow::Result;
use sqlx::SqlitePool;

/// Run host database migrations / 运行主数据库迁移
///
/// The host owns these tables; they are created here so a standalone
/// deployment (and the test suite) has a corpus to read from.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS content_items (
            id INTEGER PRIMARY KEY,
            item_type TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            body TEXT NOT NULL DEFAULT '',
            excerpt TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'publish',
            published_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS content_terms (
            item_id INTEGER NOT NULL,
            taxonomy TEXT NOT NULL DEFAULT 'category',
            label TEXT NOT NULL,
            PRIMARY KEY(item_id, taxonomy, label)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS content_meta (
            item_id INTEGER NOT NULL,
            meta_key TEXT NOT NULL,
            meta_value TEXT NOT NULL,
            PRIMARY KEY(item_id, meta_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_content_items_listing ON content_items(status, item_type, id)")
        .execute(pool)
        .await?;

    // 数据库迁移：添加 sku 字段（如果不存在）
    let columns: Vec<(i32, String, String, i32, Option<String>, i32)> =
        sqlx::query_as("PRAGMA table_info(content_items)")
            .fetch_all(pool)
            .await?;

    let has_sku = columns.iter().any(|(_, name, _, _, _, _)| name == "sku");
    if !has_sku {
        sqlx::query("ALTER TABLE content_items ADD COLUMN sku TEXT")
            .execute(pool)
            .await?;
        tracing::info!("Migration: Added sku column to content_items");
    }

    tracing::info!("Database migration completed");
    Ok(())
}
