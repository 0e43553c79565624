//! Durable build state / 索引构建状态
//!
//! A single row (`id = 1`) in the search database holds the build status,
//! progress counters, result log, error ledger and the re-entrancy lock.
//! Every transition is one conditional `UPDATE`, so concurrent requests
//! observe either the old state or the new one.

use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};
use std::fmt;
use std::str::FromStr;

use super::ledger::ErrorLedger;
use crate::error::BuildError;

/// Build status / 构建状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Empty,
    Creating,
    Pausing,
    Paused,
    Created,
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Empty => "empty",
            BuildStatus::Creating => "creating",
            BuildStatus::Pausing => "pausing",
            BuildStatus::Paused => "paused",
            BuildStatus::Created => "created",
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildStatus {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "empty" => Ok(BuildStatus::Empty),
            "creating" => Ok(BuildStatus::Creating),
            "pausing" => Ok(BuildStatus::Pausing),
            "paused" => Ok(BuildStatus::Paused),
            "created" => Ok(BuildStatus::Created),
            other => Err(BuildError::Corrupted(format!("unknown build status {:?}", other))),
        }
    }
}

/// Snapshot of the build state row / 构建状态快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildState {
    pub status: BuildStatus,
    /// Items attempted so far, only reset by a fresh start or delete
    pub offset: u64,
    pub batch_size: u32,
    /// Items indexed successfully in the current build
    pub indexed: u64,
    /// Corpus size seen by the latest batch
    pub total: u64,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub result_log: Vec<String>,
    pub errors: ErrorLedger,
}

impl BuildState {
    /// round(indexed / total * 100), capped at 100 / 完成百分比
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return if self.status == BuildStatus::Created { 100 } else { 0 };
        }
        let percent = (self.indexed as f64 / self.total as f64 * 100.0).round();
        percent.min(100.0) as u32
    }

    /// Seconds since the build started, frozen once it completes / 已用时间
    pub fn elapsed_secs(&self, now: i64) -> i64 {
        match self.start_time {
            Some(start) => (self.end_time.unwrap_or(now) - start).max(0),
            None => 0,
        }
    }
}

/// Outcome of one batch, written together with the lock release / 批次提交
#[derive(Debug, Clone)]
pub struct BatchCommit<'a> {
    pub offset: u64,
    pub indexed_delta: u64,
    pub total: u64,
    pub result_log: &'a [String],
    pub errors: &'a ErrorLedger,
    /// Offset reached the corpus size
    pub done: bool,
    pub now: i64,
}

/// Build state persistence / 构建状态存储
#[derive(Clone)]
pub struct BuildStateStore {
    db: Pool<Sqlite>,
}

impl BuildStateStore {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// 初始化状态表 / Create the state row if missing
    pub async fn init(&self, batch_size: u32) -> Result<(), BuildError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS search_build_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                status TEXT NOT NULL,
                next_offset INTEGER NOT NULL DEFAULT 0,
                batch_size INTEGER NOT NULL,
                indexed_count INTEGER NOT NULL DEFAULT 0,
                total_count INTEGER NOT NULL DEFAULT 0,
                start_time INTEGER,
                end_time INTEGER,
                result_log TEXT NOT NULL DEFAULT '[]',
                errors TEXT NOT NULL DEFAULT '{}',
                lock_owner TEXT,
                lock_acquired_at INTEGER
            )
        "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query("INSERT OR IGNORE INTO search_build_state (id, status, batch_size) VALUES (1, 'empty', ?)")
            .bind(batch_size as i64)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// 读取当前状态 / Load the current state
    pub async fn load(&self) -> Result<BuildState, BuildError> {
        let row = sqlx::query(
            r#"
            SELECT status, next_offset, batch_size, indexed_count, total_count, start_time, end_time, result_log, errors
            FROM search_build_state WHERE id = 1
        "#,
        )
        .fetch_one(&self.db)
        .await?;

        let result_log: String = row.try_get("result_log")?;
        let errors: String = row.try_get("errors")?;
        Ok(BuildState {
            status: row.try_get::<String, _>("status")?.parse()?,
            offset: row.try_get::<i64, _>("next_offset")?.max(0) as u64,
            batch_size: row.try_get::<i64, _>("batch_size")?.max(1) as u32,
            indexed: row.try_get::<i64, _>("indexed_count")?.max(0) as u64,
            total: row.try_get::<i64, _>("total_count")?.max(0) as u64,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            result_log: serde_json::from_str(&result_log)?,
            errors: serde_json::from_str(&errors)?,
        })
    }

    /// Take the build lock unless a live holder exists / 获取构建锁
    ///
    /// A lock acquired at or before `stale_before` is treated as abandoned.
    pub async fn try_lock(&self, owner: &str, now: i64, stale_before: i64) -> Result<bool, BuildError> {
        let acquired = sqlx::query(
            r#"
            UPDATE search_build_state SET lock_owner = ?, lock_acquired_at = ?
            WHERE id = 1 AND (lock_owner IS NULL OR lock_acquired_at <= ?)
        "#,
        )
        .bind(owner)
        .bind(now)
        .bind(stale_before)
        .execute(&self.db)
        .await?
        .rows_affected();
        Ok(acquired == 1)
    }

    /// 释放构建锁 / Release the lock if still held by `owner`
    pub async fn unlock(&self, owner: &str) -> Result<(), BuildError> {
        sqlx::query(
            "UPDATE search_build_state SET lock_owner = NULL, lock_acquired_at = NULL WHERE id = 1 AND lock_owner = ?",
        )
        .bind(owner)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Fresh start: zero progress, empty log and ledger / 全新构建
    pub async fn begin_fresh(&self, owner: &str, batch_size: u32, now: i64, log_line: &str) -> Result<(), BuildError> {
        let log = serde_json::to_string(&[log_line])?;
        self.expect_owned(
            sqlx::query(
                r#"
                UPDATE search_build_state SET
                    status = 'creating', next_offset = 0, indexed_count = 0, total_count = 0, batch_size = ?,
                    start_time = ?, end_time = NULL, result_log = ?, errors = '{}'
                WHERE id = 1 AND lock_owner = ?
            "#,
            )
            .bind(batch_size as i64)
            .bind(now)
            .bind(log)
            .bind(owner)
            .execute(&self.db)
            .await?
            .rows_affected(),
        )
    }

    /// Resume from paused, keeping offset, log and ledger / 继续构建
    pub async fn resume(&self, owner: &str, batch_size: u32) -> Result<(), BuildError> {
        self.expect_owned(
            sqlx::query(
                r#"
                UPDATE search_build_state SET status = 'creating', batch_size = ?
                WHERE id = 1 AND lock_owner = ? AND status = 'paused'
            "#,
            )
            .bind(batch_size as i64)
            .bind(owner)
            .execute(&self.db)
            .await?
            .rows_affected(),
        )
    }

    /// Record a batch and release the lock in one statement / 提交批次结果
    ///
    /// The status is decided by the row as it is at write time: a completed
    /// corpus wins over a pending pause, a pending pause becomes `paused`.
    /// Returns false when the lock was lost meanwhile.
    pub async fn commit_batch(&self, owner: &str, commit: &BatchCommit<'_>) -> Result<bool, BuildError> {
        let log = serde_json::to_string(commit.result_log)?;
        let errors = serde_json::to_string(commit.errors)?;
        let updated = sqlx::query(
            r#"
            UPDATE search_build_state SET
                next_offset = ?,
                indexed_count = indexed_count + ?,
                total_count = ?,
                result_log = ?,
                errors = ?,
                status = CASE
                    WHEN ? THEN 'created'
                    WHEN status = 'pausing' THEN 'paused'
                    ELSE 'creating'
                END,
                end_time = CASE WHEN ? THEN ? ELSE end_time END,
                lock_owner = NULL,
                lock_acquired_at = NULL
            WHERE id = 1 AND lock_owner = ? AND status IN ('creating', 'pausing')
        "#,
        )
        .bind(commit.offset as i64)
        .bind(commit.indexed_delta as i64)
        .bind(commit.total as i64)
        .bind(log)
        .bind(errors)
        .bind(commit.done)
        .bind(commit.done)
        .bind(commit.now)
        .bind(owner)
        .execute(&self.db)
        .await?
        .rows_affected();
        Ok(updated == 1)
    }

    /// creating → pausing; false when the build is not creating / 请求暂停
    pub async fn request_pause(&self) -> Result<bool, BuildError> {
        let updated = sqlx::query("UPDATE search_build_state SET status = 'pausing' WHERE id = 1 AND status = 'creating'")
            .execute(&self.db)
            .await?
            .rows_affected();
        Ok(updated == 1)
    }

    /// pausing → paused while holding the lock / 完成暂停
    pub async fn finish_pause(&self, owner: &str) -> Result<bool, BuildError> {
        let updated = sqlx::query(
            "UPDATE search_build_state SET status = 'paused' WHERE id = 1 AND status = 'pausing' AND lock_owner = ?",
        )
        .bind(owner)
        .execute(&self.db)
        .await?
        .rows_affected();
        Ok(updated == 1)
    }

    /// Replace the ledger outside a batch / 保存错误记录
    pub async fn save_errors(&self, owner: &str, errors: &ErrorLedger) -> Result<(), BuildError> {
        let errors = serde_json::to_string(errors)?;
        self.expect_owned(
            sqlx::query("UPDATE search_build_state SET errors = ? WHERE id = 1 AND lock_owner = ?")
                .bind(errors)
                .bind(owner)
                .execute(&self.db)
                .await?
                .rows_affected(),
        )
    }

    /// Back to empty: offset, counters, log and ledger cleared / 重置状态
    pub async fn reset(&self, owner: &str) -> Result<(), BuildError> {
        self.expect_owned(
            sqlx::query(
                r#"
                UPDATE search_build_state SET
                    status = 'empty', next_offset = 0, indexed_count = 0, total_count = 0,
                    start_time = NULL, end_time = NULL, result_log = '[]', errors = '{}'
                WHERE id = 1 AND lock_owner = ?
            "#,
            )
            .bind(owner)
            .execute(&self.db)
            .await?
            .rows_affected(),
        )
    }

    fn expect_owned(&self, rows_affected: u64) -> Result<(), BuildError> {
        if rows_affected == 1 {
            Ok(())
        } else {
            Err(BuildError::Busy)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_index;

    async fn store() -> (tempfile::TempDir, BuildStateStore) {
        let (dir, index) = temp_index().await;
        let store = BuildStateStore::new(index.pool().clone());
        store.init(10).await.unwrap();
        (dir, store)
    }

    fn commit<'a>(offset: u64, done: bool, log: &'a [String], errors: &'a ErrorLedger) -> BatchCommit<'a> {
        BatchCommit {
            offset,
            indexed_delta: 10,
            total: 25,
            result_log: log,
            errors,
            done,
            now: 500,
        }
    }

    #[tokio::test]
    async fn test_initial_state_is_empty() {
        let (_dir, store) = store().await;
        store.init(20).await.unwrap();

        let state = store.load().await.unwrap();
        assert_eq!(state.status, BuildStatus::Empty);
        assert_eq!(state.offset, 0);
        assert_eq!(state.batch_size, 10);
        assert!(state.result_log.is_empty());
        assert!(state.errors.is_empty());
        assert_eq!(state.percent(), 0);
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_until_stale() {
        let (_dir, store) = store().await;
        assert!(store.try_lock("a", 100, 0).await.unwrap());
        assert!(!store.try_lock("b", 150, 50).await.unwrap());
        // a lock taken at 100 is stale for a caller treating <= 100 as abandoned
        assert!(store.try_lock("b", 500, 100).await.unwrap());

        store.unlock("a").await.unwrap();
        assert!(!store.try_lock("c", 501, 0).await.unwrap());
        store.unlock("b").await.unwrap();
        assert!(store.try_lock("c", 502, 0).await.unwrap());
    }

    #[tokio::test]
    async fn test_pending_pause_resolves_on_commit() {
        let (_dir, store) = store().await;
        let log = vec!["batch".to_string()];
        let errors = ErrorLedger::new();

        assert!(store.try_lock("a", 1, 0).await.unwrap());
        store.begin_fresh("a", 10, 1, "start").await.unwrap();
        assert!(store.request_pause().await.unwrap());
        assert!(!store.request_pause().await.unwrap());

        assert!(store.commit_batch("a", &commit(10, false, &log, &errors)).await.unwrap());
        let state = store.load().await.unwrap();
        assert_eq!(state.status, BuildStatus::Paused);
        assert_eq!(state.offset, 10);
        assert_eq!(state.result_log, log);
        // lock released by the commit
        assert!(store.try_lock("b", 2, 0).await.unwrap());
    }

    #[tokio::test]
    async fn test_completion_wins_over_pause() {
        let (_dir, store) = store().await;
        let log = Vec::new();
        let errors = ErrorLedger::new();

        assert!(store.try_lock("a", 1, 0).await.unwrap());
        store.begin_fresh("a", 10, 1, "start").await.unwrap();
        assert!(store.request_pause().await.unwrap());
        assert!(store.commit_batch("a", &commit(25, true, &log, &errors)).await.unwrap());

        let state = store.load().await.unwrap();
        assert_eq!(state.status, BuildStatus::Created);
        assert_eq!(state.end_time, Some(500));
        assert_eq!(state.elapsed_secs(9_999), 499);
    }

    #[tokio::test]
    async fn test_commit_rejected_without_lock() {
        let (_dir, store) = store().await;
        let log = Vec::new();
        let errors = ErrorLedger::new();

        assert!(store.try_lock("a", 1, 0).await.unwrap());
        store.begin_fresh("a", 10, 1, "start").await.unwrap();
        assert!(store.try_lock("b", 400, 1).await.unwrap());

        assert!(!store.commit_batch("a", &commit(10, false, &log, &errors)).await.unwrap());
        assert_eq!(store.load().await.unwrap().offset, 0);
    }

    #[tokio::test]
    async fn test_reset_clears_progress() {
        let (_dir, store) = store().await;
        let log = vec!["batch".to_string()];
        let mut errors = ErrorLedger::new();
        errors.record(3, "broken");

        assert!(store.try_lock("a", 1, 0).await.unwrap());
        store.begin_fresh("a", 10, 1, "start").await.unwrap();
        assert!(store.commit_batch("a", &commit(10, false, &log, &errors)).await.unwrap());
        assert_eq!(store.load().await.unwrap().errors.len(), 1);

        assert!(store.try_lock("a", 2, 0).await.unwrap());
        store.reset("a").await.unwrap();
        let state = store.load().await.unwrap();
        assert_eq!(state.status, BuildStatus::Empty);
        assert_eq!(state.offset, 0);
        assert!(state.errors.is_empty());
        assert!(state.result_log.is_empty());
    }

    #[test]
    fn test_percent_rounds() {
        let mut state = BuildState {
            status: BuildStatus::Creating,
            offset: 1,
            batch_size: 10,
            indexed: 1,
            total: 3,
            start_time: None,
            end_time: None,
            result_log: Vec::new(),
            errors: ErrorLedger::new(),
        };
        assert_eq!(state.percent(), 33);
        state.indexed = 2;
        assert_eq!(state.percent(), 67);
        state.indexed = 5;
        assert_eq!(state.percent(), 100);
    }
}
