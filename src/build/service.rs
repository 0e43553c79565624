//! Index build service / 索引构建服务
//!
//! Owns the build state machine:
//! - empty | created → creating: fresh start, offset 0
//! - paused → creating: resume at the stored offset
//! - creating → pausing → paused: cooperative, a running batch finishes first
//! - offset ≥ corpus size → created, even with a pause pending
//! - any → empty: delete
//!
//! Each `create` call runs exactly one batch; the caller keeps calling while
//! the status is `creating`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::batch::{BatchProcessor, ItemOutcome};
use super::ledger::ErrorLedger;
use super::state::{BatchCommit, BuildState, BuildStateStore, BuildStatus};
use crate::config::{AppConfig, BatchSize};
use crate::content::ContentSource;
use crate::error::{BuildError, ContentError};
use crate::search::IndexStore;

/// Label the admin control shows after a delete / 删除后的按钮文本
pub const CREATE_LABEL: &str = "Create index";

/// Progress returned by every control request / 构建进度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildProgress {
    pub status: BuildStatus,
    pub offset: u64,
    pub indexed: u64,
    pub total: u64,
    pub percent: u32,
    pub batch_size: u32,
    pub error_count: usize,
    /// Log lines of this request, or the whole log for a status query
    pub results: Vec<String>,
    /// The log was replaced rather than appended to
    pub fresh_start: bool,
    pub elapsed_secs: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_label: Option<String>,
}

impl BuildProgress {
    fn from_state(state: &BuildState, results: Vec<String>, fresh_start: bool) -> Self {
        Self {
            status: state.status,
            offset: state.offset,
            indexed: state.indexed,
            total: state.total,
            percent: state.percent(),
            batch_size: state.batch_size,
            error_count: state.errors.len(),
            results,
            fresh_start,
            elapsed_secs: state.elapsed_secs(Utc::now().timestamp()),
            control_label: None,
        }
    }
}

/// 索引构建服务 / Build service
pub struct BuildService {
    store: BuildStateStore,
    index: IndexStore,
    processor: BatchProcessor,
    batch_size: BatchSize,
    lock_timeout_secs: i64,
}

impl BuildService {
    /// Create the service and its state row / 创建构建服务
    pub async fn open(
        index: IndexStore,
        source: Arc<dyn ContentSource>,
        config: &AppConfig,
    ) -> Result<Self, BuildError> {
        let store = BuildStateStore::new(index.pool().clone());
        store.init(config.build.batch_size.get()).await?;

        let processor = BatchProcessor::new(
            source,
            index.clone(),
            config.fields.clone(),
            config.search.type_weights,
            config.search.indexed_types.clone(),
        );

        Ok(Self {
            store,
            index,
            processor,
            batch_size: config.build.batch_size,
            lock_timeout_secs: config.build.lock_timeout_secs.min(i64::MAX as u64) as i64,
        })
    }

    pub fn index(&self) -> &IndexStore {
        &self.index
    }

    /// Take the build lock or fail with Busy / 获取构建锁
    async fn lock(&self) -> Result<String, BuildError> {
        let owner = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();
        if self.store.try_lock(&owner, now, now - self.lock_timeout_secs).await? {
            Ok(owner)
        } else {
            Err(BuildError::Busy)
        }
    }

    /// Release the lock, logging instead of failing / 释放构建锁
    async fn release(&self, owner: &str) {
        if let Err(e) = self.store.unlock(owner).await {
            tracing::error!("Failed to release build lock: {}", e);
        }
    }

    /// 当前进度 / Read-only snapshot
    pub async fn status(&self) -> Result<BuildProgress, BuildError> {
        let state = self.store.load().await?;
        let log = state.result_log.clone();
        Ok(BuildProgress::from_state(&state, log, false))
    }

    /// 错误记录 / Current error ledger
    pub async fn errors(&self) -> Result<ErrorLedger, BuildError> {
        Ok(self.store.load().await?.errors)
    }

    /// Start, resume or continue the build and run one batch / 创建索引
    pub async fn create(&self) -> Result<BuildProgress, BuildError> {
        let owner = self.lock().await?;
        let result = self.create_locked(&owner).await;
        self.release(&owner).await;
        result
    }

    async fn create_locked(&self, owner: &str) -> Result<BuildProgress, BuildError> {
        let state = self.store.load().await?;
        let now = Utc::now().timestamp();
        let mut fresh_start = false;

        match state.status {
            BuildStatus::Empty | BuildStatus::Created => {
                // 全新构建：重建索引表
                self.index.drop_tables().await?;
                self.index.create_tables().await?;
                self.store
                    .begin_fresh(owner, self.batch_size.get(), now, "Index build started")
                    .await?;
                fresh_start = true;
                tracing::info!("Index build started");
            }
            BuildStatus::Paused => {
                self.index.create_tables().await?;
                self.store.resume(owner, self.batch_size.get()).await?;
                tracing::info!("Index build resumed at offset {}", state.offset);
            }
            BuildStatus::Creating => {
                self.index.create_tables().await?;
            }
            BuildStatus::Pausing => {
                // 暂停请求时没有批次在运行
                self.store.finish_pause(owner).await?;
                let state = self.store.load().await?;
                return Ok(BuildProgress::from_state(&state, Vec::new(), false));
            }
        }

        let mut state = self.store.load().await?;
        let report = self
            .processor
            .run_batch(state.offset, state.batch_size, &mut state.errors)
            .await?;

        let offset = state.offset + report.attempted;
        let done = offset >= report.total;
        let mut results = if fresh_start { state.result_log.clone() } else { Vec::new() };
        results.extend(report.log.iter().cloned());
        state.result_log.extend(report.log);
        if done {
            let line = format!(
                "Index created: {} of {} items indexed, {} errors",
                state.indexed + report.succeeded,
                report.total,
                state.errors.len()
            );
            results.push(line.clone());
            state.result_log.push(line);
        }

        let committed = self
            .store
            .commit_batch(
                owner,
                &BatchCommit {
                    offset,
                    indexed_delta: report.succeeded,
                    total: report.total,
                    result_log: &state.result_log,
                    errors: &state.errors,
                    done,
                    now: Utc::now().timestamp(),
                },
            )
            .await?;
        if !committed {
            tracing::warn!("Build lock lost before the batch at offset {} was recorded", state.offset);
            return Err(BuildError::Busy);
        }

        let state = self.store.load().await?;
        if state.status == BuildStatus::Created {
            tracing::info!("Index build completed: {} of {} items", state.indexed, state.total);
        }
        Ok(BuildProgress::from_state(&state, results, fresh_start))
    }

    /// Request a cooperative pause / 暂停构建
    ///
    /// Completes at once when no batch is running; otherwise the running
    /// batch turns `pausing` into `paused` when it records its result.
    pub async fn pause(&self) -> Result<BuildProgress, BuildError> {
        if !self.store.request_pause().await? {
            let state = self.store.load().await?;
            return match state.status {
                BuildStatus::Pausing | BuildStatus::Paused => Ok(BuildProgress::from_state(&state, Vec::new(), false)),
                from => Err(BuildError::InvalidTransition { from, action: "pause" }),
            };
        }

        let now = Utc::now().timestamp();
        let owner = Uuid::new_v4().to_string();
        if self.store.try_lock(&owner, now, now - self.lock_timeout_secs).await? {
            let finished = self.store.finish_pause(&owner).await;
            self.release(&owner).await;
            finished?;
            tracing::info!("Index build paused");
        } else {
            tracing::info!("Index build pause requested, waiting for the running batch");
        }

        let state = self.store.load().await?;
        Ok(BuildProgress::from_state(&state, Vec::new(), false))
    }

    /// Drop the index and reset to empty / 删除索引
    pub async fn delete(&self) -> Result<BuildProgress, BuildError> {
        let owner = self.lock().await?;
        let result: Result<(), BuildError> = async {
            self.index.drop_tables().await?;
            self.store.reset(&owner).await
        }
        .await;
        self.release(&owner).await;
        result?;

        tracing::info!("Search index deleted");
        let state = self.store.load().await?;
        let mut progress = BuildProgress::from_state(&state, Vec::new(), true);
        progress.control_label = Some(CREATE_LABEL.to_string());
        Ok(progress)
    }

    /// Re-index one item on demand / 单条目重建索引
    ///
    /// A missing item loses its entry. Failures are recorded in the ledger
    /// and reported, never raised.
    pub async fn index_item(&self, id: i64) -> Result<ItemOutcome, BuildError> {
        if !self.index.exists().await? {
            return Ok(ItemOutcome::Skipped);
        }
        let owner = self.lock().await?;
        let result = self.index_item_locked(&owner, id).await;
        self.release(&owner).await;
        result
    }

    async fn index_item_locked(&self, owner: &str, id: i64) -> Result<ItemOutcome, BuildError> {
        let mut ledger = self.store.load().await?.errors;
        let outcome = match self.processor.index_one(id).await {
            Ok(outcome) => {
                ledger.clear(id);
                outcome
            }
            Err(BuildError::Source(ContentError::NotFound(_))) => {
                self.index.delete(id).await?;
                ledger.clear(id);
                ItemOutcome::Removed
            }
            Err(e) => {
                tracing::warn!("Failed to index item {}: {}", id, e);
                ledger.record(id, &e);
                ItemOutcome::Failed(e.to_string())
            }
        };
        self.store.save_errors(owner, &ledger).await?;
        tracing::debug!("Item {} re-indexed: {:?}", id, outcome);
        Ok(outcome)
    }

    /// Remove one item's entry / 删除单条目索引
    pub async fn remove_item(&self, id: i64) -> Result<ItemOutcome, BuildError> {
        if !self.index.exists().await? {
            return Ok(ItemOutcome::Skipped);
        }
        let owner = self.lock().await?;
        let result: Result<ItemOutcome, BuildError> = async {
            self.index.delete(id).await?;
            let mut ledger = self.store.load().await?.errors;
            if ledger.clear(id) {
                self.store.save_errors(&owner, &ledger).await?;
            }
            Ok(ItemOutcome::Removed)
        }
        .await;
        self.release(&owner).await;
        result
    }
}
