//! Batch processor / 批次处理
//!
//! Indexes one window of the corpus: ids are enumerated in ascending order
//! from the current offset, each item is fetched, derived and upserted.
//! One bad item never fails the batch; only listing failures do.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::ledger::ErrorLedger;
use crate::config::{FieldSelection, TypeWeights};
use crate::content::ContentSource;
use crate::error::BuildError;
use crate::models::{IndexDocument, ItemType};
use crate::search::IndexStore;

/// 批次报告 / Result of one batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Items tried; the offset advances by this much
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Corpus size when the batch started
    pub total: u64,
    /// Log lines produced by this batch
    pub log: Vec<String>,
}

/// What happened to a single item / 单条目处理结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemOutcome {
    Indexed,
    /// Entry removed (item gone or no longer indexable)
    Removed,
    Failed(String),
    /// Nothing to do, no index exists yet
    Skipped,
}

/// 批次处理器 / Batch processor
#[derive(Clone)]
pub struct BatchProcessor {
    source: Arc<dyn ContentSource>,
    index: IndexStore,
    fields: FieldSelection,
    type_weights: TypeWeights,
    types: Vec<ItemType>,
}

impl BatchProcessor {
    pub fn new(
        source: Arc<dyn ContentSource>,
        index: IndexStore,
        fields: FieldSelection,
        type_weights: TypeWeights,
        types: Vec<ItemType>,
    ) -> Self {
        Self {
            source,
            index,
            fields,
            type_weights,
            types,
        }
    }

    /// Index the window `[offset, offset + batch_size)` / 处理一个批次
    ///
    /// Counting or listing failures abort the batch with nothing recorded,
    /// so the same call can simply be retried.
    pub async fn run_batch(
        &self,
        offset: u64,
        batch_size: u32,
        ledger: &mut ErrorLedger,
    ) -> Result<BatchReport, BuildError> {
        let total = self.source.count(&self.types).await?;
        let ids = self.source.list_ids(&self.types, offset, batch_size).await?;

        let mut report = BatchReport {
            total,
            ..BatchReport::default()
        };

        for &id in &ids {
            report.attempted += 1;
            match self.index_one(id).await {
                Ok(_) => {
                    ledger.clear(id);
                    report.succeeded += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to index item {}: {}", id, e);
                    ledger.record(id, &e);
                    report.log.push(format!("Failed to index item {}: {}", id, e));
                    report.failed += 1;
                }
            }
        }

        if let (Some(first), Some(last)) = (ids.first(), ids.last()) {
            report.log.push(format!(
                "Indexed {} of {} items (ids {}-{})",
                report.succeeded, report.attempted, first, last
            ));
        }
        tracing::debug!(
            "Batch at offset {}: attempted {}, succeeded {}, failed {}, total {}",
            offset,
            report.attempted,
            report.succeeded,
            report.failed,
            report.total
        );
        Ok(report)
    }

    /// Fetch, derive and store one item / 索引单个条目
    ///
    /// Items of a type outside the indexed set lose their entry instead.
    pub async fn index_one(&self, id: i64) -> Result<ItemOutcome, BuildError> {
        let item = self.source.fetch(id).await?;
        if !self.types.contains(&item.item_type) {
            self.index.delete(id).await?;
            return Ok(ItemOutcome::Removed);
        }

        let document = IndexDocument::derive(&item, &self.fields, &self.type_weights);
        self.index.upsert(&document, Utc::now().timestamp()).await?;
        Ok(ItemOutcome::Indexed)
    }
}
