//! Content source adapter / 内容源适配
//!
//! The host owns the corpus; this crate only reads it. Two seams:
//! - `ContentSource`: counting, stable id enumeration and item fetch for builds
//! - `FallbackSearch`: unindexed substring scan used when no index exists

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ContentError;
use crate::models::{ContentItem, ItemType};

pub use sqlite::SqliteContentSource;

/// Read-only view of the host corpus / 内容源
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Number of indexable items of the given types / 可索引条目数
    async fn count(&self, types: &[ItemType]) -> Result<u64, ContentError>;

    /// Item ids in ascending order, starting at `offset` / 按 id 升序列出
    async fn list_ids(&self, types: &[ItemType], offset: u64, limit: u32) -> Result<Vec<i64>, ContentError>;

    /// Load one item with every indexable field / 读取单个条目
    async fn fetch(&self, id: i64) -> Result<ContentItem, ContentError>;
}

/// Secondary ordering of unindexed results / 回退搜索排序
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackOrder {
    #[default]
    Newest,
    Oldest,
    Title,
}

/// 回退查询 / Unindexed scan request
#[derive(Debug, Clone)]
pub struct FallbackQuery {
    /// Every term must appear in the title, excerpt or body
    pub terms: Vec<String>,
    pub types: Vec<ItemType>,
    pub order: FallbackOrder,
    pub limit: usize,
    pub offset: usize,
}

/// 回退命中 / Unranked match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackHit {
    pub id: i64,
    pub item_type: ItemType,
    pub title: String,
    pub excerpt: String,
    pub body: String,
}

/// Host-native substring search / 主机原生查询
#[async_trait]
pub trait FallbackSearch: Send + Sync {
    async fn scan(&self, query: &FallbackQuery) -> Result<Vec<FallbackHit>, ContentError>;
}
