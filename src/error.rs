//! Error types / 错误类型
//!
//! Item-level failures never surface here as fatal: the batch processor turns
//! them into ledger entries. These enums cover what a caller can actually see.

use thiserror::Error;

use crate::build::state::BuildStatus;

/// Content source failures / 内容源错误
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("item {0} not found")]
    NotFound(i64),

    #[error("item {id} cannot be indexed: {reason}")]
    Invalid { id: i64, reason: String },

    #[error("content database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Index storage failures / 索引存储错误
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("search database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to encode index data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("index row is corrupted: {0}")]
    Corrupted(String),
}

/// Build control failures / 构建控制错误
#[derive(Debug, Error)]
pub enum BuildError {
    /// Another batch holds the build lock / 另一个批次正在运行
    #[error("an index build batch is already in progress")]
    Busy,

    #[error("cannot {action} while index status is {from}")]
    InvalidTransition { from: BuildStatus, action: &'static str },

    #[error("content source failed: {0}")]
    Source(#[from] ContentError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("build state database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("build state is corrupted: {0}")]
    Corrupted(String),
}

impl From<serde_json::Error> for BuildError {
    fn from(error: serde_json::Error) -> Self {
        BuildError::Corrupted(error.to_string())
    }
}

/// Configuration failures / 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
