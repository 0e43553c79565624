use serde::{Deserialize, Serialize};

use quicksearch::build::{BuildProgress, ItemOutcome};

/// 索引控制请求
#[derive(Debug, Clone, Deserialize)]
pub struct ControlRequest {
    pub action: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub item_id: Option<i64>,
}

/// 索引控制动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Create,
    Pause,
    Delete,
    IndexSingleItem,
    RemoveSingleItem,
}

impl ControlAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action.trim() {
            "create" => Some(Self::Create),
            "pause" => Some(Self::Pause),
            "delete" => Some(Self::Delete),
            "index-single-item" => Some(Self::IndexSingleItem),
            "remove-single-item" => Some(Self::RemoveSingleItem),
            _ => None,
        }
    }
}

/// 单条目操作结果
#[derive(Debug, Clone, Serialize)]
pub struct ItemResult {
    pub item_id: i64,
    pub outcome: ItemOutcome,
}

/// 索引控制响应
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ControlResponse {
    Progress(BuildProgress),
    Item(ItemResult),
}

/// 错误记录条目
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub item_id: i64,
    pub message: String,
}

/// 联想请求参数
#[derive(Debug, Clone, Deserialize)]
pub struct SuggestParams {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub count: Option<usize>,
}

/// 联想响应
#[derive(Debug, Clone, Serialize)]
pub struct SuggestResponse {
    /// Best completion, empty when there is none
    pub suggestion: String,
    pub suggestions: Vec<String>,
}
