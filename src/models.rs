//! Content and index document models / 内容与索引文档模型

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::config::{FieldSelection, TypeWeights};

static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Content item type / 内容类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Page,
    Post,
    Product,
    Attachment,
}

impl ItemType {
    pub const ALL: [ItemType; 4] = [
        ItemType::Page,
        ItemType::Post,
        ItemType::Product,
        ItemType::Attachment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Page => "page",
            ItemType::Post => "post",
            ItemType::Product => "product",
            ItemType::Attachment => "attachment",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "page" => Ok(ItemType::Page),
            "post" => Ok(ItemType::Post),
            "product" => Ok(ItemType::Product),
            "attachment" => Ok(ItemType::Attachment),
            other => Err(format!("unknown item type: {}", other)),
        }
    }
}

/// A corpus item as returned by the content source / 内容源返回的条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: i64,
    pub item_type: ItemType,
    pub title: String,
    pub body: String,
    pub excerpt: String,
    /// Category and tag labels / 分类与标签
    pub taxonomies: Vec<String>,
    pub metadata: BTreeMap<String, String>,
    /// Product SKU, products only / 商品编码
    pub sku: Option<String>,
    pub published_at: DateTime<Utc>,
}

/// Searchable projection of one item / 索引文档
///
/// Derived deterministically from a [`ContentItem`], so indexing the same
/// source content twice yields an identical document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub item_id: i64,
    pub item_type: ItemType,
    pub title: String,
    pub body: String,
    pub excerpt: String,
    pub taxonomy: String,
    pub metadata: String,
    pub sku: String,
    /// Static relevance multiplier (type weight) / 静态权重
    pub weight: f64,
    pub published_at: i64,
}

/// Stored index row / 索引条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub document: IndexDocument,
    /// Last-indexed Unix timestamp / 最后索引时间
    pub indexed_at: i64,
}

/// Strip markup tags and collapse whitespace / 去除标签并压缩空白
pub fn plain_text(text: &str) -> String {
    let stripped = MARKUP_TAG.replace_all(text, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl IndexDocument {
    /// Build the index document for an item / 生成索引文档
    pub fn derive(item: &ContentItem, fields: &FieldSelection, weights: &TypeWeights) -> Self {
        let body = if fields.body { plain_text(&item.body) } else { String::new() };
        let excerpt = if fields.excerpt { plain_text(&item.excerpt) } else { String::new() };
        let taxonomy = if fields.taxonomies {
            let mut labels: Vec<&str> = item.taxonomies.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).collect();
            labels.sort_unstable();
            labels.dedup();
            labels.join(" ")
        } else {
            String::new()
        };
        // BTreeMap iteration keeps metadata ordering stable
        let metadata = item
            .metadata
            .iter()
            .filter(|(key, _)| fields.metadata_keys.iter().any(|k| k == *key))
            .map(|(_, value)| plain_text(value))
            .filter(|value| !value.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let sku = if fields.sku {
            item.sku.as_deref().map(str::trim).unwrap_or_default().to_string()
        } else {
            String::new()
        };

        Self {
            item_id: item.id,
            item_type: item.item_type,
            title: plain_text(&item.title),
            body,
            excerpt,
            taxonomy,
            metadata,
            sku,
            weight: weights.weight_for(item.item_type),
            published_at: item.published_at.timestamp(),
        }
    }
}
