//! Relevance search engine / 相关性搜索引擎
//!
//! Routes each query to the index or to the host's unindexed scan:
//! - index usable → field-weighted relevance ranking, ties by id
//! - index absent or failing → substring scan in the caller's order
//! - scan failing → empty page
//!
//! A query never surfaces an error to the end user.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::highlight::Highlighter;
use super::index_store::{IndexQuery, IndexStore};
use super::tokenizer::{match_expression, tokenize_query};
use crate::config::{SearchConfig, SearchMode};
use crate::content::{FallbackOrder, FallbackQuery, FallbackSearch};
use crate::error::IndexError;
use crate::models::{plain_text, ItemType};

/// 搜索请求 / Search request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
    /// Type names to include; empty means every indexed type
    #[serde(default)]
    pub types: Vec<String>,
    /// 1-based page number
    #[serde(default)]
    pub page: usize,
    /// 0 means the configured default
    #[serde(default)]
    pub page_size: usize,
    /// Ordering of unindexed results
    #[serde(default)]
    pub order: FallbackOrder,
}

/// Which path produced the page / 结果来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSource {
    Index,
    Fallback,
    /// The query had nothing searchable in it
    None,
}

/// 搜索结果条目 / One result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: i64,
    pub item_type: ItemType,
    /// Title with matches wrapped in highlight markers
    pub title: String,
    pub excerpt: String,
    /// Composite relevance, absent for unindexed results
    pub score: Option<f64>,
}

/// 搜索结果页 / A page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub hits: Vec<SearchHit>,
    pub page: usize,
    pub page_size: usize,
    pub has_more: bool,
    pub source: SearchSource,
}

/// 搜索引擎 / Search engine
pub struct SearchEngine {
    index: IndexStore,
    fallback: Arc<dyn FallbackSearch>,
    config: SearchConfig,
}

/// Stored excerpt, or the start of the body cut at a word boundary / 生成摘要
pub fn summarize(excerpt: &str, body: &str, max_chars: usize) -> String {
    if !excerpt.trim().is_empty() {
        return excerpt.to_string();
    }
    let body = plain_text(body);
    if body.chars().count() <= max_chars {
        return body;
    }
    let cut: String = body.chars().take(max_chars).collect();
    let trimmed = match cut.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => &cut[..pos],
        _ => cut.as_str(),
    };
    format!("{}…", trimmed.trim_end())
}

impl SearchEngine {
    pub fn new(index: IndexStore, fallback: Arc<dyn FallbackSearch>, config: SearchConfig) -> Self {
        Self { index, fallback, config }
    }

    fn empty_page(page: usize, page_size: usize, source: SearchSource) -> SearchPage {
        SearchPage {
            hits: Vec::new(),
            page,
            page_size,
            has_more: false,
            source,
        }
    }

    /// Requested types narrowed to indexed ones; None if any name is unknown
    fn resolve_types(&self, names: &[String]) -> Option<Vec<ItemType>> {
        if names.is_empty() {
            return Some(self.config.indexed_types.clone());
        }
        let mut types = Vec::with_capacity(names.len());
        for name in names {
            let item_type: ItemType = name.parse().ok()?;
            if self.config.indexed_types.contains(&item_type) && !types.contains(&item_type) {
                types.push(item_type);
            }
        }
        Some(types)
    }

    /// Whether the index should serve this query / 是否使用索引
    async fn index_ready(&self) -> Result<bool, IndexError> {
        match self.config.mode {
            SearchMode::Fallback => Ok(false),
            // index mode serves even a partially built or empty index
            SearchMode::Index => self.index.exists().await,
            SearchMode::Auto => self.index.is_usable().await,
        }
    }

    /// 执行搜索 / Run a search
    pub async fn search(&self, query: &SearchQuery) -> SearchPage {
        let page = query.page.max(1);
        let page_size = match query.page_size {
            0 => self.config.default_page_size,
            size => size.min(self.config.max_page_size),
        };

        let terms = tokenize_query(&query.query);
        let Some(match_expr) = match_expression(&terms) else {
            return Self::empty_page(page, page_size, SearchSource::None);
        };
        let types = match self.resolve_types(&query.types) {
            Some(types) if !types.is_empty() => types,
            _ => {
                tracing::debug!("No searchable types in filter {:?}", query.types);
                return Self::empty_page(page, page_size, SearchSource::None);
            }
        };

        let offset = (page - 1).saturating_mul(page_size);
        let highlighter = Highlighter::new(&query.query, &self.config.highlight_open, &self.config.highlight_close);

        let use_index = match self.index_ready().await {
            Ok(ready) => ready,
            Err(e) => {
                tracing::warn!("Index check failed, using fallback search: {}", e);
                false
            }
        };

        if use_index {
            let index_query = IndexQuery {
                match_expr: &match_expr,
                types: &types,
                field_weights: self.config.field_weights,
                recency_boost: self.config.recency_boost,
                now: Utc::now().timestamp(),
                limit: page_size + 1,
                offset,
            };
            match self.index.search(&index_query).await {
                Ok(mut hits) => {
                    let has_more = hits.len() > page_size;
                    hits.truncate(page_size);
                    let hits = hits
                        .into_iter()
                        .map(|hit| SearchHit {
                            id: hit.item_id,
                            item_type: hit.item_type,
                            title: highlighter.highlight(&hit.title),
                            excerpt: highlighter.highlight(&summarize(
                                &hit.excerpt,
                                &hit.body,
                                self.config.excerpt_length,
                            )),
                            score: Some(hit.score),
                        })
                        .collect();
                    return SearchPage {
                        hits,
                        page,
                        page_size,
                        has_more,
                        source: SearchSource::Index,
                    };
                }
                Err(e) => tracing::warn!("Index search failed, using fallback search: {}", e),
            }
        }

        let fallback_query = FallbackQuery {
            terms,
            types,
            order: query.order,
            limit: page_size + 1,
            offset,
        };
        match self.fallback.scan(&fallback_query).await {
            Ok(mut hits) => {
                let has_more = hits.len() > page_size;
                hits.truncate(page_size);
                let hits = hits
                    .into_iter()
                    .map(|hit| SearchHit {
                        id: hit.id,
                        item_type: hit.item_type,
                        title: highlighter.highlight(&hit.title),
                        excerpt: highlighter.highlight(&summarize(
                            &plain_text(&hit.excerpt),
                            &hit.body,
                            self.config.excerpt_length,
                        )),
                        score: None,
                    })
                    .collect();
                SearchPage {
                    hits,
                    page,
                    page_size,
                    has_more,
                    source: SearchSource::Fallback,
                }
            }
            Err(e) => {
                tracing::error!("Fallback search failed: {}", e);
                Self::empty_page(page, page_size, SearchSource::Fallback)
            }
        }
    }
}
