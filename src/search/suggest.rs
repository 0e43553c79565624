//! Prefix suggestions / 搜索联想
//!
//! Suggestions come only from terms already present in the index, ranked by
//! how often they occur weighted by the field they occur in.

use async_trait::async_trait;

use super::index_store::IndexStore;
use super::tokenizer::{normalize_for_search, tokenize};
use crate::config::FieldWeights;
use crate::error::IndexError;

/// Queries shorter than this never reach storage / 最小联想长度
pub const MIN_SUGGEST_LEN: usize = 2;

/// Upper bound on suggestions per request / 单次联想上限
pub const MAX_SUGGESTIONS: usize = 50;

/// Storage seam for prefix term lookup / 前缀词查询接口
#[async_trait]
pub trait TermLookup: Send + Sync {
    /// Indexed terms starting with `prefix`, best first
    async fn prefix_terms(
        &self,
        prefix: &str,
        weights: &FieldWeights,
        limit: usize,
    ) -> Result<Vec<String>, IndexError>;
}

/// 联想引擎 / Suggestion engine
pub struct SuggestionEngine<T: TermLookup = IndexStore> {
    lookup: T,
    weights: FieldWeights,
}

/// The word being completed, or None when too short / 取出待补全的词
fn completion_prefix(partial: &str) -> Option<String> {
    let normalized = normalize_for_search(partial);
    if normalized.chars().count() < MIN_SUGGEST_LEN {
        return None;
    }
    let last_word = normalized.split_whitespace().last()?;
    let prefix = tokenize(last_word).pop()?;
    if prefix.chars().count() < MIN_SUGGEST_LEN {
        return None;
    }
    Some(prefix)
}

impl<T: TermLookup> SuggestionEngine<T> {
    pub fn new(lookup: T, weights: FieldWeights) -> Self {
        Self { lookup, weights }
    }

    /// Up to `count` indexed terms completing the last word / 获取联想词
    pub async fn suggest(&self, partial: &str, count: usize) -> Vec<String> {
        let Some(prefix) = completion_prefix(partial) else {
            return Vec::new();
        };
        let limit = count.min(MAX_SUGGESTIONS);
        if limit == 0 {
            return Vec::new();
        }

        match self.lookup.prefix_terms(&prefix, &self.weights, limit).await {
            Ok(terms) => terms,
            Err(e) => {
                tracing::warn!("Suggestion lookup for {:?} failed: {}", prefix, e);
                Vec::new()
            }
        }
    }

    /// Single best completion, empty when there is none / 最佳联想词
    pub async fn best(&self, partial: &str) -> String {
        self.suggest(partial, 1).await.into_iter().next().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingLookup {
        calls: Arc<AtomicUsize>,
        terms: Vec<&'static str>,
        fail: bool,
    }

    #[async_trait]
    impl TermLookup for CountingLookup {
        async fn prefix_terms(
            &self,
            prefix: &str,
            _weights: &FieldWeights,
            limit: usize,
        ) -> Result<Vec<String>, IndexError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(IndexError::Corrupted("vocabulary unavailable".to_string()));
            }
            Ok(self
                .terms
                .iter()
                .filter(|t| t.starts_with(prefix))
                .take(limit)
                .map(|t| t.to_string())
                .collect())
        }
    }

    fn engine(terms: Vec<&'static str>) -> (SuggestionEngine<CountingLookup>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let lookup = CountingLookup {
            calls: calls.clone(),
            terms,
            fail: false,
        };
        (SuggestionEngine::new(lookup, FieldWeights::default()), calls)
    }

    #[tokio::test]
    async fn test_short_query_skips_storage() {
        let (engine, calls) = engine(vec!["wireless"]);
        assert!(engine.suggest("", 5).await.is_empty());
        assert!(engine.suggest("w", 5).await.is_empty());
        assert!(engine.suggest("  w ", 5).await.is_empty());
        assert_eq!(engine.best("w").await, "");
        // the last word is what gets completed
        assert!(engine.suggest("mouse w", 5).await.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_completes_last_word() {
        let (engine, calls) = engine(vec!["wireless", "winter", "mouse"]);
        assert_eq!(engine.suggest("Mouse WI", 5).await, vec!["wireless", "winter"]);
        assert_eq!(engine.best("wi").await, "wireless");
        assert_eq!(engine.best("zz").await, "");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_lookup_failure_gives_empty() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lookup = CountingLookup {
            calls: calls.clone(),
            terms: vec!["wireless"],
            fail: true,
        };
        let engine = SuggestionEngine::new(lookup, FieldWeights::default());
        assert!(engine.suggest("wire", 5).await.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_index_store_suggestions() {
        use crate::models::ItemType;
        use crate::test_support::{document, temp_index};

        let (_dir, store) = temp_index().await;
        let engine = SuggestionEngine::new(store.clone(), FieldWeights::default());
        assert_eq!(engine.best("wire").await, "");

        store.create_tables().await.unwrap();
        store
            .upsert(&document(1, ItemType::Product, "Wireless Mouse", "wired backup"), 1)
            .await
            .unwrap();
        assert_eq!(engine.best("wir").await, "wireless");
        assert_eq!(engine.suggest("wir", 5).await, vec!["wireless", "wired"]);
    }
}
