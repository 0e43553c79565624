//! Search module / 搜索模块
//!
//! Architecture principles / 架构原则：
//! - index_store only exposes primitives: create/drop tables, upsert, delete, ranked lookup
//! - the build module controls batching, progress and error recovery
//! - Call direction: build → search (unidirectional) / 调用方向
//!
//! Index features / 索引特性：
//! - SQLite FTS5 with per-field bm25 weights
//! - Type weight and optional recency boost folded into the score
//! - Prefix suggestions from the index vocabulary
//! - Unindexed fallback when no index exists

pub mod engine;
pub mod highlight;
pub mod index_store;
pub mod suggest;
pub mod tokenizer;

pub use engine::{SearchEngine, SearchHit, SearchPage, SearchQuery, SearchSource};
pub use highlight::Highlighter;
pub use index_store::{IndexHit, IndexQuery, IndexStore};
pub use suggest::{SuggestionEngine, TermLookup};
