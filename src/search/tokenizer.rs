//! Query tokenizer / 查询分词
//!
//! The index itself is tokenized by SQLite's `unicode61` tokenizer. This module
//! only splits user queries the same way so they can be turned into safe
//! FTS5 match expressions, LIKE patterns and highlight terms.

/// Minimum term length considered for highlighting / 高亮最小词长
pub const MIN_HIGHLIGHT_LEN: usize = 2;

/// Split text into lowercase word tokens / 对文本进行分词
///
/// Separators are every non-alphanumeric character, matching `unicode61`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| word.to_lowercase())
        .collect()
}

/// Tokenize a search query, dropping duplicates but keeping order / 对搜索查询进行分词
pub fn tokenize_query(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for token in tokenize(query) {
        if !terms.contains(&token) {
            terms.push(token);
        }
    }
    terms
}

/// Build an FTS5 MATCH expression where every term is required / 构建 MATCH 表达式
///
/// Each term is emitted as a quoted string, so query text can never be read
/// as FTS5 operators or column filters.
pub fn match_expression(terms: &[String]) -> Option<String> {
    if terms.is_empty() {
        return None;
    }
    let quoted: Vec<String> = terms
        .iter()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect();
    Some(quoted.join(" "))
}

/// Terms long enough to be highlighted / 需要高亮的词
pub fn highlight_terms(query: &str) -> Vec<String> {
    tokenize_query(query)
        .into_iter()
        .filter(|term| term.chars().count() >= MIN_HIGHLIGHT_LEN)
        .collect()
}

/// Normalize text for search / 标准化文本用于搜索
/// - Convert to lowercase / 转小写
/// - Remove extra whitespace / 去除多余空白
pub fn normalize_for_search(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Escape LIKE wildcards so user text matches literally / 转义 LIKE 通配符
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
