//! Match highlighting / 匹配高亮
//!
//! Wraps query terms found in result text with configurable markers.
//! Matching is case-insensitive and bounded by word boundaries. Markup tags
//! and character entities are copied through untouched so a marker can never
//! split them.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use super::tokenizer::highlight_terms;

static PROTECTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>|&#?[A-Za-z0-9]+;").unwrap());

/// Highlighter for one query / 单次查询的高亮器
pub struct Highlighter {
    pattern: Option<Regex>,
    open: String,
    close: String,
}

impl Highlighter {
    pub fn new(query: &str, open: &str, close: &str) -> Self {
        let mut terms = highlight_terms(query);
        // Longest first so "mouse" wins over "mo" in the alternation
        terms.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then_with(|| a.cmp(b)));

        let pattern = if terms.is_empty() {
            None
        } else {
            let alternation = terms.iter().map(|t| regex::escape(t)).collect::<Vec<_>>().join("|");
            RegexBuilder::new(&format!(r"\b(?:{})\b", alternation))
                .case_insensitive(true)
                .build()
                .map_err(|e| tracing::debug!("Highlight pattern rejected: {}", e))
                .ok()
        };

        Self {
            pattern,
            open: open.to_string(),
            close: close.to_string(),
        }
    }

    /// Highlight text, or return it unchanged when marking is unsafe / 高亮文本
    pub fn highlight(&self, text: &str) -> String {
        let Some(pattern) = &self.pattern else {
            return text.to_string();
        };
        if text.is_empty() || text.contains(&self.open) || text.contains(&self.close) {
            return text.to_string();
        }

        let mut marked = String::with_capacity(text.len() + 32);
        let mut last = 0;
        for protected in PROTECTED.find_iter(text) {
            self.mark_segment(pattern, &text[last..protected.start()], &mut marked);
            marked.push_str(protected.as_str());
            last = protected.end();
        }
        self.mark_segment(pattern, &text[last..], &mut marked);

        if marked.replace(&self.open, "").replace(&self.close, "") != text {
            tracing::warn!("Highlighting altered result text, returning it unmarked");
            return text.to_string();
        }
        marked
    }

    fn mark_segment(&self, pattern: &Regex, segment: &str, out: &mut String) {
        let mut last = 0;
        for found in pattern.find_iter(segment) {
            out.push_str(&segment[last..found.start()]);
            out.push_str(&self.open);
            out.push_str(found.as_str());
            out.push_str(&self.close);
            last = found.end();
        }
        out.push_str(&segment[last..]);
    }
}
