//! Per-item failure ledger / 条目错误记录
//!
//! Diagnostic only: an entry never blocks progress, and a later successful
//! index of the same item removes it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

/// Item id → last failure message / 条目错误表
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorLedger {
    entries: BTreeMap<i64, String>,
}

impl ErrorLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure, replacing any earlier one for the item / 记录错误
    pub fn record(&mut self, id: i64, error: impl Display) {
        self.entries.insert(id, format!("Item {}: {}", id, error));
    }

    /// Remove the entry for an item, returning whether one existed / 清除错误
    pub fn clear(&mut self, id: i64) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, id: i64) -> Option<&str> {
        self.entries.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (i64, &str)> {
        self.entries.iter().map(|(id, message)| (*id, message.as_str()))
    }
}
