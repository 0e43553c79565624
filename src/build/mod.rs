//! Incremental index build / 增量索引构建
//!
//! Builds run as a series of short batch calls driven by the caller, so a
//! large corpus never blocks a single request:
//! - `ledger`: per-item failure records
//! - `state`: durable build state row and re-entrancy lock
//! - `batch`: one window of the corpus
//! - `service`: the state machine tying them together

pub mod batch;
pub mod ledger;
pub mod service;
pub mod state;

pub use batch::{BatchProcessor, BatchReport, ItemOutcome};
pub use ledger::ErrorLedger;
pub use service::{BuildProgress, BuildService, CREATE_LABEL};
pub use state::{BuildState, BuildStateStore, BuildStatus};
