pub mod build;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod models;
pub mod search;

#[cfg(test)]
pub(crate) mod test_support;
