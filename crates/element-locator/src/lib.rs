//! Element locator - ordered, multi-strategy element resolution
//!
//! This crate turns an interaction descriptor into a live element:
//! - Selector query (primary strategy, invalid selectors are skipped)
//! - Exact text/value match among interactive elements
//! - Case-insensitive substring fallback, first scoped then document-wide
//! - Deterministic first-in-document-order tie-break

pub mod config;
pub mod errors;
pub mod matcher;
pub mod resolver;
pub mod types;

pub use config::*;
pub use errors::*;
pub use matcher::*;
pub use resolver::*;
pub use types::*;
