//! Page model - the document port and an in-memory implementation
//!
//! This crate provides the tree the Waypoint core reads from:
//! - [`Document`] trait: selector queries, text, ancestry, geometry, scroll, mutations
//! - [`MemoryDocument`]: arena-backed implementation used by fixtures and tests
//! - A CSS selector subset engine
//! - JSON page fixtures with a timeline of scripted changes

pub mod document;
pub mod errors;
pub mod fixture;
pub mod memory;
pub mod selector;

pub use document::*;
pub use errors::*;
pub use fixture::*;
pub use memory::*;
pub use selector::Selector;
