//! Storage layer
//!
//! Documents and values, the ordered in-memory store, and collections.

pub mod collection;
pub mod document;
pub mod store;
