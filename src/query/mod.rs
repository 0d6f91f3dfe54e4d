//! Query layer
//!
//! Filters, updates, projections and find options are compiled once from
//! their literal form and then evaluated against store snapshots.

pub(crate) mod executor;
pub mod filter;
pub mod options;
pub mod projection;
pub mod update;

pub use executor::{DeleteResult, UpdateResult};
pub use filter::{Condition, Filter, Predicate};
pub use options::{FindOptions, Sort, SortDirection, SortKey};
pub use projection::Projection;
pub use update::Update;
