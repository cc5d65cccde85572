//! Request and result value types.

pub mod types;

pub use types::{ScoredHit, SearchEntity, SearchFlags, SearchResult, SortCriterion, SortOrder, Urn};
