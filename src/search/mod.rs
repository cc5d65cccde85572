//! Search layer facade.
//!
//! - **[`filter`]**: disjunctive-normal-form filters and their evaluation.
//! - **[`query`]**: backend query tree translated from filters, with an Elasticsearch-style DSL.
//! - **[`backend`]**: the [`SearchBackend`](backend::SearchBackend) and
//!   [`EntityRegistry`](backend::EntityRegistry) seams.
//! - **[`memory`]**: in-process backend used by tests and the CLI.
//! - **[`doc_count`]**: TTL cache of per-entity document counts.
//! - **[`cache`]**: result cache and the caching fan-out layer.
//! - **[`ranker`]**: merging of per-entity hit lists.
//! - **[`service`]**: the cross-entity search entry point.

pub mod backend;
pub mod cache;
pub mod doc_count;
pub mod document;
pub mod error;
pub mod filter;
pub mod memory;
pub mod query;
pub mod ranker;
pub mod request;
pub mod service;

pub use backend::{BackendError, EntityRegistry, SearchBackend, StaticEntityRegistry};
pub use error::SearchError;
pub use filter::{Condition, ConjunctiveCriterion, Criterion, Filter, FilterError};
pub use request::{CancellationToken, SearchRequest};
pub use service::SearchService;
