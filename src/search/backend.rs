//! Collaborator interfaces: the search backend and the entity registry.
//!
//! Concrete adapters (an Elasticsearch client, the in-process
//! [`MemoryBackend`](super::memory::MemoryBackend), ...) implement
//! [`SearchBackend`]. All operations may be eventually consistent: a write is
//! not guaranteed to be visible to the next query.

use thiserror::Error;

use super::query::BackendQuery;
use crate::model::ScoredHit;

/// Error type for backend operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend could not be reached or refused the request.
    #[error("search backend unavailable: {0}")]
    Unavailable(String),

    /// The document body was not a JSON object.
    #[error("invalid document `{doc_id}`: {reason}")]
    InvalidDocument { doc_id: String, reason: String },
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// One page of hits from a single entity type's index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendPage {
    /// Total number of documents matching the query and filter, independent of paging.
    pub total: u64,
    pub hits: Vec<ScoredHit>,
}

/// Narrow interface onto the document-search engine.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the orchestrator queries several
/// entity types concurrently through one shared instance.
pub trait SearchBackend: Send + Sync {
    /// Run `query` against the index of `entity_type`, returning hits `[from, from + size)`.
    fn execute_query(
        &self,
        entity_type: &str,
        query: &BackendQuery,
        from: usize,
        size: usize,
    ) -> BackendResult<BackendPage>;

    /// Total number of documents currently indexed for `entity_type`.
    fn doc_count(&self, entity_type: &str) -> BackendResult<u64>;

    /// Insert or replace a document. `document_json` must be a JSON object.
    fn upsert_document(
        &self,
        entity_type: &str,
        document_json: &str,
        doc_id: &str,
    ) -> BackendResult<()>;

    /// Remove a document. Deleting an absent document succeeds.
    fn delete_document(&self, entity_type: &str, doc_id: &str) -> BackendResult<()>;

    /// Block until every write acknowledged so far is visible to queries and counts.
    fn refresh(&self) -> BackendResult<()>;

    /// Remove every document from every index. Administrative/test use.
    fn clear(&self) -> BackendResult<()>;
}

/// Source of the registered entity types, in declaration order.
pub trait EntityRegistry: Send + Sync {
    fn entity_types(&self) -> Vec<String>;

    /// Position in declaration order, used for deterministic tie-breaking.
    fn position(&self, entity_type: &str) -> Option<usize> {
        self.entity_types().iter().position(|t| t == entity_type)
    }
}

/// Registry over a fixed list of entity types.
#[derive(Debug, Clone, Default)]
pub struct StaticEntityRegistry {
    entity_types: Vec<String>,
}

impl StaticEntityRegistry {
    /// Duplicates are dropped; the first occurrence fixes the position.
    pub fn new<I, S>(entity_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for t in entity_types {
            let t = t.into();
            if !out.contains(&t) {
                out.push(t);
            }
        }
        Self { entity_types: out }
    }
}

impl EntityRegistry for StaticEntityRegistry {
    fn entity_types(&self) -> Vec<String> {
        self.entity_types.clone()
    }

    fn position(&self, entity_type: &str) -> Option<usize> {
        self.entity_types.iter().position(|t| t == entity_type)
    }
}
