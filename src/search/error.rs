//! Error taxonomy for the search pipeline.

use thiserror::Error;

use super::backend::BackendError;
use super::filter::FilterError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// A backend call failed. Never retried here; retries belong to the adapter.
    #[error("search backend unavailable for `{entity_type}`: {source}")]
    BackendUnavailable {
        entity_type: String,
        #[source]
        source: BackendError,
    },

    /// The backend refused a document on write.
    #[error("document rejected by `{entity_type}`: {source}")]
    DocumentRejected {
        entity_type: String,
        #[source]
        source: BackendError,
    },

    /// The filter was rejected before any backend call.
    #[error("invalid filter: {0}")]
    InvalidFilter(#[from] FilterError),

    /// The caller cancelled the request; nothing was cached.
    #[error("search cancelled")]
    Cancelled,
}

impl SearchError {
    /// Wrap a backend failure, keeping its kind visible.
    pub fn backend(entity_type: impl Into<String>, source: BackendError) -> Self {
        let entity_type = entity_type.into();
        match source {
            BackendError::Unavailable(_) => SearchError::BackendUnavailable {
                entity_type,
                source,
            },
            BackendError::InvalidDocument { .. } => SearchError::DocumentRejected {
                entity_type,
                source,
            },
        }
    }
}
