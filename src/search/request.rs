//! Search request shape and cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::filter::Filter;
use crate::model::{SearchFlags, SortCriterion};

/// A cross-entity search request.
///
/// An empty `entity_types` list means "every registered entity type".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    pub entity_types: Vec<String>,
    pub query: String,
    pub filter: Option<Filter>,
    pub sort: Option<SortCriterion>,
    pub from: usize,
    pub size: usize,
    pub flags: SearchFlags,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            size: 10,
            ..Self::default()
        }
    }

    pub fn entity_types<I, S>(mut self, entity_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entity_types = entity_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn sort(mut self, sort: SortCriterion) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn page(mut self, from: usize, size: usize) -> Self {
        self.from = from;
        self.size = size;
        self
    }

    pub fn flags(mut self, flags: SearchFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Number of leading hits each entity type must return to fill this page.
    pub fn window(&self) -> usize {
        self.from.saturating_add(self.size)
    }
}

/// Cooperative cancellation shared between a caller and an in-flight search.
///
/// Clones observe the same flag. Cancelling stops further backend calls and
/// guarantees the partial work is never written to the result cache.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
