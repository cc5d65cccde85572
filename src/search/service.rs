//! Cross-entity search orchestration.
//!
//! [`SearchService`] is the public entry point. It resolves which entity
//! types to search, validates the filter, drops entity types that hold no
//! documents (using the doc-count cache), and delegates the fan-out and
//! merge to the [`CachingSearchService`].

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::backend::{EntityRegistry, SearchBackend};
use super::cache::CachingSearchService;
use super::doc_count::EntityDocCountCache;
use super::error::SearchError;
use super::filter::Filter;
use super::request::{CancellationToken, SearchRequest};
use crate::config::SearchServiceConfig;
use crate::model::{SearchFlags, SearchResult, SortCriterion};

pub struct SearchService {
    registry: Arc<dyn EntityRegistry>,
    backend: Arc<dyn SearchBackend>,
    doc_counts: EntityDocCountCache,
    caching: CachingSearchService,
}

impl SearchService {
    /// Assemble a service from explicitly constructed caches.
    ///
    /// `doc_counts` and `caching` should wrap the same `backend`; writes made
    /// through this service invalidate both.
    pub fn new(
        registry: Arc<dyn EntityRegistry>,
        backend: Arc<dyn SearchBackend>,
        doc_counts: EntityDocCountCache,
        caching: CachingSearchService,
    ) -> Self {
        Self {
            registry,
            backend,
            doc_counts,
            caching,
        }
    }

    pub fn from_config(
        config: &SearchServiceConfig,
        registry: Arc<dyn EntityRegistry>,
        backend: Arc<dyn SearchBackend>,
    ) -> Self {
        let doc_counts = EntityDocCountCache::new(
            Arc::clone(&backend),
            Duration::from_secs(config.doc_count_ttl_secs),
        );
        let caching = CachingSearchService::new(
            Arc::clone(&backend),
            config.ranker.build(),
            config.cache_capacity,
            config.cache_enabled,
        );
        info!(
            cache_enabled = config.cache_enabled,
            cache_capacity = config.cache_capacity,
            doc_count_ttl_secs = config.doc_count_ttl_secs,
            ranker = %config.ranker,
            "search service configured"
        );
        Self::new(registry, backend, doc_counts, caching)
    }

    /// Search several entity types at once and return one merged page.
    ///
    /// An empty `entity_types` slice searches every registered type.
    #[allow(clippy::too_many_arguments)]
    pub fn search_across_entities(
        &self,
        entity_types: &[String],
        query: &str,
        filter: Option<&Filter>,
        sort: Option<&SortCriterion>,
        from: usize,
        size: usize,
        flags: SearchFlags,
    ) -> Result<SearchResult, SearchError> {
        let request = SearchRequest {
            entity_types: entity_types.to_vec(),
            query: query.to_string(),
            filter: filter.cloned(),
            sort: sort.cloned(),
            from,
            size,
            flags,
        };
        self.search_across_entities_with_cancel(&request, &CancellationToken::new())
    }

    pub fn search(&self, request: &SearchRequest) -> Result<SearchResult, SearchError> {
        self.search_across_entities_with_cancel(request, &CancellationToken::new())
    }

    /// As [`search`](Self::search), abandoning work once `cancel` fires.
    #[instrument(skip_all, fields(query = %request.query, from = request.from, size = request.size))]
    pub fn search_across_entities_with_cancel(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<SearchResult, SearchError> {
        if let Some(filter) = &request.filter {
            filter.validate()?;
        }
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        let mut entity_types = self.resolve_entity_types(&request.entity_types);
        if !request.flags.skip_cache {
            entity_types = self.doc_counts.non_empty(&entity_types)?;
        }
        if entity_types.is_empty() {
            debug!("no searchable entity types, returning empty result");
            return Ok(SearchResult::empty(request.from, request.size));
        }

        let resolved = SearchRequest {
            entity_types,
            ..request.clone()
        };
        self.caching.search(&resolved, cancel)
    }

    /// Requested types in registry declaration order, unknown types after them
    /// alphabetically, duplicates removed. An empty request means every registered type.
    fn resolve_entity_types(&self, requested: &[String]) -> Vec<String> {
        if requested.is_empty() {
            return self.registry.entity_types();
        }
        let mut resolved: Vec<(Option<usize>, String)> = Vec::with_capacity(requested.len());
        for entity_type in requested {
            if resolved.iter().any(|(_, t)| t == entity_type) {
                continue;
            }
            resolved.push((self.registry.position(entity_type), entity_type.clone()));
        }
        resolved.sort_by(|(pa, a), (pb, b)| match (pa, pb) {
            (Some(pa), Some(pb)) => pa.cmp(pb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.cmp(b),
        });
        resolved.into_iter().map(|(_, t)| t).collect()
    }

    /// Drop every cached doc count and result.
    pub fn invalidate_caches(&self) {
        self.doc_counts.invalidate_all();
        self.caching.clear();
        info!("search caches invalidated");
    }

    /// Write a document through to the backend, wait for it to become
    /// visible, then invalidate both caches.
    pub fn upsert_document(
        &self,
        entity_type: &str,
        document_json: &str,
        doc_id: &str,
    ) -> Result<(), SearchError> {
        self.backend
            .upsert_document(entity_type, document_json, doc_id)
            .map_err(|e| SearchError::backend(entity_type, e))?;
        self.refresh_then_invalidate(entity_type)
    }

    /// Delete through to the backend. Deleting an absent document succeeds.
    pub fn delete_document(&self, entity_type: &str, doc_id: &str) -> Result<(), SearchError> {
        self.backend
            .delete_document(entity_type, doc_id)
            .map_err(|e| SearchError::backend(entity_type, e))?;
        self.refresh_then_invalidate(entity_type)
    }

    /// Caches are dropped even when the refresh fails: the write was acknowledged
    /// and may surface at any point.
    fn refresh_then_invalidate(&self, entity_type: &str) -> Result<(), SearchError> {
        let refreshed = self.backend.refresh();
        self.invalidate_caches();
        refreshed.map_err(|e| SearchError::backend(entity_type, e))
    }

    /// Document count through the doc-count cache.
    pub fn doc_count(&self, entity_type: &str) -> Result<u64, SearchError> {
        self.doc_counts
            .count(entity_type)
            .map_err(|e| SearchError::backend(entity_type, e))
    }

    pub fn doc_counts(&self) -> &EntityDocCountCache {
        &self.doc_counts
    }

    pub fn caching(&self) -> &CachingSearchService {
        &self.caching
    }
}
