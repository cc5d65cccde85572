//! Result cache and the caching search layer.
//!
//! [`ResultCache`] is a sharded LRU map from the full normalized query shape
//! ([`CacheKey`]) to an immutable [`SearchResult`] snapshot. It cannot observe
//! backend writes, so coherence is the write path's job: call
//! [`CachingSearchService::clear`] once a write is visible.
//!
//! [`CachingSearchService`] sits in front of the backend fan-out. On a miss it
//! queries every entity type in parallel, merges with the configured
//! [`Ranker`], slices the requested page and stores the result. Failed or
//! cancelled searches are never stored.

use lru::LruCache;
use parking_lot::RwLock;
use rayon::prelude::*;
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use super::backend::SearchBackend;
use super::error::SearchError;
use super::filter::{Filter, query_for};
use super::query::BackendQuery;
use super::ranker::{EntityHits, Ranker};
use super::request::{CancellationToken, SearchRequest};
use crate::model::{SearchEntity, SearchResult, SortCriterion};

/// Upper bound on shard count. Small capacities use fewer shards.
const MAX_SHARDS: usize = 16;

/// Cache statistics for monitoring.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    pub bypasses: AtomicU64,
}

impl CacheStats {
    /// Current stats as `(hits, misses, evictions, bypasses)`.
    pub fn get(&self) -> (u64, u64, u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.evictions.load(Ordering::Relaxed),
            self.bypasses.load(Ordering::Relaxed),
        )
    }

    /// Hit rate in `0.0..=1.0`.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// Normalized query shape. Two requests with equal keys are guaranteed equal results
/// at the same backend state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    entity_types: Vec<String>,
    query: String,
    filter: Option<Filter>,
    sort: Option<SortCriterion>,
    from: usize,
    size: usize,
    fulltext: bool,
}

impl CacheKey {
    /// Entity types keep their order (it drives tie-breaking) but lose duplicates.
    /// An empty filter is the same as no filter.
    pub fn from_request(request: &SearchRequest) -> Self {
        let mut entity_types: Vec<String> = Vec::with_capacity(request.entity_types.len());
        for t in &request.entity_types {
            if !entity_types.contains(t) {
                entity_types.push(t.clone());
            }
        }
        Self {
            entity_types,
            query: request.query.trim().to_string(),
            filter: request.filter.clone().filter(|f| !f.is_empty()),
            sort: request.sort.clone(),
            from: request.from,
            size: request.size,
            fulltext: request.flags.fulltext,
        }
    }

    fn shard_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Sharded LRU of search result snapshots.
pub struct ResultCache {
    shards: Vec<RwLock<LruCache<CacheKey, Arc<SearchResult>>>>,
    capacity: usize,
    stats: CacheStats,
}

impl ResultCache {
    /// A cache holding at most `capacity` entries. Zero capacity caches nothing.
    pub fn new(capacity: usize) -> Self {
        let shard_count = capacity.min(MAX_SHARDS);
        // The remainder goes one entry each to the first shards so the total is exactly `capacity`.
        let shards = (0..shard_count)
            .map(|i| {
                let extra = usize::from(i < capacity % shard_count);
                let per_shard =
                    NonZeroUsize::new(capacity / shard_count + extra).unwrap_or(NonZeroUsize::MIN);
                RwLock::new(LruCache::new(per_shard))
            })
            .collect();
        Self {
            shards,
            capacity,
            stats: CacheStats::default(),
        }
    }

    fn shard(&self, key: &CacheKey) -> Option<&RwLock<LruCache<CacheKey, Arc<SearchResult>>>> {
        if self.shards.is_empty() {
            return None;
        }
        let idx = (key.shard_hash() as usize) % self.shards.len();
        self.shards.get(idx)
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<SearchResult>> {
        let cached = self
            .shard(key)
            .and_then(|shard| shard.write().get(key).map(Arc::clone));
        let counter = if cached.is_some() {
            &self.stats.hits
        } else {
            &self.stats.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        cached
    }

    /// Store a snapshot, evicting the shard's least recently used entry when full.
    pub fn insert(&self, key: CacheKey, result: SearchResult) -> Arc<SearchResult> {
        let arc = Arc::new(result);
        let Some(shard) = self.shard(&key) else {
            return arc;
        };
        let mut shard = shard.write();
        if shard.len() == shard.cap().get() && !shard.contains(&key) {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(capacity = self.capacity, "result cache shard full, evicting lru entry");
        }
        shard.put(key, Arc::clone(&arc));
        arc
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            shard.write().clear();
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("capacity", &self.capacity)
            .field("shards", &self.shards.len())
            .field("len", &self.len())
            .finish()
    }
}

/// Memoizing search layer over the backend fan-out.
pub struct CachingSearchService {
    backend: Arc<dyn SearchBackend>,
    ranker: Arc<dyn Ranker>,
    cache: ResultCache,
    enabled: bool,
}

impl CachingSearchService {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        ranker: Arc<dyn Ranker>,
        capacity: usize,
        enabled: bool,
    ) -> Self {
        Self {
            backend,
            ranker,
            cache: ResultCache::new(capacity),
            enabled,
        }
    }

    /// Search `request.entity_types` as given (no registry resolution here).
    ///
    /// With `skip_cache` set, or the cache disabled, the cache is neither read
    /// nor written. Otherwise a hit returns the stored snapshot unchanged.
    pub fn search(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<SearchResult, SearchError> {
        if request.flags.skip_cache || !self.enabled {
            self.cache.stats.bypasses.fetch_add(1, Ordering::Relaxed);
            return self.execute(request, cancel);
        }

        let key = CacheKey::from_request(request);
        if let Some(hit) = self.cache.get(&key) {
            debug!(query = %request.query, entity_types = ?request.entity_types, "result cache hit");
            return Ok(SearchResult::clone(&hit));
        }
        debug!(query = %request.query, entity_types = ?request.entity_types, "result cache miss");

        let result = self.execute(request, cancel)?;
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        self.cache.insert(key, result.clone());
        Ok(result)
    }

    /// Fan out to every entity type, merge and page. Never touches the cache.
    pub fn execute(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<SearchResult, SearchError> {
        let window = request.window();
        let backend_query = BackendQuery::new(
            request.query.trim(),
            request.flags.fulltext,
            query_for(request.filter.as_ref()),
        )
        .with_sort(request.sort.clone());

        let pages: Vec<(EntityHits, u64)> = request
            .entity_types
            .par_iter()
            .map(|entity_type| {
                if cancel.is_cancelled() {
                    return Err(SearchError::Cancelled);
                }
                let page = self
                    .backend
                    .execute_query(entity_type, &backend_query, 0, window)
                    .map_err(|e| {
                        warn!(entity_type = %entity_type, error = %e, "entity search failed");
                        SearchError::backend(entity_type.clone(), e)
                    })?;
                Ok((EntityHits::new(entity_type.clone(), page.hits), page.total))
            })
            .collect::<Result<_, _>>()?;

        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        let num_entities = pages.iter().map(|(_, total)| *total).sum();
        let groups: Vec<EntityHits> = pages.into_iter().map(|(group, _)| group).collect();
        let entities: Vec<SearchEntity> = self
            .ranker
            .merge(&groups, request.sort.as_ref(), window)
            .into_iter()
            .skip(request.from)
            .take(request.size)
            .map(SearchEntity::from)
            .collect();

        debug!(
            ranker = self.ranker.id(),
            num_entities,
            returned = entities.len(),
            "search executed"
        );
        Ok(SearchResult {
            num_entities,
            from: request.from,
            page_size: request.size,
            entities,
        })
    }

    /// Drop every cached result. Call after any backend write becomes visible.
    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}
