//! Entity document-count cache.
//!
//! Counts are fetched from the backend on demand and kept for a fixed TTL.
//! Expiry is lazy: entries are checked when read, never swept. Failed backend
//! calls are not cached.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::backend::{BackendResult, SearchBackend};
use super::error::SearchError;

/// Time source, injectable so expiry can be tested without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    offset: RwLock<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: RwLock::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.write() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.offset.read()
    }
}

#[derive(Debug, Clone, Copy)]
struct CountEntry {
    count: u64,
    cached_at: Instant,
}

#[derive(Debug, Default)]
pub struct DocCountStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
}

impl DocCountStats {
    /// Current stats as `(hits, misses)`.
    pub fn get(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

pub struct EntityDocCountCache {
    backend: Arc<dyn SearchBackend>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entries: RwLock<HashMap<String, CountEntry>>,
    stats: DocCountStats,
}

impl EntityDocCountCache {
    pub fn new(backend: Arc<dyn SearchBackend>, ttl: Duration) -> Self {
        Self::with_clock(backend, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(backend: Arc<dyn SearchBackend>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            ttl,
            entries: RwLock::new(HashMap::new()),
            stats: DocCountStats::default(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn live(&self, entity_type: &str, now: Instant) -> Option<u64> {
        let entries = self.entries.read();
        let entry = entries.get(entity_type)?;
        (now.saturating_duration_since(entry.cached_at) < self.ttl).then_some(entry.count)
    }

    /// Document count for `entity_type`, from cache while fresh.
    ///
    /// The backend call on a miss runs without holding the map lock, so a slow
    /// count for one entity type never blocks lookups for another.
    pub fn count(&self, entity_type: &str) -> BackendResult<u64> {
        if let Some(count) = self.live(entity_type, self.clock.now()) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(count);
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);

        let count = self.backend.doc_count(entity_type).inspect_err(|e| {
            warn!(entity_type, error = %e, "doc count lookup failed");
        })?;
        let cached_at = self.clock.now();
        self.entries
            .write()
            .insert(entity_type.to_string(), CountEntry { count, cached_at });
        debug!(entity_type, count, "doc count cached");
        Ok(count)
    }

    /// Counts for several entity types. Fails on the first backend error.
    pub fn counts(&self, entity_types: &[String]) -> BackendResult<BTreeMap<String, u64>> {
        entity_types
            .iter()
            .map(|t| self.count(t).map(|c| (t.clone(), c)))
            .collect()
    }

    /// The entity types with at least one document, input order preserved.
    pub fn non_empty(&self, entity_types: &[String]) -> Result<Vec<String>, SearchError> {
        let mut out = Vec::with_capacity(entity_types.len());
        for entity_type in entity_types {
            let count = self
                .count(entity_type)
                .map_err(|e| SearchError::backend(entity_type.clone(), e))?;
            if count > 0 {
                out.push(entity_type.clone());
            }
        }
        Ok(out)
    }

    pub fn invalidate(&self, entity_type: &str) {
        self.entries.write().remove(entity_type);
    }

    pub fn invalidate_all(&self) {
        self.entries.write().clear();
    }

    pub fn stats(&self) -> &DocCountStats {
        &self.stats
    }
}

impl std::fmt::Debug for EntityDocCountCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityDocCountCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.read().len())
            .finish_non_exhaustive()
    }
}
