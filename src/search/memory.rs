//! In-process [`SearchBackend`] over JSON documents.
//!
//! Used by tests and the CLI in place of a real search cluster. Matching is a
//! plain token-overlap model, not a relevance engine:
//!
//! - **Full-text**: the query and every string value in a document are
//!   lower-cased and split on non-alphanumeric characters. A document matches
//!   when it shares at least one token with the query; its score is the
//!   fraction of query tokens it contains.
//! - **Structured**: a document matches when some string value equals the
//!   query (case-insensitively).
//! - `*` or an empty query matches every document with score `1.0`.
//!
//! Hits are ordered by score descending, then doc id ascending, unless a sort
//! criterion is given.
//!
//! With [`RefreshPolicy::OnSync`] writes are buffered until [`MemoryBackend::sync`],
//! modelling the refresh interval of a real index.

use parking_lot::RwLock;
use serde_json::Value;
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, trace};

use super::backend::{BackendError, BackendPage, BackendResult, SearchBackend};
use super::document::{compare_sort_keys, field_values, string_values};
use super::query::BackendQuery;
use crate::model::{ScoredHit, SortCriterion, Urn};

/// When writes become visible to queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshPolicy {
    #[default]
    Immediate,
    /// Buffered until [`MemoryBackend::sync`].
    OnSync,
}

#[derive(Debug, Clone)]
enum PendingWrite {
    Upsert {
        entity_type: String,
        doc_id: String,
        doc: Value,
    },
    Delete {
        entity_type: String,
        doc_id: String,
    },
    Clear,
}

#[derive(Debug, Default)]
struct State {
    /// entity type -> doc id -> document
    indices: HashMap<String, BTreeMap<String, Value>>,
    pending: Vec<PendingWrite>,
}

impl State {
    fn apply(&mut self, write: PendingWrite) {
        match write {
            PendingWrite::Upsert {
                entity_type,
                doc_id,
                doc,
            } => {
                self.indices.entry(entity_type).or_default().insert(doc_id, doc);
            }
            PendingWrite::Delete {
                entity_type,
                doc_id,
            } => {
                if let Some(index) = self.indices.get_mut(&entity_type) {
                    index.remove(&doc_id);
                }
            }
            PendingWrite::Clear => self.indices.clear(),
        }
    }

    /// Whether the document exists once all buffered writes are applied.
    fn will_exist(&self, entity_type: &str, doc_id: &str) -> bool {
        for write in self.pending.iter().rev() {
            match write {
                PendingWrite::Upsert {
                    entity_type: t,
                    doc_id: id,
                    ..
                } if t == entity_type && id == doc_id => return true,
                PendingWrite::Delete {
                    entity_type: t,
                    doc_id: id,
                } if t == entity_type && id == doc_id => return false,
                PendingWrite::Clear => return false,
                _ => {}
            }
        }
        self.indices
            .get(entity_type)
            .is_some_and(|index| index.contains_key(doc_id))
    }
}

/// Per-operation call counters.
#[derive(Debug, Default)]
pub struct BackendCalls {
    pub queries: AtomicU64,
    pub doc_counts: AtomicU64,
    pub writes: AtomicU64,
}

impl BackendCalls {
    /// Current counters as `(queries, doc_counts, writes)`.
    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.queries.load(Ordering::Relaxed),
            self.doc_counts.load(Ordering::Relaxed),
            self.writes.load(Ordering::Relaxed),
        )
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<State>,
    policy: RefreshPolicy,
    unavailable: AtomicBool,
    calls: BackendCalls,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_refresh_policy(policy: RefreshPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Make buffered writes visible.
    pub fn sync(&self) {
        let mut state = self.state.write();
        let pending = std::mem::take(&mut state.pending);
        let applied = pending.len();
        for write in pending {
            state.apply(write);
        }
        debug!(applied, "memory backend synced");
    }

    /// Simulate an outage: every operation fails with [`BackendError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn calls(&self) -> &BackendCalls {
        &self.calls
    }

    fn check_available(&self) -> BackendResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("memory backend marked down".into()));
        }
        Ok(())
    }

    fn write(&self, write: PendingWrite) {
        self.calls.writes.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.write();
        match self.policy {
            RefreshPolicy::Immediate => state.apply(write),
            RefreshPolicy::OnSync => state.pending.push(write),
        }
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn is_match_all(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || text == "*"
}

/// Score and matched fields for one document, or `None` when it does not match the text.
fn score_document(doc: &Value, text: &str, fulltext: bool) -> Option<(f64, Vec<String>)> {
    if is_match_all(text) {
        return Some((1.0, Vec::new()));
    }

    let mut matched_fields = BTreeSet::new();
    if !fulltext {
        let needle = text.trim().to_lowercase();
        for (field, value) in string_values(doc) {
            if value.to_lowercase() == needle {
                matched_fields.insert(field.to_string());
            }
        }
        return (!matched_fields.is_empty()).then(|| (1.0, matched_fields.into_iter().collect()));
    }

    let query_tokens: BTreeSet<String> = tokenize(text).into_iter().collect();
    if query_tokens.is_empty() {
        return Some((1.0, Vec::new()));
    }
    let mut matched_tokens = BTreeSet::new();
    for (field, value) in string_values(doc) {
        for token in tokenize(value) {
            if query_tokens.contains(&token) {
                matched_tokens.insert(token);
                matched_fields.insert(field.to_string());
            }
        }
    }
    if matched_tokens.is_empty() {
        return None;
    }
    let score = matched_tokens.len() as f64 / query_tokens.len() as f64;
    Some((score, matched_fields.into_iter().collect()))
}

struct Candidate {
    doc_id: String,
    hit: ScoredHit,
}

fn order_candidates(candidates: &mut [Candidate], sort: Option<&SortCriterion>) {
    candidates.sort_by(|a, b| {
        let primary = match sort {
            Some(sort) => compare_sort_keys(
                a.hit.sort_key.as_deref(),
                b.hit.sort_key.as_deref(),
                sort.order,
            ),
            None => b
                .hit
                .score
                .partial_cmp(&a.hit.score)
                .unwrap_or(CmpOrdering::Equal),
        };
        primary.then_with(|| a.doc_id.cmp(&b.doc_id))
    });
}

impl SearchBackend for MemoryBackend {
    fn execute_query(
        &self,
        entity_type: &str,
        query: &BackendQuery,
        from: usize,
        size: usize,
    ) -> BackendResult<BackendPage> {
        self.check_available()?;
        self.calls.queries.fetch_add(1, Ordering::Relaxed);

        let state = self.state.read();
        let Some(index) = state.indices.get(entity_type) else {
            return Ok(BackendPage::default());
        };

        let mut candidates: Vec<Candidate> = index
            .iter()
            .filter(|(_, doc)| query.filter.matches(doc))
            .filter_map(|(doc_id, doc)| {
                let (score, matched_fields) = score_document(doc, &query.text, query.fulltext)?;
                let urn = doc
                    .get("urn")
                    .and_then(Value::as_str)
                    .map_or_else(|| Urn::new(doc_id.clone()), Urn::from);
                let sort_key = query
                    .sort
                    .as_ref()
                    .and_then(|s| field_values(doc, &s.field).into_iter().next());
                Some(Candidate {
                    doc_id: doc_id.clone(),
                    hit: ScoredHit {
                        urn,
                        entity_type: entity_type.to_string(),
                        score,
                        sort_key,
                        matched_fields,
                    },
                })
            })
            .collect();

        order_candidates(&mut candidates, query.sort.as_ref());
        let total = candidates.len() as u64;
        let hits = candidates
            .into_iter()
            .skip(from)
            .take(size)
            .map(|c| c.hit)
            .collect::<Vec<_>>();
        trace!(entity_type, total, returned = hits.len(), "memory backend query");
        Ok(BackendPage { total, hits })
    }

    fn doc_count(&self, entity_type: &str) -> BackendResult<u64> {
        self.check_available()?;
        self.calls.doc_counts.fetch_add(1, Ordering::Relaxed);
        let state = self.state.read();
        Ok(state
            .indices
            .get(entity_type)
            .map_or(0, |index| index.len() as u64))
    }

    fn upsert_document(
        &self,
        entity_type: &str,
        document_json: &str,
        doc_id: &str,
    ) -> BackendResult<()> {
        self.check_available()?;
        let doc: Value =
            serde_json::from_str(document_json).map_err(|e| BackendError::InvalidDocument {
                doc_id: doc_id.to_string(),
                reason: e.to_string(),
            })?;
        if !doc.is_object() {
            return Err(BackendError::InvalidDocument {
                doc_id: doc_id.to_string(),
                reason: "document must be a JSON object".into(),
            });
        }
        self.write(PendingWrite::Upsert {
            entity_type: entity_type.to_string(),
            doc_id: doc_id.to_string(),
            doc,
        });
        Ok(())
    }

    fn delete_document(&self, entity_type: &str, doc_id: &str) -> BackendResult<()> {
        self.check_available()?;
        if !self.state.read().will_exist(entity_type, doc_id) {
            debug!(entity_type, doc_id, "delete of absent document ignored");
            return Ok(());
        }
        self.write(PendingWrite::Delete {
            entity_type: entity_type.to_string(),
            doc_id: doc_id.to_string(),
        });
        Ok(())
    }

    fn refresh(&self) -> BackendResult<()> {
        self.check_available()?;
        self.sync();
        Ok(())
    }

    fn clear(&self) -> BackendResult<()> {
        self.check_available()?;
        self.write(PendingWrite::Clear);
        Ok(())
    }
}
