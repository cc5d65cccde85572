//! Cross-entity result merging.
//!
//! Each entity type's index returns its own ordered hit list. A [`Ranker`]
//! merges those lists into one globally ordered list. Every ranker here is
//! deterministic: ties are broken by entity-type declaration order, then by
//! the hit's rank within its own list, so arrival order of the per-entity
//! queries never leaks into the output.

use clap::ValueEnum;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

use super::document::compare_sort_keys;
use crate::model::{ScoredHit, SortCriterion};

/// Hits from one entity type, already in that index's order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityHits {
    pub entity_type: String,
    pub hits: Vec<ScoredHit>,
}

impl EntityHits {
    pub fn new(entity_type: impl Into<String>, hits: Vec<ScoredHit>) -> Self {
        Self {
            entity_type: entity_type.into(),
            hits,
        }
    }
}

/// Merges per-entity hit lists.
///
/// `per_entity` is given in entity-type declaration order.
pub trait Ranker: Send + Sync {
    fn merge(
        &self,
        per_entity: &[EntityHits],
        sort: Option<&SortCriterion>,
        limit: usize,
    ) -> Vec<ScoredHit>;

    fn id(&self) -> &str;
}

/// Global order by score (or by sort key when a sort criterion is present).
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreRanker;

impl Ranker for ScoreRanker {
    fn merge(
        &self,
        per_entity: &[EntityHits],
        sort: Option<&SortCriterion>,
        limit: usize,
    ) -> Vec<ScoredHit> {
        per_entity
            .iter()
            .enumerate()
            .flat_map(|(entity_idx, group)| {
                group
                    .hits
                    .iter()
                    .enumerate()
                    .map(move |(rank, hit)| (entity_idx, rank, hit))
            })
            .sorted_by(|(ea, ra, a), (eb, rb, b)| {
                let primary = match sort {
                    Some(sort) => {
                        compare_sort_keys(a.sort_key.as_deref(), b.sort_key.as_deref(), sort.order)
                    }
                    None => b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal),
                };
                primary.then(ea.cmp(eb)).then(ra.cmp(rb))
            })
            .take(limit)
            .map(|(_, _, hit)| hit.clone())
            .collect()
    }

    fn id(&self) -> &str {
        "score"
    }
}

/// One hit per entity type per round, in declaration order.
///
/// Ignores scores across entity types entirely, so no type can be starved by
/// another type's larger scores.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobinRanker;

impl Ranker for RoundRobinRanker {
    fn merge(
        &self,
        per_entity: &[EntityHits],
        _sort: Option<&SortCriterion>,
        limit: usize,
    ) -> Vec<ScoredHit> {
        let rounds = per_entity.iter().map(|g| g.hits.len()).max().unwrap_or(0);
        (0..rounds)
            .flat_map(|round| per_entity.iter().filter_map(move |g| g.hits.get(round)))
            .take(limit)
            .cloned()
            .collect()
    }

    fn id(&self) -> &str {
        "round_robin"
    }
}

/// Configurable ranker selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RankerKind {
    #[default]
    Score,
    #[value(alias = "round_robin")]
    RoundRobin,
}

impl RankerKind {
    pub fn build(self) -> Arc<dyn Ranker> {
        match self {
            RankerKind::Score => Arc::new(ScoreRanker),
            RankerKind::RoundRobin => Arc::new(RoundRobinRanker),
        }
    }
}

impl std::str::FromStr for RankerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "score" => Ok(RankerKind::Score),
            "round_robin" | "roundrobin" => Ok(RankerKind::RoundRobin),
            other => Err(format!("unknown ranker `{other}` (expected score or round_robin)")),
        }
    }
}

impl std::fmt::Display for RankerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RankerKind::Score => write!(f, "score"),
            RankerKind::RoundRobin => write!(f, "round_robin"),
        }
    }
}
