//! Value types shared by the search pipeline.

use serde::{Deserialize, Serialize};

/// Unique resource name of a catalog entity. Opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Urn(String);

impl Urn {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Urn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Urn {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Urn {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Per-request search options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFlags {
    /// Relevance-ranked full-text matching instead of exact/structured matching.
    #[serde(default)]
    pub fulltext: bool,
    /// Bypass the result cache on both read and store.
    #[serde(default)]
    pub skip_cache: bool,
}

impl SearchFlags {
    pub fn fulltext() -> Self {
        Self {
            fulltext: true,
            skip_cache: false,
        }
    }

    pub fn structured() -> Self {
        Self::default()
    }

    pub fn with_skip_cache(mut self, skip_cache: bool) -> Self {
        self.skip_cache = skip_cache;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Optional field ordering applied instead of relevance order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortCriterion {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortCriterion {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Descending,
        }
    }
}

/// A single hit as returned by one entity type's index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredHit {
    pub urn: Urn,
    pub entity_type: String,
    pub score: f64,
    /// Canonical value of the sort field, present only when a sort criterion was applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEntity {
    pub entity: Urn,
    pub entity_type: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_fields: Vec<String>,
}

impl From<ScoredHit> for SearchEntity {
    fn from(hit: ScoredHit) -> Self {
        Self {
            entity: hit.urn,
            entity_type: hit.entity_type,
            score: hit.score,
            matched_fields: hit.matched_fields,
        }
    }
}

/// One page of a cross-entity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Total filtered match count across every queried entity type, not just this page.
    pub num_entities: u64,
    pub from: usize,
    pub page_size: usize,
    pub entities: Vec<SearchEntity>,
}

impl SearchResult {
    pub fn empty(from: usize, page_size: usize) -> Self {
        Self {
            num_entities: 0,
            from,
            page_size,
            entities: Vec::new(),
        }
    }

    pub fn urns(&self) -> Vec<&Urn> {
        self.entities.iter().map(|e| &e.entity).collect()
    }
}
