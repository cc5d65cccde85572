//! Command-line helpers: fixture loading and the compact filter syntax.
//!
//! A filter expression is one conjunction: clauses separated by `;`, each
//! `field OP values` where values are comma-separated.
//!
//! | Syntax | Condition |
//! |---|---|
//! | `f=a,b` | `EQUAL` |
//! | `f!=a` | negated `EQUAL` |
//! | `f~=a` | `CONTAIN` |
//! | `f^=a` | `START_WITH` |
//! | `f$=a` | `END_WITH` |
//! | `f>a` `f>=a` `f<a` `f<=a` | range |
//! | `f?` / `!f?` | `EXISTS` / negated `EXISTS` |
//!
//! A leading `!` on the field negates any clause. Repeating `--filter` ORs the
//! conjunctions together.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::search::filter::{Condition, ConjunctiveCriterion, Criterion, Filter};
use crate::search::SearchBackend;

/// One document in a fixture file.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureDocument {
    pub entity_type: String,
    pub id: String,
    pub document: serde_json::Value,
}

pub fn read_fixture(path: &Path) -> Result<Vec<FixtureDocument>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading fixture {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing fixture {}", path.display()))
}

/// Upsert every fixture document. Returns entity types in first-appearance order.
pub fn load_fixture(backend: &dyn SearchBackend, docs: &[FixtureDocument]) -> Result<Vec<String>> {
    let mut entity_types: Vec<String> = Vec::new();
    for doc in docs {
        backend
            .upsert_document(&doc.entity_type, &doc.document.to_string(), &doc.id)
            .with_context(|| format!("loading `{}` into `{}`", doc.id, doc.entity_type))?;
        if !entity_types.contains(&doc.entity_type) {
            entity_types.push(doc.entity_type.clone());
        }
    }
    debug!(documents = docs.len(), entity_types = entity_types.len(), "fixture loaded");
    Ok(entity_types)
}

/// Operators in match priority: longer tokens first so `!=` wins over `=`.
const OPERATORS: &[(&str, Condition, bool)] = &[
    ("!=", Condition::Equal, true),
    ("~=", Condition::Contain, false),
    ("^=", Condition::StartWith, false),
    ("$=", Condition::EndWith, false),
    (">=", Condition::GreaterThanOrEqualTo, false),
    ("<=", Condition::LessThanOrEqualTo, false),
    ("=", Condition::Equal, false),
    (">", Condition::GreaterThan, false),
    ("<", Condition::LessThan, false),
];

fn parse_clause(clause: &str) -> Result<Criterion> {
    let clause = clause.trim();
    let (negated, body) = match clause.strip_prefix('!') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, clause),
    };

    let Some((pos, op, condition, op_negated)) = OPERATORS
        .iter()
        .filter_map(|(op, cond, neg)| body.find(op).map(|pos| (pos, *op, *cond, *neg)))
        .min_by_key(|(pos, op, _, _)| (*pos, std::cmp::Reverse(op.len())))
    else {
        let Some(field) = body.strip_suffix('?').map(str::trim).filter(|f| !f.is_empty()) else {
            bail!("filter clause `{clause}` has no operator");
        };
        let criterion = Criterion::new(field, Condition::Exists, Vec::<String>::new());
        return Ok(if negated { criterion.negate() } else { criterion });
    };

    let field = body[..pos].trim();
    if field.is_empty() {
        bail!("filter clause `{clause}` has no field");
    }
    let values: Vec<String> = body[pos + op.len()..]
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();

    let criterion = Criterion::new(field, condition, values);
    Ok(if negated ^ op_negated { criterion.negate() } else { criterion })
}

/// Parse one `;`-separated conjunction.
pub fn parse_conjunction(expr: &str) -> Result<ConjunctiveCriterion> {
    let criteria = expr
        .split(';')
        .filter(|c| !c.trim().is_empty())
        .map(parse_clause)
        .collect::<Result<Vec<_>>>()?;
    Ok(ConjunctiveCriterion::new(criteria))
}

/// Build a filter from `--filter` expressions and an optional `--filter-json` document.
pub fn build_filter(exprs: &[String], json: Option<&str>) -> Result<Option<Filter>> {
    let mut conjunctions = exprs
        .iter()
        .map(|e| parse_conjunction(e))
        .collect::<Result<Vec<_>>>()?;
    if let Some(json) = json {
        let parsed: Filter = serde_json::from_str(json).context("parsing --filter-json")?;
        conjunctions.extend(parsed.conjunctions);
    }
    if conjunctions.is_empty() {
        return Ok(None);
    }
    Ok(Some(Filter::or(conjunctions)))
}
