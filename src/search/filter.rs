//! Structured search filters.
//!
//! A [`Filter`] is a boolean expression in disjunctive normal form: an OR over
//! [`ConjunctiveCriterion`] groups, each an AND over [`Criterion`] leaves.
//!
//! Filters are evaluated two ways that must always agree:
//!
//! - [`Filter::matches`] evaluates directly against a JSON document.
//! - [`Filter::to_query`] translates into the backend [`QueryNode`] tree, which
//!   the backend executes (the in-memory backend evaluates it with
//!   [`QueryNode::matches`]).
//!
//! The wire shape follows the catalog's filter JSON:
//!
//! ```json
//! {"or": [{"and": [{"field": "platform", "condition": "EQUAL", "values": ["hive"], "negated": true}]}]}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use thiserror::Error;

use super::document::{compare_values, field_exists, field_values};
use super::query::{QueryNode, RangeOp};

/// Reasons a filter is rejected before any backend call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("criterion #{index} in conjunction #{conjunction} has an empty field name")]
    EmptyField { conjunction: usize, index: usize },

    #[error("condition {condition} on field `{field}` requires at least one value")]
    MissingValues { field: String, condition: Condition },

    #[error("condition {condition} on field `{field}` takes exactly one value, got {got}")]
    ExpectedSingleValue {
        field: String,
        condition: Condition,
        got: usize,
    },

    #[error("condition {condition} on field `{field}` takes no values")]
    UnexpectedValues { field: String, condition: Condition },
}

/// Per-field match condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Condition {
    #[default]
    Equal,
    In,
    Contain,
    StartWith,
    EndWith,
    Exists,
    IsNull,
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
}

impl Condition {
    fn operands(self) -> Operands {
        match self {
            Condition::Equal | Condition::In => Operands::Any,
            Condition::Contain | Condition::StartWith | Condition::EndWith => Operands::AtLeastOne,
            Condition::Exists | Condition::IsNull => Operands::None,
            Condition::GreaterThan
            | Condition::GreaterThanOrEqualTo
            | Condition::LessThan
            | Condition::LessThanOrEqualTo => Operands::ExactlyOne,
        }
    }

    fn range_op(self) -> Option<RangeOp> {
        match self {
            Condition::GreaterThan => Some(RangeOp::Gt),
            Condition::GreaterThanOrEqualTo => Some(RangeOp::Gte),
            Condition::LessThan => Some(RangeOp::Lt),
            Condition::LessThanOrEqualTo => Some(RangeOp::Lte),
            _ => None,
        }
    }

    /// Match one field of `doc` against `operands`, ignoring negation.
    fn matches(self, doc: &Value, field: &str, operands: &[String]) -> bool {
        match self {
            Condition::Equal | Condition::In => field_values(doc, field)
                .iter()
                .any(|v| operands.contains(v)),
            Condition::Contain => any_pair(doc, field, operands, |v, op| v.contains(op)),
            Condition::StartWith => any_pair(doc, field, operands, |v, op| v.starts_with(op)),
            Condition::EndWith => any_pair(doc, field, operands, |v, op| v.ends_with(op)),
            Condition::Exists => field_exists(doc, field),
            Condition::IsNull => !field_exists(doc, field),
            Condition::GreaterThan => compare_first(doc, field, operands, Ordering::is_gt),
            Condition::GreaterThanOrEqualTo => compare_first(doc, field, operands, Ordering::is_ge),
            Condition::LessThan => compare_first(doc, field, operands, Ordering::is_lt),
            Condition::LessThanOrEqualTo => compare_first(doc, field, operands, Ordering::is_le),
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Condition::Equal => "EQUAL",
            Condition::In => "IN",
            Condition::Contain => "CONTAIN",
            Condition::StartWith => "START_WITH",
            Condition::EndWith => "END_WITH",
            Condition::Exists => "EXISTS",
            Condition::IsNull => "IS_NULL",
            Condition::GreaterThan => "GREATER_THAN",
            Condition::GreaterThanOrEqualTo => "GREATER_THAN_OR_EQUAL_TO",
            Condition::LessThan => "LESS_THAN",
            Condition::LessThanOrEqualTo => "LESS_THAN_OR_EQUAL_TO",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operands {
    Any,
    AtLeastOne,
    ExactlyOne,
    None,
}

fn any_pair(doc: &Value, field: &str, operands: &[String], pred: impl Fn(&str, &str) -> bool) -> bool {
    field_values(doc, field)
        .iter()
        .any(|v| operands.iter().any(|op| pred(v, op)))
}

fn compare_first(
    doc: &Value,
    field: &str,
    operands: &[String],
    accept: impl Fn(Ordering) -> bool,
) -> bool {
    let Some(bound) = operands.first() else {
        return false;
    };
    field_values(doc, field)
        .iter()
        .any(|v| accept(compare_values(v, bound)))
}

/// A single field condition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Criterion {
    pub field: String,
    #[serde(default)]
    pub condition: Condition,
    /// Deprecated scalar operand; only consulted when `values` is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub negated: bool,
}

impl Criterion {
    pub fn new<I, S>(field: impl Into<String>, condition: Condition, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field: field.into(),
            condition,
            value: None,
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    /// `field` equals any of `values`.
    pub fn equal<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(field, Condition::Equal, values)
    }

    /// Construct with only the legacy scalar operand set.
    pub fn legacy(field: impl Into<String>, condition: Condition, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            condition,
            value: Some(value.into()),
            values: Vec::new(),
            negated: false,
        }
    }

    /// Flip inclusion. Candidate selection is unaffected.
    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Operands after resolving the `value` / `values` alias.
    pub fn effective_values(&self) -> Vec<String> {
        if !self.values.is_empty() {
            return self.values.clone();
        }
        match &self.value {
            Some(v) if !v.is_empty() => vec![v.clone()],
            _ => Vec::new(),
        }
    }

    pub fn matches(&self, doc: &Value) -> bool {
        let hit = self
            .condition
            .matches(doc, &self.field, &self.effective_values());
        hit != self.negated
    }

    /// Translation of the positive (non-negated) condition.
    fn positive_query(&self) -> QueryNode {
        let values = self.effective_values();
        let field = self.field.clone();
        match self.condition {
            Condition::Equal | Condition::In if values.is_empty() => QueryNode::MatchNone,
            Condition::Equal | Condition::In => QueryNode::Terms { field, values },
            Condition::Contain => QueryNode::Wildcard { field, values },
            Condition::StartWith => QueryNode::Prefix { field, values },
            Condition::EndWith => QueryNode::Suffix { field, values },
            Condition::Exists => QueryNode::Exists { field },
            Condition::IsNull => QueryNode::Bool {
                must: Vec::new(),
                should: Vec::new(),
                must_not: vec![QueryNode::Exists { field }],
            },
            condition => match (condition.range_op(), values.into_iter().next()) {
                (Some(op), Some(value)) => QueryNode::Range { field, op, value },
                _ => QueryNode::MatchNone,
            },
        }
    }

    fn validate(&self, conjunction: usize, index: usize) -> Result<(), FilterError> {
        if self.field.trim().is_empty() {
            return Err(FilterError::EmptyField { conjunction, index });
        }
        let got = self.effective_values().len();
        let field = self.field.clone();
        let condition = self.condition;
        match condition.operands() {
            Operands::Any => Ok(()),
            Operands::AtLeastOne if got == 0 => Err(FilterError::MissingValues { field, condition }),
            Operands::ExactlyOne if got != 1 => Err(FilterError::ExpectedSingleValue {
                field,
                condition,
                got,
            }),
            Operands::None if got != 0 => Err(FilterError::UnexpectedValues { field, condition }),
            _ => Ok(()),
        }
    }
}

/// Criteria that must all hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConjunctiveCriterion {
    #[serde(rename = "and", default)]
    pub criteria: Vec<Criterion>,
}

impl ConjunctiveCriterion {
    pub fn new(criteria: impl IntoIterator<Item = Criterion>) -> Self {
        Self {
            criteria: criteria.into_iter().collect(),
        }
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.criteria.iter().all(|c| c.matches(doc))
    }

    fn to_query(&self) -> QueryNode {
        let mut must = Vec::new();
        let mut must_not = Vec::new();
        for criterion in &self.criteria {
            let node = criterion.positive_query();
            if criterion.negated {
                must_not.push(node);
            } else {
                must.push(node);
            }
        }
        // A non-negated empty EQUAL sinks the whole group.
        if must.iter().any(|n| matches!(n, QueryNode::MatchNone)) {
            return QueryNode::MatchNone;
        }
        match (must.len(), must_not.len()) {
            (0, 0) => QueryNode::MatchAll,
            (1, 0) => must.remove(0),
            _ => QueryNode::Bool {
                must,
                should: Vec::new(),
                must_not,
            },
        }
    }
}

/// Disjunction of conjunctions. An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filter {
    #[serde(rename = "or", default)]
    pub conjunctions: Vec<ConjunctiveCriterion>,
}

impl Filter {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn or(conjunctions: impl IntoIterator<Item = ConjunctiveCriterion>) -> Self {
        Self {
            conjunctions: conjunctions.into_iter().collect(),
        }
    }

    /// Single-conjunction filter.
    pub fn and(criteria: impl IntoIterator<Item = Criterion>) -> Self {
        Self::or([ConjunctiveCriterion::new(criteria)])
    }

    pub fn is_empty(&self) -> bool {
        self.conjunctions.is_empty()
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.is_empty() || self.conjunctions.iter().any(|c| c.matches(doc))
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        for (ci, conjunction) in self.conjunctions.iter().enumerate() {
            for (ki, criterion) in conjunction.criteria.iter().enumerate() {
                criterion.validate(ci, ki)?;
            }
        }
        Ok(())
    }

    /// Translate into the backend query tree.
    pub fn to_query(&self) -> QueryNode {
        if self.is_empty() {
            return QueryNode::MatchAll;
        }
        let mut should: Vec<QueryNode> = self
            .conjunctions
            .iter()
            .map(ConjunctiveCriterion::to_query)
            .filter(|n| !matches!(n, QueryNode::MatchNone))
            .collect();
        if should.iter().any(|n| matches!(n, QueryNode::MatchAll)) {
            return QueryNode::MatchAll;
        }
        match should.len() {
            0 => QueryNode::MatchNone,
            1 => should.remove(0),
            _ => QueryNode::Bool {
                must: Vec::new(),
                should,
                must_not: Vec::new(),
            },
        }
    }
}

/// Translation of an optional filter; absence means no filtering.
pub fn query_for(filter: Option<&Filter>) -> QueryNode {
    filter.map_or(QueryNode::MatchAll, Filter::to_query)
}
