//! Backend query tree.
//!
//! [`QueryNode`] is the translated form of a [`Filter`](super::filter::Filter)
//! handed to a [`SearchBackend`](super::backend::SearchBackend). It mirrors the
//! shape of an Elasticsearch/OpenSearch bool query closely enough that a real
//! adapter can emit it with [`QueryNode::to_dsl`], while remaining directly
//! evaluable for in-process backends.

use serde_json::{Map, Value, json};
use std::cmp::Ordering;

use super::document::{compare_values, field_exists, field_values};
use crate::model::SortCriterion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl RangeOp {
    fn as_str(self) -> &'static str {
        match self {
            RangeOp::Gt => "gt",
            RangeOp::Gte => "gte",
            RangeOp::Lt => "lt",
            RangeOp::Lte => "lte",
        }
    }

    fn accepts(self, ord: Ordering) -> bool {
        match self {
            RangeOp::Gt => ord.is_gt(),
            RangeOp::Gte => ord.is_ge(),
            RangeOp::Lt => ord.is_lt(),
            RangeOp::Lte => ord.is_le(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryNode {
    MatchAll,
    MatchNone,
    /// Field equals any of the values.
    Terms { field: String, values: Vec<String> },
    /// Field starts with any of the values.
    Prefix { field: String, values: Vec<String> },
    /// Field ends with any of the values.
    Suffix { field: String, values: Vec<String> },
    /// Field contains any of the values.
    Wildcard { field: String, values: Vec<String> },
    Exists { field: String },
    Range {
        field: String,
        op: RangeOp,
        value: String,
    },
    /// All `must`, none of `must_not`, and at least one `should` when `should` is non-empty.
    Bool {
        must: Vec<QueryNode>,
        should: Vec<QueryNode>,
        must_not: Vec<QueryNode>,
    },
}

impl QueryNode {
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            QueryNode::MatchAll => true,
            QueryNode::MatchNone => false,
            QueryNode::Terms { field, values } => {
                field_values(doc, field).iter().any(|v| values.contains(v))
            }
            QueryNode::Prefix { field, values } => {
                any_value(doc, field, values, |v, p| v.starts_with(p))
            }
            QueryNode::Suffix { field, values } => {
                any_value(doc, field, values, |v, s| v.ends_with(s))
            }
            QueryNode::Wildcard { field, values } => {
                any_value(doc, field, values, |v, s| v.contains(s))
            }
            QueryNode::Exists { field } => field_exists(doc, field),
            QueryNode::Range { field, op, value } => field_values(doc, field)
                .iter()
                .any(|v| op.accepts(compare_values(v, value))),
            QueryNode::Bool {
                must,
                should,
                must_not,
            } => {
                must.iter().all(|n| n.matches(doc))
                    && !must_not.iter().any(|n| n.matches(doc))
                    && (should.is_empty() || should.iter().any(|n| n.matches(doc)))
            }
        }
    }

    /// Render as Elasticsearch query DSL.
    pub fn to_dsl(&self) -> Value {
        match self {
            QueryNode::MatchAll => json!({"match_all": {}}),
            QueryNode::MatchNone => json!({"match_none": {}}),
            QueryNode::Terms { field, values } => json!({"terms": {field.as_str(): values}}),
            QueryNode::Prefix { field, values } => any_of(
                values
                    .iter()
                    .map(|v| json!({"prefix": {field.as_str(): v}}))
                    .collect(),
            ),
            QueryNode::Suffix { field, values } => any_of(
                values
                    .iter()
                    .map(|v| json!({"wildcard": {field.as_str(): format!("*{}", escape_wildcard(v))}}))
                    .collect(),
            ),
            QueryNode::Wildcard { field, values } => any_of(
                values
                    .iter()
                    .map(|v| json!({"wildcard": {field.as_str(): format!("*{}*", escape_wildcard(v))}}))
                    .collect(),
            ),
            QueryNode::Exists { field } => json!({"exists": {"field": field}}),
            QueryNode::Range { field, op, value } => {
                json!({"range": {field.as_str(): {op.as_str(): value}}})
            }
            QueryNode::Bool {
                must,
                should,
                must_not,
            } => {
                let mut body = Map::new();
                let render = |nodes: &[QueryNode]| -> Value {
                    Value::Array(nodes.iter().map(QueryNode::to_dsl).collect())
                };
                if !must.is_empty() {
                    body.insert("filter".into(), render(must));
                }
                if !should.is_empty() {
                    body.insert("should".into(), render(should));
                    body.insert("minimum_should_match".into(), json!(1));
                }
                if !must_not.is_empty() {
                    body.insert("must_not".into(), render(must_not));
                }
                json!({"bool": Value::Object(body)})
            }
        }
    }
}

fn any_value(doc: &Value, field: &str, values: &[String], pred: impl Fn(&str, &str) -> bool) -> bool {
    field_values(doc, field)
        .iter()
        .any(|v| values.iter().any(|p| pred(v, p)))
}

fn any_of(clauses: Vec<Value>) -> Value {
    if clauses.len() == 1 {
        return clauses.into_iter().next().unwrap_or(Value::Null);
    }
    json!({"bool": {"should": clauses, "minimum_should_match": 1}})
}

fn escape_wildcard(value: &str) -> String {
    value.replace('\\', "\\\\").replace('*', "\\*").replace('?', "\\?")
}

/// Everything a backend needs to run one entity type's query.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendQuery {
    pub text: String,
    pub fulltext: bool,
    pub filter: QueryNode,
    pub sort: Option<SortCriterion>,
}

impl BackendQuery {
    pub fn new(text: impl Into<String>, fulltext: bool, filter: QueryNode) -> Self {
        Self {
            text: text.into(),
            fulltext,
            filter,
            sort: None,
        }
    }

    pub fn with_sort(mut self, sort: Option<SortCriterion>) -> Self {
        self.sort = sort;
        self
    }
}
