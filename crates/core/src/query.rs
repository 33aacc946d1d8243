//! Store-neutral compiled query representation.
//!
//! The compiler lowers rule trees into this shape; record-store
//! implementations interpret it however their engine requires. The only
//! assumption is that the store supports AND/OR/NOT composition and the leaf
//! predicates below.

use serde::{Deserialize, Serialize};

/// A boolean-composable filter over record attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Matches every record; produced only by the explicit zero-rules path.
    Empty,
    Clause {
        field: String,
        predicate: FieldPredicate,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// AND-combine sub-filters; zero parts collapse to the no-op filter.
    pub fn all(mut parts: Vec<Filter>) -> Filter {
        match parts.len() {
            0 => Filter::Empty,
            1 => parts.remove(0),
            _ => Filter::And(parts),
        }
    }

    /// OR-combine sub-filters; zero parts collapse to the no-op filter.
    pub fn any(mut parts: Vec<Filter>) -> Filter {
        match parts.len() {
            0 => Filter::Empty,
            1 => parts.remove(0),
            _ => Filter::Or(parts),
        }
    }

    pub fn clause(field: impl Into<String>, predicate: FieldPredicate) -> Filter {
        Filter::Clause {
            field: field.into(),
            predicate,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Filter::Empty)
    }
}

/// Leaf predicate applied to a single record attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPredicate {
    Gt(serde_json::Value),
    Gte(serde_json::Value),
    Lt(serde_json::Value),
    Lte(serde_json::Value),
    Eq(serde_json::Value),
    Ne(serde_json::Value),
    /// Case-insensitive substring match; value is the literal needle.
    Matches(String),
    /// Inclusive two-sided range.
    Between(serde_json::Value, serde_json::Value),
    In(Vec<serde_json::Value>),
    Exists(bool),
}
