//! The rule DSL: the closed operator set, canonical leaf rules, and the
//! logic tree persisted on segments.
//!
//! Operator tokens arrive from callers in several historical vocabularies
//! (symbols, store-native `$` tokens, English words). All of them funnel
//! through [`OperatorToken::from_str`], the single parse site; internal code
//! only ever matches on the enum.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AudienceError;

/// Closed set of comparison operators understood by the query compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatorToken {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Neq,
    Contains,
    Between,
    In,
    Exists,
    NotExists,
}

impl OperatorToken {
    /// Canonical spelling, as persisted in segment rule trees.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorToken::Gt => "GT",
            OperatorToken::Lt => "LT",
            OperatorToken::Gte => "GTE",
            OperatorToken::Lte => "LTE",
            OperatorToken::Eq => "EQ",
            OperatorToken::Neq => "NEQ",
            OperatorToken::Contains => "CONTAINS",
            OperatorToken::Between => "BETWEEN",
            OperatorToken::In => "IN",
            OperatorToken::Exists => "EXISTS",
            OperatorToken::NotExists => "NOT_EXISTS",
        }
    }

    /// Existence checks are the only operators that take no value.
    pub fn requires_value(&self) -> bool {
        !matches!(self, OperatorToken::Exists | OperatorToken::NotExists)
    }
}

impl std::fmt::Display for OperatorToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatorToken {
    type Err = AudienceError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let clean = token.trim();

        // Store-native tokens use a fixed dollar table; unknown $-tokens are
        // rejected here rather than passed downstream.
        if let Some(rest) = clean.strip_prefix('$') {
            return match rest.to_ascii_lowercase().as_str() {
                "gt" => Ok(OperatorToken::Gt),
                "lt" => Ok(OperatorToken::Lt),
                "gte" => Ok(OperatorToken::Gte),
                "lte" => Ok(OperatorToken::Lte),
                "eq" => Ok(OperatorToken::Eq),
                "ne" => Ok(OperatorToken::Neq),
                "in" => Ok(OperatorToken::In),
                "exists" => Ok(OperatorToken::Exists),
                "regex" | "contains" => Ok(OperatorToken::Contains),
                _ => Err(AudienceError::UnsupportedOperator(clean.to_string())),
            };
        }

        match clean.to_ascii_lowercase().as_str() {
            ">" | "gt" | "over" | "more" => Ok(OperatorToken::Gt),
            "<" | "lt" | "under" | "less" => Ok(OperatorToken::Lt),
            ">=" | "gte" => Ok(OperatorToken::Gte),
            "<=" | "lte" => Ok(OperatorToken::Lte),
            "=" | "==" | "eq" | "equals" => Ok(OperatorToken::Eq),
            "!=" | "ne" | "neq" | "not_equals" => Ok(OperatorToken::Neq),
            "contains" | "like" => Ok(OperatorToken::Contains),
            "between" => Ok(OperatorToken::Between),
            "in" => Ok(OperatorToken::In),
            "exists" => Ok(OperatorToken::Exists),
            "not_exists" | "not exists" | "notexists" => Ok(OperatorToken::NotExists),
            _ => Err(AudienceError::UnsupportedOperator(clean.to_string())),
        }
    }
}

/// A normalized leaf predicate: the one rule shape downstream code sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRule {
    pub field: String,
    pub operator: OperatorToken,
    /// Absent only for existence checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl CanonicalRule {
    pub fn new(
        field: impl Into<String>,
        operator: OperatorToken,
        value: Option<serde_json::Value>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}

/// The persisted logic tree over [`CanonicalRule`] leaves.
///
/// Serializes with the historical `op` tag (`{"op":"COND",...}`,
/// `{"op":"AND","children":[...]}`). `Empty` is the explicit zero-rules
/// sentinel: it compiles to a no-op filter and is never produced by an error
/// path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "UPPERCASE")]
pub enum RuleNode {
    Cond {
        field: String,
        operator: OperatorToken,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<serde_json::Value>,
    },
    And {
        children: Vec<RuleNode>,
    },
    Or {
        children: Vec<RuleNode>,
    },
    Not {
        child: Box<RuleNode>,
    },
    Empty,
}

impl RuleNode {
    pub fn cond(rule: CanonicalRule) -> Self {
        RuleNode::Cond {
            field: rule.field,
            operator: rule.operator,
            value: rule.value,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RuleNode::Empty)
    }

    /// Number of `Cond` leaves reachable from this node.
    pub fn leaf_count(&self) -> usize {
        match self {
            RuleNode::Cond { .. } => 1,
            RuleNode::And { children } | RuleNode::Or { children } => {
                children.iter().map(RuleNode::leaf_count).sum()
            }
            RuleNode::Not { child } => child.leaf_count(),
            RuleNode::Empty => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // 1. Token parsing ------------------------------------------------------

    #[test]
    fn test_symbol_dollar_and_word_tokens_agree() {
        for spelling in [">", "$gt", "gt", "GT", "over"] {
            assert_eq!(
                spelling.parse::<OperatorToken>().unwrap(),
                OperatorToken::Gt,
                "spelling {spelling:?}"
            );
        }
        for spelling in ["<", "$lt", "under", "less"] {
            assert_eq!(spelling.parse::<OperatorToken>().unwrap(), OperatorToken::Lt);
        }
    }

    #[test]
    fn test_double_equals_folds_to_eq() {
        assert_eq!("==".parse::<OperatorToken>().unwrap(), OperatorToken::Eq);
        assert_eq!("=".parse::<OperatorToken>().unwrap(), OperatorToken::Eq);
    }

    #[test]
    fn test_unknown_tokens_rejected() {
        assert!("~=".parse::<OperatorToken>().is_err());
        assert!("$near".parse::<OperatorToken>().is_err());
        assert!(matches!(
            "frobnicate".parse::<OperatorToken>(),
            Err(AudienceError::UnsupportedOperator(t)) if t == "frobnicate"
        ));
    }

    // 2. Tree serialization -------------------------------------------------

    #[test]
    fn test_rule_node_wire_shape() {
        let node = RuleNode::And {
            children: vec![RuleNode::Cond {
                field: "total_spend".into(),
                operator: OperatorToken::Gt,
                value: Some(json!(10_000)),
            }],
        };
        let wire = serde_json::to_value(&node).unwrap();
        assert_eq!(wire["op"], "AND");
        assert_eq!(wire["children"][0]["op"], "COND");
        assert_eq!(wire["children"][0]["operator"], "GT");

        let back: RuleNode = serde_json::from_value(wire).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_leaf_count() {
        let node = RuleNode::Or {
            children: vec![
                RuleNode::cond(CanonicalRule::new("visits", OperatorToken::Lt, Some(json!(5)))),
                RuleNode::Not {
                    child: Box::new(RuleNode::cond(CanonicalRule::new(
                        "email",
                        OperatorToken::Exists,
                        None,
                    ))),
                },
            ],
        };
        assert_eq!(node.leaf_count(), 2);
        assert_eq!(RuleNode::Empty.leaf_count(), 0);
    }
}
