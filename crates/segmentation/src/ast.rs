//! Logic-tree construction.
//!
//! Two explicit constructor paths ([`from_flat_rules`], [`from_tree`]) plus
//! [`ingest`], the one compatibility adapter that still sniffs the legacy
//! payload shape (flat rule list vs. pre-built tagged tree). New callers
//! should state which shape they hold and call the constructor directly.

use audience_core::error::{AudienceError, AudienceResult};
use audience_core::rules::{CanonicalRule, RuleNode};
use serde_json::Value;

use crate::normalizer::{normalize_rule, normalize_rules};

/// Wrap a flat list of canonical rules into a logic tree.
///
/// Zero rules produce the explicit [`RuleNode::Empty`] sentinel (a no-op
/// filter, not an error); one rule stays a bare `Cond`; several rules are
/// combined with an implicit AND. There is no implicit OR.
pub fn from_flat_rules(rules: Vec<CanonicalRule>) -> RuleNode {
    let mut conds: Vec<RuleNode> = rules.into_iter().map(RuleNode::cond).collect();
    match conds.len() {
        0 => RuleNode::Empty,
        1 => conds.remove(0),
        _ => RuleNode::And { children: conds },
    }
}

/// Parse a pre-built tagged tree, normalizing operator tokens at the leaves.
/// Structure is preserved, so the function is idempotent on canonical trees.
pub fn from_tree(raw: &Value) -> AudienceResult<RuleNode> {
    let obj = raw.as_object().ok_or_else(|| {
        AudienceError::Validation(format!("tree node must be an object, got {raw}"))
    })?;

    let tag = obj
        .get("op")
        .and_then(Value::as_str)
        .ok_or_else(|| AudienceError::Validation("tree node missing 'op' tag".to_string()))?;

    match tag.to_ascii_uppercase().as_str() {
        "COND" => Ok(RuleNode::cond(normalize_rule(raw)?)),
        "AND" => Ok(RuleNode::And {
            children: child_nodes(obj)?,
        }),
        "OR" => Ok(RuleNode::Or {
            children: child_nodes(obj)?,
        }),
        "NOT" => {
            let child = if let Some(child) = obj.get("child") {
                from_tree(child)?
            } else {
                // Historical payloads wrap the negated branch in `children`.
                let mut children = child_nodes(obj)?;
                match children.len() {
                    1 => children.remove(0),
                    n => {
                        return Err(AudienceError::Validation(format!(
                            "NOT node requires exactly one child, got {n}"
                        )))
                    }
                }
            };
            Ok(RuleNode::Not {
                child: Box::new(child),
            })
        }
        "EMPTY" => Ok(RuleNode::Empty),
        other => Err(AudienceError::Validation(format!(
            "unknown tree node op '{other}'"
        ))),
    }
}

fn child_nodes(obj: &serde_json::Map<String, Value>) -> AudienceResult<Vec<RuleNode>> {
    match obj.get("children") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items.iter().map(from_tree).collect(),
        Some(other) => Err(AudienceError::Validation(format!(
            "'children' must be an array, got {other}"
        ))),
    }
}

/// Legacy ingestion edge: accept whatever shape the caller has.
///
/// An array (or a single untagged rule object) is treated as a flat rule
/// list; an object carrying a valid `op` tag is treated as a pre-built tree.
/// `null` means "no rules" and yields the empty sentinel.
pub fn ingest(raw: &Value) -> AudienceResult<RuleNode> {
    match raw {
        Value::Null => Ok(RuleNode::Empty),
        Value::Array(_) => Ok(from_flat_rules(normalize_rules(raw)?)),
        Value::Object(obj) => {
            let tagged = obj
                .get("op")
                .and_then(Value::as_str)
                .map(|op| {
                    matches!(
                        op.to_ascii_uppercase().as_str(),
                        "COND" | "AND" | "OR" | "NOT" | "EMPTY"
                    )
                })
                .unwrap_or(false);
            if tagged {
                from_tree(raw)
            } else {
                // A flat rule may carry `op` as its comparator key; that is
                // not a tree tag.
                Ok(from_flat_rules(normalize_rules(raw)?))
            }
        }
        other => Err(AudienceError::Validation(format!(
            "rules must be an object or an array, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audience_core::rules::OperatorToken;
    use serde_json::json;

    // 1. Flat-rule wrapping -------------------------------------------------

    #[test]
    fn test_zero_rules_yield_empty_sentinel() {
        assert_eq!(from_flat_rules(vec![]), RuleNode::Empty);
    }

    #[test]
    fn test_single_rule_is_not_wrapped() {
        let node = from_flat_rules(vec![CanonicalRule::new(
            "visits",
            OperatorToken::Lt,
            Some(json!(5)),
        )]);
        assert!(matches!(node, RuleNode::Cond { .. }));
    }

    #[test]
    fn test_multiple_rules_get_implicit_and() {
        let node = from_flat_rules(vec![
            CanonicalRule::new("total_spend", OperatorToken::Gt, Some(json!(10_000))),
            CanonicalRule::new("visits", OperatorToken::Lt, Some(json!(5))),
        ]);
        assert!(matches!(node, RuleNode::And { ref children } if children.len() == 2));
    }

    // 2. Tree parsing -------------------------------------------------------

    #[test]
    fn test_from_tree_normalizes_leaf_operators() {
        let node = from_tree(&json!({
            "op": "OR",
            "children": [
                { "op": "COND", "field": "total_spend", "operator": "$gte", "value": 1000 },
                { "op": "COND", "field": "visits", "operator": ">", "value": 10 }
            ]
        }))
        .unwrap();
        let RuleNode::Or { children } = node else {
            panic!("expected OR node");
        };
        assert!(matches!(
            children[0],
            RuleNode::Cond { operator: OperatorToken::Gte, .. }
        ));
        assert!(matches!(
            children[1],
            RuleNode::Cond { operator: OperatorToken::Gt, .. }
        ));
    }

    #[test]
    fn test_from_tree_idempotent_on_canonical_trees() {
        let node = from_tree(&json!({
            "op": "AND",
            "children": [
                { "op": "COND", "field": "visits", "operator": "<", "value": 5 }
            ]
        }))
        .unwrap();
        let reparsed = from_tree(&serde_json::to_value(&node).unwrap()).unwrap();
        assert_eq!(reparsed, node);
    }

    #[test]
    fn test_not_node_forms() {
        let with_child = from_tree(&json!({
            "op": "NOT",
            "child": { "op": "COND", "field": "email", "operator": "exists" }
        }))
        .unwrap();
        assert!(matches!(with_child, RuleNode::Not { .. }));

        let with_children = from_tree(&json!({
            "op": "NOT",
            "children": [ { "op": "COND", "field": "email", "operator": "exists" } ]
        }))
        .unwrap();
        assert_eq!(with_children, with_child);

        let err = from_tree(&json!({ "op": "NOT", "children": [] })).unwrap_err();
        assert!(matches!(err, AudienceError::Validation(_)));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let err = from_tree(&json!({ "op": "XOR", "children": [] })).unwrap_err();
        assert!(matches!(err, AudienceError::Validation(_)));
    }

    // 3. Legacy ingestion ---------------------------------------------------

    #[test]
    fn test_ingest_array_vs_tree() {
        let flat = ingest(&json!([
            { "field": "total_spend", "op": ">", "value": 10000 },
            { "field": "visits", "op": "<", "value": 5 }
        ]))
        .unwrap();
        assert!(matches!(flat, RuleNode::And { .. }));

        let tree = ingest(&json!({
            "op": "OR",
            "children": [
                { "op": "COND", "field": "visits", "operator": "<", "value": 5 }
            ]
        }))
        .unwrap();
        assert!(matches!(tree, RuleNode::Or { .. }));
    }

    #[test]
    fn test_ingest_flat_rule_with_op_comparator_key() {
        // `op: "<"` is a comparator, not a tree tag.
        let node = ingest(&json!({ "field": "visits", "op": "<", "value": 5 })).unwrap();
        assert!(matches!(
            node,
            RuleNode::Cond { operator: OperatorToken::Lt, .. }
        ));
    }

    #[test]
    fn test_ingest_null_and_empty_array() {
        assert_eq!(ingest(&Value::Null).unwrap(), RuleNode::Empty);
        assert_eq!(ingest(&json!([])).unwrap(), RuleNode::Empty);
    }

    #[test]
    fn test_ingest_never_mutates_input() {
        let raw = json!([{ "field": "total_spend", "op": ">", "value": "10000" }]);
        let before = raw.clone();
        ingest(&raw).unwrap();
        assert_eq!(raw, before);
    }
}
