//! Query compiler: lowers a rule tree into the store-neutral [`Filter`].
//!
//! Compilation is fail-fast: one bad clause fails the whole compile. A
//! segment must never silently compile to a broader-than-intended audience.

use audience_core::error::{AudienceError, AudienceResult};
use audience_core::query::{FieldPredicate, Filter};
use audience_core::rules::{OperatorToken, RuleNode};
use audience_core::types::{is_numeric_field, FIELD_LAST_ACTIVE_AT, FIELD_LAST_ACTIVE_DAYS};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

/// Compile a rule tree against the current clock.
pub fn compile(node: &RuleNode) -> AudienceResult<Filter> {
    compile_at(node, Utc::now())
}

/// Compile with an explicit `now`, so derived-field cutoffs are
/// deterministic under test.
pub fn compile_at(node: &RuleNode, now: DateTime<Utc>) -> AudienceResult<Filter> {
    match node {
        RuleNode::Empty => Ok(Filter::Empty),
        RuleNode::Cond {
            field,
            operator,
            value,
        } => compile_cond(field, *operator, value.as_ref(), now),
        RuleNode::And { children } => {
            let parts = children
                .iter()
                .map(|c| compile_at(c, now))
                .collect::<AudienceResult<Vec<_>>>()?;
            Ok(Filter::all(parts))
        }
        RuleNode::Or { children } => {
            let parts = children
                .iter()
                .map(|c| compile_at(c, now))
                .collect::<AudienceResult<Vec<_>>>()?;
            Ok(Filter::any(parts))
        }
        RuleNode::Not { child } => Ok(Filter::Not(Box::new(compile_at(child, now)?))),
    }
}

fn compile_cond(
    field: &str,
    operator: OperatorToken,
    value: Option<&Value>,
    now: DateTime<Utc>,
) -> AudienceResult<Filter> {
    if field.trim().is_empty() {
        return Err(AudienceError::Validation(
            "condition missing field".to_string(),
        ));
    }

    if field == FIELD_LAST_ACTIVE_DAYS {
        return compile_last_active_days(operator, value, now);
    }

    match operator {
        OperatorToken::Gt | OperatorToken::Gte | OperatorToken::Lt | OperatorToken::Lte => {
            let v = scalar_value(field, operator, value)?;
            let predicate = match operator {
                OperatorToken::Gt => FieldPredicate::Gt(v),
                OperatorToken::Gte => FieldPredicate::Gte(v),
                OperatorToken::Lt => FieldPredicate::Lt(v),
                _ => FieldPredicate::Lte(v),
            };
            Ok(Filter::clause(field, predicate))
        }
        OperatorToken::Eq => Ok(Filter::clause(
            field,
            FieldPredicate::Eq(scalar_value(field, operator, value)?),
        )),
        OperatorToken::Neq => Ok(Filter::clause(
            field,
            FieldPredicate::Ne(scalar_value(field, operator, value)?),
        )),
        OperatorToken::Contains => {
            let v = require_value(field, operator, value)?;
            match v {
                Value::String(s) => Ok(Filter::clause(field, FieldPredicate::Matches(s.clone()))),
                // An array value degrades to a membership test.
                Value::Array(items) => Ok(Filter::clause(
                    field,
                    FieldPredicate::In(coerce_elements(field, items)?),
                )),
                other => Err(AudienceError::invalid_field(
                    field,
                    format!("CONTAINS requires a string value, got {other}"),
                )),
            }
        }
        OperatorToken::Between => {
            let items = array_value(field, operator, value)?;
            match <[Value; 2]>::try_from(coerce_elements(field, &items)?) {
                Ok([lo, hi]) => Ok(Filter::clause(field, FieldPredicate::Between(lo, hi))),
                Err(bounds) => Err(AudienceError::invalid_field(
                    field,
                    format!("BETWEEN requires exactly 2 bounds, got {}", bounds.len()),
                )),
            }
        }
        OperatorToken::In => {
            let items = array_value(field, operator, value)?;
            Ok(Filter::clause(
                field,
                FieldPredicate::In(coerce_elements(field, &items)?),
            ))
        }
        OperatorToken::Exists => Ok(Filter::clause(field, FieldPredicate::Exists(true))),
        OperatorToken::NotExists => Ok(Filter::clause(field, FieldPredicate::Exists(false))),
    }
}

/// Rewrite the derived "days since last activity" pseudo-field onto the real
/// timestamp. The comparison direction inverts: more days inactive means an
/// older, i.e. smaller, timestamp.
fn compile_last_active_days(
    operator: OperatorToken,
    value: Option<&Value>,
    now: DateTime<Utc>,
) -> AudienceResult<Filter> {
    let days = numeric_f64(
        FIELD_LAST_ACTIVE_DAYS,
        require_value(FIELD_LAST_ACTIVE_DAYS, operator, value)?,
    )?;
    // The `as i64` cast saturates for huge day counts; checked_sub_signed
    // then rejects any cutoff outside the representable timestamp range
    // instead of panicking.
    let cutoff = chrono::Duration::try_milliseconds((days * 86_400_000.0) as i64)
        .and_then(|delta| now.checked_sub_signed(delta))
        .ok_or_else(|| {
            AudienceError::invalid_field(
                FIELD_LAST_ACTIVE_DAYS,
                format!("value {days} is out of range"),
            )
        })?;
    let cutoff = Value::String(cutoff.to_rfc3339_opts(SecondsFormat::Secs, true));

    let predicate = match operator {
        OperatorToken::Gt | OperatorToken::Gte | OperatorToken::Eq => FieldPredicate::Lt(cutoff),
        OperatorToken::Lt | OperatorToken::Lte => FieldPredicate::Gt(cutoff),
        other => {
            return Err(AudienceError::invalid_field(
                FIELD_LAST_ACTIVE_DAYS,
                format!("operator {other} is not supported"),
            ))
        }
    };
    Ok(Filter::clause(FIELD_LAST_ACTIVE_AT, predicate))
}

fn require_value<'a>(
    field: &str,
    operator: OperatorToken,
    value: Option<&'a Value>,
) -> AudienceResult<&'a Value> {
    value.filter(|v| !v.is_null()).ok_or_else(|| {
        AudienceError::invalid_field(field, format!("operator {operator} requires a value"))
    })
}

/// Scalar clause value, with numeric coercion on known numeric fields.
fn scalar_value(
    field: &str,
    operator: OperatorToken,
    value: Option<&Value>,
) -> AudienceResult<Value> {
    let v = require_value(field, operator, value)?;
    if is_numeric_field(field) {
        return numeric(field, v);
    }
    Ok(v.clone())
}

fn array_value(
    field: &str,
    operator: OperatorToken,
    value: Option<&Value>,
) -> AudienceResult<Vec<Value>> {
    match require_value(field, operator, value)? {
        Value::Array(items) => Ok(items.clone()),
        // Tolerate a JSON-array string that skipped normalization.
        Value::String(s) => match serde_json::from_str::<Value>(s.trim()) {
            Ok(Value::Array(items)) => Ok(items),
            _ => Err(AudienceError::invalid_field(
                field,
                format!("operator {operator} requires an array value, got '{s}'"),
            )),
        },
        other => Err(AudienceError::invalid_field(
            field,
            format!("operator {operator} requires an array value, got {other}"),
        )),
    }
}

fn coerce_elements(field: &str, items: &[Value]) -> AudienceResult<Vec<Value>> {
    if !is_numeric_field(field) {
        return Ok(items.to_vec());
    }
    items.iter().map(|v| numeric(field, v)).collect()
}

/// Coerce a clause value on a numeric field, naming the field and raw value
/// on failure. Never silently drops the clause.
fn numeric(field: &str, value: &Value) -> AudienceResult<Value> {
    serde_json::Number::from_f64(numeric_f64(field, value)?)
        .map(Value::Number)
        .ok_or_else(|| {
            AudienceError::invalid_field(field, format!("expected a numeric value, got {value}"))
        })
}

fn numeric_f64(field: &str, value: &Value) -> AudienceResult<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite()).ok_or_else(|| {
        AudienceError::invalid_field(field, format!("expected a numeric value, got {value}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use audience_core::rules::CanonicalRule;
    use chrono::TimeZone;
    use serde_json::json;

    fn cond(field: &str, operator: OperatorToken, value: Value) -> RuleNode {
        RuleNode::cond(CanonicalRule::new(field, operator, Some(value)))
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap()
    }

    // 1. Operator table -----------------------------------------------------

    #[test]
    fn test_range_and_equality_operators() {
        let filter = compile(&cond("total_spend", OperatorToken::Gt, json!(10_000))).unwrap();
        assert_eq!(
            filter,
            Filter::clause("total_spend", FieldPredicate::Gt(json!(10_000.0)))
        );

        let filter = compile(&cond("name", OperatorToken::Eq, json!("Asha"))).unwrap();
        assert_eq!(filter, Filter::clause("name", FieldPredicate::Eq(json!("Asha"))));
    }

    #[test]
    fn test_operator_spellings_compile_identically() {
        let tokens: Vec<OperatorToken> = [">", "$gt", "gt", "over"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        let filters: Vec<Filter> = tokens
            .into_iter()
            .map(|op| compile(&cond("visits", op, json!(5))).unwrap())
            .collect();
        assert!(filters.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_contains_string_and_array() {
        let filter = compile(&cond("name", OperatorToken::Contains, json!("sha"))).unwrap();
        assert_eq!(
            filter,
            Filter::clause("name", FieldPredicate::Matches("sha".into()))
        );

        let filter = compile(&cond("visits", OperatorToken::Contains, json!([1, 2]))).unwrap();
        assert_eq!(
            filter,
            Filter::clause("visits", FieldPredicate::In(vec![json!(1.0), json!(2.0)]))
        );

        let err = compile(&cond("name", OperatorToken::Contains, json!(7))).unwrap_err();
        assert!(matches!(err, AudienceError::Validation(_)));
    }

    #[test]
    fn test_between_arity() {
        let filter = compile(&cond("visits", OperatorToken::Between, json!([10, 20]))).unwrap();
        assert_eq!(
            filter,
            Filter::clause(
                "visits",
                FieldPredicate::Between(json!(10.0), json!(20.0))
            )
        );

        for bad in [json!([10]), json!([10, 20, 30])] {
            let err = compile(&cond("visits", OperatorToken::Between, bad)).unwrap_err();
            assert!(matches!(err, AudienceError::Validation(_)));
        }
    }

    #[test]
    fn test_in_accepts_array_and_json_string() {
        let literal = compile(&cond("visits", OperatorToken::In, json!([1, 2]))).unwrap();
        let encoded = compile(&cond("visits", OperatorToken::In, json!("[1, 2]"))).unwrap();
        assert_eq!(literal, encoded);
    }

    #[test]
    fn test_existence_checks_need_no_value() {
        let node = RuleNode::cond(CanonicalRule::new("email", OperatorToken::NotExists, None));
        let filter = compile(&node).unwrap();
        assert_eq!(filter, Filter::clause("email", FieldPredicate::Exists(false)));
    }

    // 2. Numeric coercion ---------------------------------------------------

    #[test]
    fn test_numeric_field_coercion_failure_names_field() {
        let err = compile(&cond("total_spend", OperatorToken::Gt, json!("lots"))).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("total_spend"), "got: {msg}");
        assert!(msg.contains("lots"), "got: {msg}");
    }

    // 3. Derived-field rewrite ----------------------------------------------

    #[test]
    fn test_last_active_days_inverts_gt_to_lt() {
        let filter = compile_at(
            &cond("last_active_days", OperatorToken::Gt, json!(90)),
            fixed_now(),
        )
        .unwrap();
        // 90 days inactive or more means last_active_at BEFORE the cutoff.
        assert_eq!(
            filter,
            Filter::clause(
                "last_active_at",
                FieldPredicate::Lt(json!("2025-05-03T00:00:00Z"))
            )
        );
    }

    #[test]
    fn test_last_active_days_inverts_lt_to_gt() {
        let filter = compile_at(
            &cond("last_active_days", OperatorToken::Lt, json!(30)),
            fixed_now(),
        )
        .unwrap();
        assert_eq!(
            filter,
            Filter::clause(
                "last_active_at",
                FieldPredicate::Gt(json!("2025-07-02T00:00:00Z"))
            )
        );
    }

    #[test]
    fn test_last_active_days_every_direction() {
        let cases = [
            (OperatorToken::Gt, "lt"),
            (OperatorToken::Gte, "lt"),
            (OperatorToken::Eq, "lt"),
            (OperatorToken::Lt, "gt"),
            (OperatorToken::Lte, "gt"),
        ];
        for (op, expect) in cases {
            let filter =
                compile_at(&cond("last_active_days", op, json!(7)), fixed_now()).unwrap();
            let Filter::Clause { field, predicate } = filter else {
                panic!("expected clause for {op}");
            };
            assert_eq!(field, "last_active_at", "operator {op}");
            let dir = match predicate {
                FieldPredicate::Lt(_) => "lt",
                FieldPredicate::Gt(_) => "gt",
                other => panic!("unexpected predicate {other:?} for {op}"),
            };
            assert_eq!(dir, expect, "operator {op}");
        }
    }

    #[test]
    fn test_last_active_days_rejects_bad_values_and_operators() {
        let err = compile(&cond("last_active_days", OperatorToken::Gt, json!("soon")))
            .unwrap_err();
        assert!(matches!(err, AudienceError::Validation(_)));

        let err = compile(&cond("last_active_days", OperatorToken::Contains, json!(5)))
            .unwrap_err();
        assert!(matches!(err, AudienceError::Validation(_)));
    }

    #[test]
    fn test_last_active_days_out_of_range_value_is_validation_error() {
        // A day count whose cutoff predates the representable timestamp
        // range must fail cleanly, not overflow.
        for huge in [1_000_000_000.0, 1e18] {
            let err = compile(&cond("last_active_days", OperatorToken::Gt, json!(huge)))
                .unwrap_err();
            let msg = err.to_string();
            assert!(matches!(err, AudienceError::Validation(_)), "got: {msg}");
            assert!(msg.contains("last_active_days"), "got: {msg}");
        }
    }

    // 4. Boolean composition ------------------------------------------------

    #[test]
    fn test_and_or_not_recursion() {
        let node = RuleNode::Or {
            children: vec![
                RuleNode::And {
                    children: vec![
                        cond("total_spend", OperatorToken::Gt, json!(10_000)),
                        cond("visits", OperatorToken::Lt, json!(5)),
                    ],
                },
                RuleNode::Not {
                    child: Box::new(cond("email", OperatorToken::Contains, json!(".org"))),
                },
            ],
        };
        let filter = compile(&node).unwrap();
        let Filter::Or(parts) = filter else {
            panic!("expected OR filter");
        };
        assert!(matches!(parts[0], Filter::And(ref v) if v.len() == 2));
        assert!(matches!(parts[1], Filter::Not(_)));
    }

    #[test]
    fn test_empty_and_childless_nodes_compile_to_noop() {
        assert_eq!(compile(&RuleNode::Empty).unwrap(), Filter::Empty);
        assert_eq!(
            compile(&RuleNode::And { children: vec![] }).unwrap(),
            Filter::Empty
        );
        assert_eq!(
            compile(&RuleNode::Or { children: vec![] }).unwrap(),
            Filter::Empty
        );
    }

    #[test]
    fn test_single_bad_clause_fails_whole_compile() {
        let node = RuleNode::And {
            children: vec![
                cond("total_spend", OperatorToken::Gt, json!(10_000)),
                cond("visits", OperatorToken::Between, json!([1])),
            ],
        };
        assert!(compile(&node).is_err());
    }
}
