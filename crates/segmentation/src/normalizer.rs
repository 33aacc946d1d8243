//! Rule normalizer: folds every historically-accumulated rule shape into
//! [`CanonicalRule`].
//!
//! Callers have supplied rules as flat `{field, op|operator|mongoOp|opName,
//! value|val|v}` objects, as objects already tagged `op: "COND"` carrying the
//! real comparator under another key, and with operator tokens in three
//! vocabularies. All shape tolerance lives here; downstream code only ever
//! sees the canonical struct.

use audience_core::error::{AudienceError, AudienceResult};
use audience_core::rules::{CanonicalRule, OperatorToken};
use audience_core::types::{is_numeric_field, FIELD_EMAIL};
use serde_json::Value;

/// Normalize a single rule object or an array of rule objects.
pub fn normalize_rules(raw: &Value) -> AudienceResult<Vec<CanonicalRule>> {
    match raw {
        Value::Array(items) => items.iter().map(normalize_rule).collect(),
        Value::Object(_) => Ok(vec![normalize_rule(raw)?]),
        Value::Null => Ok(Vec::new()),
        other => Err(AudienceError::Validation(format!(
            "rules must be an object or an array, got {other}"
        ))),
    }
}

/// Normalize one rule object into canonical form.
pub fn normalize_rule(raw: &Value) -> AudienceResult<CanonicalRule> {
    let obj = raw.as_object().ok_or_else(|| {
        AudienceError::Validation(format!("rule must be an object, got {raw}"))
    })?;

    let field = obj
        .get("field")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| AudienceError::Validation("rule missing field".to_string()))?;

    let token = resolve_operator_token(obj).ok_or_else(|| {
        AudienceError::Validation(format!("rule for field '{field}' missing operator"))
    })?;
    let operator: OperatorToken = token.parse()?;

    let value = resolve_value(obj);
    if operator.requires_value() && value.is_none() {
        return Err(AudienceError::invalid_field(
            field,
            format!("operator {operator} requires a value"),
        ));
    }

    let value = value.map(|v| coerce_value(field, operator, v));

    Ok(CanonicalRule::new(field, operator, value))
}

/// Ordered fallback chain for the operator token. `op` is consulted only when
/// it is not the literal AST tag `"COND"`, which marks "this object is a tree
/// node, the comparator lives elsewhere".
fn resolve_operator_token(obj: &serde_json::Map<String, Value>) -> Option<&str> {
    if let Some(op) = non_null_str(obj, "operator") {
        return Some(op);
    }
    if let Some(op) = non_null_str(obj, "mongoOp") {
        return Some(op);
    }
    if let Some(op) = non_null_str(obj, "op") {
        if !op.eq_ignore_ascii_case("COND") {
            return Some(op);
        }
    }
    non_null_str(obj, "opName").or_else(|| non_null_str(obj, "operatorName"))
}

fn non_null_str<'a>(obj: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn resolve_value(obj: &serde_json::Map<String, Value>) -> Option<Value> {
    // Null does not satisfy a key; it falls through to the next alias.
    ["value", "val", "v"]
        .iter()
        .find_map(|k| obj.get(*k).filter(|v| !v.is_null()))
        .cloned()
}

fn coerce_value(field: &str, operator: OperatorToken, value: Value) -> Value {
    let value = match value {
        Value::String(s) => coerce_string(field, operator, s),
        other => other,
    };

    // A CONTAINS match on the email field matches on the domain suffix, so a
    // full address and a bare domain behave the same.
    if field == FIELD_EMAIL && operator == OperatorToken::Contains {
        if let Value::String(s) = &value {
            return Value::String(email_domain_suffix(s));
        }
    }
    value
}

fn coerce_string(field: &str, operator: OperatorToken, s: String) -> Value {
    let trimmed = s.trim();

    // Bracketed JSON-array strings become real arrays for IN/BETWEEN.
    if matches!(operator, OperatorToken::In | OperatorToken::Between)
        && trimmed.starts_with('[')
        && trimmed.ends_with(']')
    {
        if let Ok(parsed @ Value::Array(_)) = serde_json::from_str::<Value>(trimmed) {
            return parsed;
        }
    }

    match trimmed {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    // Numeric-looking strings on known numeric fields become numbers;
    // anything else is left alone for the compiler to reject.
    if is_numeric_field(field) {
        if let Ok(n) = trimmed.parse::<f64>() {
            if let Some(num) = serde_json::Number::from_f64(n) {
                return Value::Number(num);
            }
        }
    }

    Value::String(s)
}

/// Reduce an email address or domain to its matchable suffix: strip any
/// `local-part@`, then keep everything from the first `.` on.
/// `user@gmail.com` -> `.com`, `gmail.com` -> `.com`, `.com` -> `.com`.
fn email_domain_suffix(value: &str) -> String {
    let domain = match value.rsplit_once('@') {
        Some((_, domain)) => domain,
        None => value,
    };
    match domain.find('.') {
        Some(idx) => domain[idx..].to_string(),
        None => domain.to_string(),
    }
}
