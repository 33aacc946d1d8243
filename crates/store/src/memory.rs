//! In-memory record store: interprets compiled filters over stored records.

use std::cmp::Ordering;

use audience_core::error::{AudienceError, AudienceResult};
use audience_core::query::{FieldPredicate, Filter};
use audience_core::types::{PageRequest, UserRecord};
use dashmap::DashMap;
use uuid::Uuid;

use crate::RecordStore;

/// DashMap-backed record store. `find` returns matches sorted ascending by
/// record id, so paging is stable across calls on an unchanged store.
pub struct MemoryRecordStore {
    records: DashMap<Uuid, UserRecord>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    pub fn insert(&self, record: UserRecord) {
        self.records.insert(record.id, record);
    }

    pub fn insert_many(&self, records: impl IntoIterator<Item = UserRecord>) {
        for record in records {
            self.insert(record);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryRecordStore {
    fn count(&self, filter: &Filter) -> AudienceResult<u64> {
        let mut total = 0u64;
        for entry in self.records.iter() {
            if matches_filter(entry.value(), filter)? {
                total += 1;
            }
        }
        Ok(total)
    }

    fn find(&self, filter: &Filter, page: &PageRequest) -> AudienceResult<Vec<UserRecord>> {
        let mut matched = Vec::new();
        for entry in self.records.iter() {
            if matches_filter(entry.value(), filter)? {
                matched.push(entry.value().clone());
            }
        }
        matched.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(matched
            .into_iter()
            .skip(page.offset())
            .take(page.limit as usize)
            .collect())
    }
}

fn matches_filter(record: &UserRecord, filter: &Filter) -> AudienceResult<bool> {
    match filter {
        Filter::Empty => Ok(true),
        Filter::Clause { field, predicate } => eval_predicate(record.attr(field), predicate),
        Filter::And(parts) => {
            for part in parts {
                if !matches_filter(record, part)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Filter::Or(parts) => {
            for part in parts {
                if matches_filter(record, part)? {
                    return Ok(true);
                }
            }
            Ok(parts.is_empty())
        }
        Filter::Not(inner) => Ok(!matches_filter(record, inner)?),
    }
}

fn eval_predicate(
    actual: Option<&serde_json::Value>,
    predicate: &FieldPredicate,
) -> AudienceResult<bool> {
    // A missing or null attribute fails every predicate except the
    // existence checks.
    let present = actual.filter(|v| !v.is_null());
    if let FieldPredicate::Exists(want) = predicate {
        return Ok(present.is_some() == *want);
    }
    let Some(actual) = present else {
        return Ok(false);
    };

    Ok(match predicate {
        FieldPredicate::Gt(expected) => {
            value_cmp(actual, expected) == Some(Ordering::Greater)
        }
        FieldPredicate::Gte(expected) => {
            matches!(value_cmp(actual, expected), Some(Ordering::Greater | Ordering::Equal))
        }
        FieldPredicate::Lt(expected) => value_cmp(actual, expected) == Some(Ordering::Less),
        FieldPredicate::Lte(expected) => {
            matches!(value_cmp(actual, expected), Some(Ordering::Less | Ordering::Equal))
        }
        FieldPredicate::Eq(expected) => values_equal(actual, expected),
        FieldPredicate::Ne(expected) => !values_equal(actual, expected),
        FieldPredicate::Matches(needle) => match actual.as_str() {
            Some(haystack) => contains_ci(haystack, needle)?,
            None => false,
        },
        FieldPredicate::Between(lo, hi) => {
            matches!(value_cmp(actual, lo), Some(Ordering::Greater | Ordering::Equal))
                && matches!(value_cmp(actual, hi), Some(Ordering::Less | Ordering::Equal))
        }
        FieldPredicate::In(list) => list.iter().any(|e| values_equal(actual, e)),
        FieldPredicate::Exists(_) => unreachable!("handled above"),
    })
}

/// Case-insensitive substring test over a literal needle.
fn contains_ci(haystack: &str, needle: &str) -> AudienceResult<bool> {
    let re = regex::RegexBuilder::new(&regex::escape(needle))
        .case_insensitive(true)
        .build()
        .map_err(|e| AudienceError::Store(format!("bad contains pattern '{needle}': {e}")))?;
    Ok(re.is_match(haystack))
}

/// Ordering between attribute values: numbers compare as f64, strings
/// lexicographically (RFC 3339 timestamps included). Mixed types do not
/// compare.
fn value_cmp(a: &serde_json::Value, b: &serde_json::Value) -> Option<Ordering> {
    match (a, b) {
        (serde_json::Value::Number(x), serde_json::Value::Number(y)) => {
            x.as_f64()?.partial_cmp(&y.as_f64()?)
        }
        (serde_json::Value::String(x), serde_json::Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn values_equal(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    // 12000 and 12000.0 are the same value for comparison purposes.
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x == y;
    }
    a == b
}
