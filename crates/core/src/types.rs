use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::rules::RuleNode;

/// Attribute name of the real activity timestamp stored on records
/// (RFC 3339 string).
pub const FIELD_LAST_ACTIVE_AT: &str = "last_active_at";

/// Derived pseudo-field: "days since last activity". Never stored; rewritten
/// onto [`FIELD_LAST_ACTIVE_AT`] at query-compile time.
pub const FIELD_LAST_ACTIVE_DAYS: &str = "last_active_days";

pub const FIELD_EMAIL: &str = "email";
pub const FIELD_NAME: &str = "name";

/// Fields whose values are always compared numerically; string values are
/// coerced to numbers during normalization and compilation.
pub const NUMERIC_FIELDS: &[&str] = &[
    "total_spend",
    "visits",
    "avg_order_value",
    FIELD_LAST_ACTIVE_DAYS,
];

pub fn is_numeric_field(field: &str) -> bool {
    NUMERIC_FIELDS.contains(&field)
}

/// A stored customer record: arbitrary attributes keyed by field name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl UserRecord {
    pub fn new(attributes: HashMap<String, serde_json::Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            attributes,
        }
    }

    pub fn attr(&self, field: &str) -> Option<&serde_json::Value> {
        self.attributes.get(field)
    }
}

/// A named, persisted audience-membership predicate plus its cached size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: Uuid,
    pub name: String,
    /// Canonical rule tree, frozen at creation. Edits replace the whole tree.
    pub rules: RuleNode,
    /// Point-in-time audience count, recomputed only at segment creation.
    /// Allowed to go stale; consumers must treat it as "last known".
    pub audience_size: u64,
    pub created_at: DateTime<Utc>,
}

/// 1-based page request. Out-of-range values are clamped, not rejected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit }
    }

    /// Returns a copy with `page` floored to 1 and `limit` capped at
    /// `max_limit`.
    pub fn clamped(&self, max_limit: u32) -> Self {
        Self {
            page: self.page.max(1),
            limit: self.limit.min(max_limit),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.limit as usize
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 50 }
    }
}

/// One page of audience membership plus the total match count.
///
/// `total` and `items` come from two independent reads of the record store;
/// there is no transactional consistency guarantee between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudiencePage {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub items: Vec<UserRecord>,
}
