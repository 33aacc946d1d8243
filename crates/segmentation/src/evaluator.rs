//! Audience evaluator: count plus one stably-ordered page of members.

use std::sync::Arc;

use audience_core::error::AudienceResult;
use audience_core::query::Filter;
use audience_core::types::{AudiencePage, PageRequest};
use audience_store::RecordStore;

/// Hard cap on page size; larger requests are silently clamped.
pub const MAX_PAGE_LIMIT: u32 = 200;

/// Read-only audience evaluation over a record store. The two reads (count,
/// find) are independent; the store may be mutated between them, so `total`
/// and `items` carry no transactional consistency guarantee. Safe to retry.
pub struct AudienceEvaluator {
    records: Arc<dyn RecordStore>,
    max_limit: u32,
}

impl AudienceEvaluator {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self {
            records,
            max_limit: MAX_PAGE_LIMIT,
        }
    }

    /// Membership count for a compiled filter.
    pub fn count(&self, filter: &Filter) -> AudienceResult<u64> {
        self.records.count(filter)
    }

    /// Membership count plus the requested page, ordered by record id
    /// (the store's documented deterministic order).
    pub fn evaluate(&self, filter: &Filter, page: &PageRequest) -> AudienceResult<AudiencePage> {
        let page = page.clamped(self.max_limit);
        let total = self.records.count(filter)?;
        let items = self.records.find(filter, &page)?;
        Ok(AudiencePage {
            total,
            page: page.page,
            limit: page.limit,
            items,
        })
    }
}
