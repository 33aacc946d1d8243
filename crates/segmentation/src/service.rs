//! Segment service: the facade the rest of the application calls.

use std::sync::Arc;

use audience_core::error::{AudienceError, AudienceResult};
use audience_core::query::{FieldPredicate, Filter};
use audience_core::types::{AudiencePage, PageRequest, Segment, FIELD_EMAIL, FIELD_NAME};
use audience_store::{RecordStore, SegmentStore};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::ast;
use crate::compiler;
use crate::evaluator::AudienceEvaluator;

pub struct SegmentService {
    segments: Arc<dyn SegmentStore>,
    evaluator: AudienceEvaluator,
}

impl SegmentService {
    pub fn new(records: Arc<dyn RecordStore>, segments: Arc<dyn SegmentStore>) -> Self {
        Self {
            segments,
            evaluator: AudienceEvaluator::new(records),
        }
    }

    /// Create a segment from caller-supplied rules: normalize, build the
    /// tree, compile, count the audience once, persist. The stored
    /// `audience_size` is a point-in-time snapshot and is never recomputed
    /// afterwards.
    pub fn create_segment(&self, name: &str, raw_rules: &serde_json::Value) -> AudienceResult<Segment> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AudienceError::Validation(
                "segment name must not be empty".to_string(),
            ));
        }

        let rules = ast::ingest(raw_rules)?;
        let filter = compiler::compile(&rules)?;
        let audience_size = self.evaluator.count(&filter)?;

        let segment = self.segments.save(Segment {
            id: Uuid::new_v4(),
            name: name.to_string(),
            rules,
            audience_size,
            created_at: Utc::now(),
        })?;
        info!(
            segment_id = %segment.id,
            name = %segment.name,
            audience = segment.audience_size,
            "Segment created"
        );
        Ok(segment)
    }

    /// Current membership of a persisted segment. The stored tree is already
    /// canonical, so it is only recompiled here, never re-normalized; the
    /// live count may differ from the cached `audience_size`.
    pub fn segment_members(&self, id: &Uuid, page: &PageRequest) -> AudienceResult<AudiencePage> {
        let segment = self.segments.load(id)?;
        let filter = compiler::compile(&segment.rules)?;
        self.evaluator.evaluate(&filter, page)
    }

    /// All segments, newest first.
    pub fn list_segments(&self) -> AudienceResult<Vec<Segment>> {
        self.segments.list()
    }

    /// Paginated record listing with an optional case-insensitive search
    /// over name and email.
    pub fn search_users(
        &self,
        query: Option<&str>,
        page: &PageRequest,
    ) -> AudienceResult<AudiencePage> {
        let filter = match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => Filter::any(vec![
                Filter::clause(FIELD_NAME, FieldPredicate::Matches(q.to_string())),
                Filter::clause(FIELD_EMAIL, FieldPredicate::Matches(q.to_string())),
            ]),
            None => Filter::Empty,
        };
        self.evaluator.evaluate(&filter, page)
    }
}
