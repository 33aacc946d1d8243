//! In-memory segment persistence.

use audience_core::error::{AudienceError, AudienceResult};
use audience_core::types::Segment;
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use crate::SegmentStore;

pub struct MemorySegmentStore {
    segments: DashMap<Uuid, Segment>,
}

impl MemorySegmentStore {
    pub fn new() -> Self {
        Self {
            segments: DashMap::new(),
        }
    }
}

impl Default for MemorySegmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentStore for MemorySegmentStore {
    fn save(&self, segment: Segment) -> AudienceResult<Segment> {
        info!(segment_id = %segment.id, name = %segment.name, "Segment saved");
        self.segments.insert(segment.id, segment.clone());
        Ok(segment)
    }

    fn load(&self, id: &Uuid) -> AudienceResult<Segment> {
        self.segments
            .get(id)
            .map(|s| s.clone())
            .ok_or_else(|| AudienceError::NotFound(format!("segment {id}")))
    }

    fn list(&self) -> AudienceResult<Vec<Segment>> {
        let mut all: Vec<Segment> = self.segments.iter().map(|s| s.value().clone()).collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    fn delete(&self, id: &Uuid) -> AudienceResult<()> {
        match self.segments.remove(id) {
            Some((_, segment)) => {
                info!(segment_id = %id, name = %segment.name, "Segment deleted");
                Ok(())
            }
            None => Err(AudienceError::NotFound(format!("segment {id}"))),
        }
    }
}
