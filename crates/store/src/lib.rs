//! Record-store and segment-persistence collaborators.
//!
//! The segmentation core talks to storage only through the two traits below;
//! it never assumes a specific engine, query language, or index strategy
//! beyond "supports AND/OR/NOT composition and the leaf predicates of
//! [`audience_core::query::FieldPredicate`]". The DashMap-backed
//! implementations in this crate are the reference store.

pub mod memory;
pub mod segments;

use audience_core::error::AudienceResult;
use audience_core::query::Filter;
use audience_core::types::{PageRequest, Segment, UserRecord};
use uuid::Uuid;

/// Read-only access to persisted customer records.
pub trait RecordStore: Send + Sync {
    /// Count of records matching `filter`.
    fn count(&self, filter: &Filter) -> AudienceResult<u64>;

    /// One page of records matching `filter`.
    ///
    /// Implementations must pick a deterministic order; the in-memory store
    /// sorts ascending by record id. The page is applied after ordering.
    fn find(&self, filter: &Filter, page: &PageRequest) -> AudienceResult<Vec<UserRecord>>;
}

/// CRUD surface for persisted segments.
pub trait SegmentStore: Send + Sync {
    fn save(&self, segment: Segment) -> AudienceResult<Segment>;

    /// Fails with [`audience_core::AudienceError::NotFound`] for unknown ids.
    fn load(&self, id: &Uuid) -> AudienceResult<Segment>;

    /// All segments, newest first.
    fn list(&self) -> AudienceResult<Vec<Segment>>;

    /// Remove a segment. Fails with `NotFound` for unknown ids.
    fn delete(&self, id: &Uuid) -> AudienceResult<()>;
}

pub use memory::MemoryRecordStore;
pub use segments::MemorySegmentStore;
