//! Audience segmentation core: rule normalization, logic-tree construction,
//! query compilation, and audience evaluation.
//!
//! Data flow: caller rules -> [`normalizer`] -> [`ast`] -> [`compiler`] ->
//! [`audience_core::query::Filter`] -> [`evaluator`] -> count + page of
//! records. Everything before the evaluator is pure and synchronous; only the
//! evaluator touches the record store.

pub mod ast;
pub mod compiler;
pub mod evaluator;
pub mod normalizer;
pub mod service;

pub use evaluator::AudienceEvaluator;
pub use service::SegmentService;
