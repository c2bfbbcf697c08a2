//! Core types for sceneline: format ids, pipeline policy, the screenplay
//! document model, and the review wire contract.

pub mod document;
mod error;
pub mod format;
pub mod review;

pub use document::{DOCUMENT_VERSION, ScreenplayBlock, ScreenplayDocument};
pub use error::DocumentError;
pub use format::{ClassifierRole, FormatId, LineType, MergePolicy, StructurePipelinePolicy};
pub use review::{
    AgentReviewRequest, AgentReviewResponse, CoverageMeta, ReviewContextLine, ReviewDecision,
    ReviewStatus, RoutingBand, SuspiciousLine,
};
