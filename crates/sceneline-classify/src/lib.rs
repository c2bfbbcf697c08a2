//! Classification pass: normalizer, line classifier, merge engine,
//! projection guard and escalation scorer. Synchronous, no I/O.

pub mod classifier;
pub mod escalation;
pub mod guard;
pub mod lexicon;
pub mod merge;
pub mod normalizer;
pub mod pipeline;

pub use classifier::{ClassifiedLine, LineClassifier, Rule, classify_lines, classify_texts};
pub use escalation::{
    Detector, EscalationThresholds, Evidence, LineAssessment, build_review_request, escalated,
    score_blocks,
};
pub use guard::{
    CurrentDocumentStats, GuardOutcome, GuardRemedy, GuardThresholds, ProjectionGuardReport,
};
pub use merge::{MergeReport, merge_lines};
pub use normalizer::{LineHint, NormalizedLine, NormalizedText, normalize};
pub use pipeline::{GuardedRun, StructurePipelineResult, run_guarded, run_pipeline};
