//! End-to-end classification pass: normalize → classify → merge → guard.
//!
//! Each run is a pure function of its input text and policy.

use serde::Serialize;
use tracing::{debug, info};

use sceneline_core::{ClassifierRole, ScreenplayBlock, StructurePipelinePolicy};

use crate::classifier::{ClassifiedLine, classify_lines};
use crate::guard::{
    self, CurrentDocumentStats, GuardOutcome, GuardRemedy, GuardThresholds, ProjectionGuardReport,
};
use crate::merge::{MergeReport, merge_lines};
use crate::normalizer::{Line, NormalizedLine, normalize};

/// Full, reproducible output of one run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructurePipelineResult {
    pub normalized_text: String,
    pub normalized_lines: Vec<NormalizedLine>,
    pub classified: Vec<ClassifiedLine>,
    pub blocks: Vec<ScreenplayBlock>,
    pub policy: StructurePipelinePolicy,
    pub merges: MergeReport,
    #[serde(skip)]
    pub physical: Vec<Line>,
}

impl StructurePipelineResult {
    /// Non-blank physical lines fed into the run.
    pub fn input_line_count(&self) -> usize {
        self.physical.iter().filter(|l| !l.is_blank()).count()
    }

    /// Check that every block splits back into the normalized lines it was
    /// merged from. Under `limited-rewrite` only whitespace may differ.
    pub fn reconstructs_normalized_lines(&self) -> bool {
        if self.blocks.len() != self.merges.block_sources.len() {
            return false;
        }
        let covered: usize = self.merges.block_sources.iter().map(|r| r.len()).sum();
        if covered != self.normalized_lines.len() {
            return false;
        }

        self.blocks
            .iter()
            .zip(&self.merges.block_sources)
            .all(|(block, source)| {
                let Some(members) = self.normalized_lines.get(source.clone()) else {
                    return false;
                };
                let parts: Vec<&str> = block.text.split('\n').collect();
                parts.len() == members.len()
                    && parts
                        .iter()
                        .zip(members)
                        .all(|(part, line)| self.same_text(part, &line.text))
            })
    }

    fn same_text(&self, block_part: &str, normalized: &str) -> bool {
        match self.policy.classifier_role {
            ClassifierRole::LabelOnly => block_part == normalized,
            ClassifierRole::LimitedRewrite => block_part
                .chars()
                .filter(|c| !c.is_whitespace())
                .eq(normalized.chars().filter(|c| !c.is_whitespace())),
        }
    }
}

/// Run the classification pass without a guard.
pub fn run_pipeline(raw: &str, policy: StructurePipelinePolicy) -> StructurePipelineResult {
    let normalized = normalize(raw);
    let normalized_text = normalized.text();
    let classified = classify_lines(&normalized.lines, policy.classifier_role);
    let (blocks, merges) = merge_lines(&classified, policy.merge_policy);

    debug!(
        physical = normalized.physical.len(),
        logical = normalized.lines.len(),
        "normalized input"
    );
    info!(
        blocks = blocks.len(),
        merges = merges.declared_merges(),
        merge_policy = policy.merge_policy.as_str(),
        "structure pipeline complete"
    );

    StructurePipelineResult {
        normalized_text,
        normalized_lines: normalized.lines,
        classified,
        blocks,
        policy,
        merges,
        physical: normalized.physical,
    }
}

/// A pipeline run checked against the current document.
#[derive(Debug, Clone)]
pub struct GuardedRun {
    pub result: StructurePipelineResult,
    pub report: ProjectionGuardReport,
    pub outcome: GuardOutcome,
}

impl GuardedRun {
    /// Blocks safe to commit, or `None` when the current document must be kept.
    pub fn committed_blocks(&self) -> Option<&[ScreenplayBlock]> {
        self.outcome.blocks()
    }
}

/// Run the pipeline and pass its output through the projection guard.
pub fn run_guarded(
    raw: &str,
    policy: StructurePipelinePolicy,
    current: Option<&[ScreenplayBlock]>,
    remedy: GuardRemedy,
    thresholds: &GuardThresholds,
) -> GuardedRun {
    let result = run_pipeline(raw, policy);
    let stats = current.map(CurrentDocumentStats::from_blocks);
    let mut report = guard::evaluate(result.input_line_count(), &result.blocks, stats, thresholds);
    let outcome = guard::remediate(&mut report, result.blocks.clone(), remedy, &result.physical);
    GuardedRun {
        result,
        report,
        outcome,
    }
}
