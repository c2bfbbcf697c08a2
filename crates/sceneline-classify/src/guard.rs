//! Projection guard: refuses pipeline output that would destructively
//! replace the current document.

use serde::{Deserialize, Serialize};
use tracing::warn;

use sceneline_core::{FormatId, ScreenplayBlock, document};

use crate::normalizer::Line;

/// Rejection thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardThresholds {
    /// Block-count collapse is only judged for documents at least this big.
    pub min_current_blocks: usize,
    /// Output must keep at least this fraction of the current block count.
    pub min_block_ratio: f64,
    /// Output must keep at least this fraction of current non-action blocks.
    pub min_non_action_ratio: f64,
    /// Non-action collapse is only judged above this many current non-action blocks.
    pub min_current_non_action: usize,
}

impl Default for GuardThresholds {
    fn default() -> Self {
        Self {
            min_current_blocks: 8,
            min_block_ratio: 0.35,
            min_non_action_ratio: 0.30,
            min_current_non_action: 3,
        }
    }
}

/// What is known about the document currently on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentDocumentStats {
    pub block_count: usize,
    pub non_action_count: Option<usize>,
}

impl CurrentDocumentStats {
    pub fn from_blocks(blocks: &[ScreenplayBlock]) -> Self {
        Self {
            block_count: blocks.len(),
            non_action_count: Some(document::non_action_count(blocks)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionGuardReport {
    pub accepted: bool,
    pub reasons: Vec<String>,
    pub input_line_count: usize,
    pub output_block_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_block_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_non_action_count: Option<usize>,
    pub output_non_action_count: usize,
    pub fallback_applied: bool,
}

/// Compare pipeline output against the current document.
pub fn evaluate(
    input_line_count: usize,
    output: &[ScreenplayBlock],
    current: Option<CurrentDocumentStats>,
    thresholds: &GuardThresholds,
) -> ProjectionGuardReport {
    let output_block_count = output.len();
    let output_non_action_count = document::non_action_count(output);
    let mut reasons = Vec::new();

    if input_line_count > 0 && output_block_count == 0 {
        reasons.push(format!(
            "output dropped every input line ({input_line_count} lines in, 0 blocks out)"
        ));
    }

    if let Some(current) = current {
        let floor = thresholds.min_block_ratio * current.block_count as f64;
        if current.block_count >= thresholds.min_current_blocks
            && (output_block_count as f64) < floor
        {
            reasons.push(format!(
                "block count collapsed from {} to {output_block_count} (below {:.0}% of current)",
                current.block_count,
                thresholds.min_block_ratio * 100.0
            ));
        }

        if let Some(current_non_action) = current.non_action_count {
            let floor = thresholds.min_non_action_ratio * current_non_action as f64;
            if current_non_action >= thresholds.min_current_non_action
                && (output_non_action_count as f64) < floor
            {
                reasons.push(format!(
                    "non-action content collapsed into action: {current_non_action} structural blocks became {output_non_action_count}"
                ));
            }
        }
    }

    let report = ProjectionGuardReport {
        accepted: reasons.is_empty(),
        reasons,
        input_line_count,
        output_block_count,
        current_block_count: current.map(|c| c.block_count),
        current_non_action_count: current.and_then(|c| c.non_action_count),
        output_non_action_count,
        fallback_applied: false,
    };

    if !report.accepted {
        warn!(
            reasons = report.reasons.len(),
            output_blocks = output_block_count,
            "projection guard rejected pipeline output"
        );
    }
    report
}

/// What the caller wants done with rejected output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GuardRemedy {
    /// Leave the current document untouched.
    #[default]
    KeepCurrent,
    /// Replace it with one action block per input line.
    LineFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Accepted(Vec<ScreenplayBlock>),
    /// Rejected; the current document must stay as it is.
    Held,
    Fallback(Vec<ScreenplayBlock>),
}

impl GuardOutcome {
    /// Blocks the caller may commit, if any.
    pub fn blocks(&self) -> Option<&[ScreenplayBlock]> {
        match self {
            Self::Accepted(blocks) | Self::Fallback(blocks) => Some(blocks),
            Self::Held => None,
        }
    }
}

/// Resolve a guard report into something the caller can commit.
pub fn remediate(
    report: &mut ProjectionGuardReport,
    blocks: Vec<ScreenplayBlock>,
    remedy: GuardRemedy,
    physical: &[Line],
) -> GuardOutcome {
    if report.accepted {
        return GuardOutcome::Accepted(blocks);
    }
    match remedy {
        GuardRemedy::KeepCurrent => GuardOutcome::Held,
        GuardRemedy::LineFallback => {
            report.fallback_applied = true;
            GuardOutcome::Fallback(line_fallback(physical))
        }
    }
}

/// Every non-blank physical line becomes its own action block.
pub fn line_fallback(physical: &[Line]) -> Vec<ScreenplayBlock> {
    physical
        .iter()
        .filter(|l| !l.is_blank())
        .map(|l| ScreenplayBlock::new(FormatId::Action, l.trimmed_text.clone()))
        .collect()
}
