//! Merge engine: groups classified lines into screenplay blocks.
//!
//! Grouping never rewrites text. Members of a merged block are joined with
//! `\n`, so a block always splits back into exactly the lines it was built
//! from.

use std::ops::Range;

use serde::Serialize;

use sceneline_core::{FormatId, MergePolicy, ScreenplayBlock};

use crate::classifier::ClassifiedLine;

/// Longest line (in chars) eligible for an aggressive short-line merge.
pub const SHORT_LINE_MAX_CHARS: usize = 40;

/// Which classified lines ended up in which block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    /// One range of classified-line positions per output block.
    pub block_sources: Vec<Range<usize>>,
}

impl MergeReport {
    /// Blocks built from more than one line.
    pub fn merged_groups(&self) -> impl Iterator<Item = &Range<usize>> {
        self.block_sources.iter().filter(|r| r.len() > 1)
    }

    /// Lines absorbed into a preceding block.
    pub fn declared_merges(&self) -> usize {
        self.merged_groups().map(|r| r.len() - 1).sum()
    }
}

/// Combine classified lines into blocks under `policy`.
pub fn merge_lines(
    lines: &[ClassifiedLine],
    policy: MergePolicy,
) -> (Vec<ScreenplayBlock>, MergeReport) {
    let mut blocks: Vec<ScreenplayBlock> = Vec::with_capacity(lines.len());
    let mut report = MergeReport::default();

    for (pos, line) in lines.iter().enumerate() {
        let joins = pos > 0 && joins_previous(&lines[pos - 1], line, policy);
        match (joins, blocks.last_mut(), report.block_sources.last_mut()) {
            (true, Some(block), Some(source)) => {
                block.text.push('\n');
                block.text.push_str(&line.text);
                source.end = pos + 1;
            }
            _ => {
                blocks.push(ScreenplayBlock::new(line.format_id, line.text.clone()));
                report.block_sources.push(pos..pos + 1);
            }
        }
    }

    (blocks, report)
}

fn joins_previous(prev: &ClassifiedLine, line: &ClassifiedLine, policy: MergePolicy) -> bool {
    let indented_continuation = prev.format_id == FormatId::Action
        && line.format_id == FormatId::Action
        && line.indented;

    match policy {
        MergePolicy::None => false,
        MergePolicy::Safe => indented_continuation,
        MergePolicy::Aggressive => {
            indented_continuation
                || (prev.format_id == line.format_id
                    && matches!(line.format_id, FormatId::Action | FormatId::Dialogue)
                    && is_short(&prev.text)
                    && is_short(&line.text))
        }
    }
}

fn is_short(text: &str) -> bool {
    text.chars().count() <= SHORT_LINE_MAX_CHARS
}
