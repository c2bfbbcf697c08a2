//! Terminal rendering for blocks, guard reports, assessments and review results.

use sceneline_classify::{LineAssessment, ProjectionGuardReport};
use sceneline_core::{AgentReviewResponse, ScreenplayBlock};

const MAX_PREVIEW_CHARS: usize = 60;

// ── Public API ──

/// One line per block: index, format, text preview.
pub fn print_blocks(blocks: &[ScreenplayBlock]) {
    if blocks.is_empty() {
        println!("(no blocks)");
        return;
    }
    println!("{:>4}  {:<22} text", "#", "format");
    for (i, block) in blocks.iter().enumerate() {
        println!("{:>4}  {:<22} {}", i, block.format_id.as_str(), preview(&block.text));
    }
}

pub fn print_guard_report(report: &ProjectionGuardReport) {
    let verdict = match (report.accepted, report.fallback_applied) {
        (true, _) => "accepted",
        (false, true) => "rejected (line fallback applied)",
        (false, false) => "rejected (current document kept)",
    };
    println!("Projection guard: {verdict}");
    println!("  {:<26} {}", "input lines", report.input_line_count);
    println!("  {:<26} {}", "output blocks", report.output_block_count);
    println!("  {:<26} {}", "output non-action", report.output_non_action_count);
    if let Some(n) = report.current_block_count {
        println!("  {:<26} {}", "current blocks", n);
    }
    if let Some(n) = report.current_non_action_count {
        println!("  {:<26} {}", "current non-action", n);
    }
    for reason in &report.reasons {
        println!("  - {reason}");
    }
    println!();
}

/// Escalated lines only, strongest first.
pub fn print_assessments(blocks: &[ScreenplayBlock], assessments: &[LineAssessment]) {
    let mut escalated: Vec<&LineAssessment> =
        assessments.iter().filter(|a| a.is_escalated()).collect();
    if escalated.is_empty() {
        println!("No lines escalated ({} scored).", assessments.len());
        return;
    }
    escalated.sort_by(|a, b| b.escalation_score.total_cmp(&a.escalation_score));

    println!(
        "{:>4}  {:<16} {:<14} {:>6}  text",
        "#", "band", "format", "score"
    );
    for a in escalated {
        let band = a.routing_band.map(|b| b.as_str()).unwrap_or_default();
        let text = blocks
            .get(a.line_index)
            .map(|b| preview(&b.text))
            .unwrap_or_default();
        println!(
            "{:>4}  {:<16} {:<14} {:>6.1}  {}",
            a.line_index,
            band,
            a.format_id.as_str(),
            a.escalation_score,
            text
        );
        for reason in a.reasons() {
            println!("{:>8}- {reason}", "");
        }
    }
}

pub fn print_review_summary(response: &AgentReviewResponse) {
    let meta = &response.meta;
    println!("Review: {} ({} ms)", response.status.as_str(), response.latency_ms);
    println!("  {}", response.message);
    println!("  {:<26} {}", "requested", meta.requested_count);
    println!("  {:<26} {}", "decisions", meta.decision_count);
    if !meta.missing_item_indexes.is_empty() {
        println!("  {:<26} {}", "missing", join_indexes(&meta.missing_item_indexes));
    }
    if !meta.unresolved_forced_item_indexes.is_empty() {
        println!(
            "  {:<26} {}",
            "unresolved forced",
            join_indexes(&meta.unresolved_forced_item_indexes)
        );
    }
    if let Some(transport) = &meta.transport {
        println!("  {:<26} {}", "transport", transport);
    }
    println!();
}

// ── Formatting ──

/// First line of `text`, cut to a fixed number of characters.
fn preview(text: &str) -> String {
    let first = text.lines().next().unwrap_or_default();
    let mut out: String = first.chars().take(MAX_PREVIEW_CHARS).collect();
    if first.chars().count() > MAX_PREVIEW_CHARS || text.contains('\n') {
        out.push('…');
    }
    out
}

fn join_indexes(indexes: &[u64]) -> String {
    indexes
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
