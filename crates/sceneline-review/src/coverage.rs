//! Coverage bookkeeping and status selection. Pure functions of the request
//! and the reconciled decisions.

use std::collections::HashMap;

use sceneline_core::{AgentReviewRequest, CoverageMeta, ReviewDecision, ReviewStatus};

pub fn compute_coverage(request: &AgentReviewRequest, decisions: &[ReviewDecision]) -> CoverageMeta {
    let decided: HashMap<u64, &ReviewDecision> =
        decisions.iter().map(|d| (d.item_index, d)).collect();

    let missing_item_indexes = request
        .required_item_indexes
        .iter()
        .copied()
        .filter(|idx| !decided.contains_key(idx))
        .collect();

    // A forced line counts as resolved only by a decision that changes its
    // type; a bare confirmation leaves it unresolved.
    let unresolved_forced_item_indexes = request
        .forced_item_indexes
        .iter()
        .copied()
        .filter(|idx| match (decided.get(idx), request.line(*idx)) {
            (Some(decision), Some(line)) => decision.final_type == line.assigned_type,
            _ => true,
        })
        .collect();

    CoverageMeta {
        requested_count: request.suspicious_lines.len(),
        decision_count: decisions.len(),
        required_item_indexes: request.required_item_indexes.clone(),
        forced_item_indexes: request.forced_item_indexes.clone(),
        missing_item_indexes,
        unresolved_forced_item_indexes,
        ..CoverageMeta::default()
    }
}

/// error > warning > skipped > applied.
pub fn status_for(meta: &CoverageMeta) -> ReviewStatus {
    if !meta.unresolved_forced_item_indexes.is_empty() {
        ReviewStatus::Error
    } else if !meta.missing_item_indexes.is_empty() {
        ReviewStatus::Warning
    } else if meta.decision_count == 0 {
        ReviewStatus::Skipped
    } else {
        ReviewStatus::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sceneline_core::{FormatId, RoutingBand, SuspiciousLine};

    fn line(item_index: u64, forced: bool) -> SuspiciousLine {
        SuspiciousLine {
            item_index,
            line_index: item_index,
            text: "تدخل نور".into(),
            assigned_type: FormatId::Dialogue,
            total_suspicion: 60.0,
            escalation_score: None,
            routing_band: Some(if forced {
                RoutingBand::AgentForced
            } else {
                RoutingBand::AgentCandidate
            }),
            critical_mismatch: None,
            distinct_detectors: None,
            reasons: vec![],
            context_lines: vec![],
        }
    }

    fn request() -> AgentReviewRequest {
        AgentReviewRequest {
            session_id: "s".into(),
            total_reviewed: 8,
            suspicious_lines: vec![line(0, false), line(1, true), line(2, false)],
            required_item_indexes: vec![0, 1, 2],
            forced_item_indexes: vec![1],
        }
    }

    fn decision(item_index: u64, final_type: FormatId) -> ReviewDecision {
        ReviewDecision {
            item_index,
            final_type,
            confidence: 0.9,
            reason: String::new(),
        }
    }

    #[test]
    fn no_decisions() {
        let meta = compute_coverage(&request(), &[]);
        assert_eq!(meta.requested_count, 3);
        assert_eq!(meta.missing_item_indexes, vec![0, 1, 2]);
        assert_eq!(meta.unresolved_forced_item_indexes, vec![1]);
        assert_eq!(status_for(&meta), ReviewStatus::Error);
    }

    #[test]
    fn missing_shrinks_as_decisions_arrive() {
        let req = request();
        let mut decisions = vec![decision(1, FormatId::Action)];
        let before = compute_coverage(&req, &decisions);
        assert_eq!(before.missing_item_indexes, vec![0, 2]);
        assert_eq!(status_for(&before), ReviewStatus::Warning);

        decisions.push(decision(2, FormatId::Dialogue));
        let after = compute_coverage(&req, &decisions);
        assert_eq!(after.missing_item_indexes, vec![0]);
        assert!(after.missing_item_indexes.len() < before.missing_item_indexes.len());
    }

    #[test]
    fn full_coverage_is_applied() {
        let decisions = [
            decision(0, FormatId::Dialogue),
            decision(1, FormatId::Action),
            decision(2, FormatId::Action),
        ];
        let meta = compute_coverage(&request(), &decisions);
        assert!(meta.missing_item_indexes.is_empty());
        assert!(meta.unresolved_forced_item_indexes.is_empty());
        assert_eq!(status_for(&meta), ReviewStatus::Applied);
    }

    #[test]
    fn confirming_a_forced_line_leaves_it_unresolved() {
        // Every index decided, but the forced line keeps its assigned type.
        let decisions = [
            decision(0, FormatId::Action),
            decision(1, FormatId::Dialogue),
            decision(2, FormatId::Action),
        ];
        let meta = compute_coverage(&request(), &decisions);
        assert!(meta.missing_item_indexes.is_empty());
        assert_eq!(meta.unresolved_forced_item_indexes, vec![1]);
        assert_eq!(status_for(&meta), ReviewStatus::Error);
    }

    #[test]
    fn empty_request_is_skipped() {
        let req = AgentReviewRequest {
            session_id: "s".into(),
            total_reviewed: 0,
            suspicious_lines: vec![],
            required_item_indexes: vec![],
            forced_item_indexes: vec![],
        };
        assert_eq!(status_for(&compute_coverage(&req, &[])), ReviewStatus::Skipped);
    }
}
