//! Reconciling raw service output into review decisions.
//!
//! Never fails: text that cannot be understood degrades to an empty
//! decision set.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use sceneline_core::{AgentReviewRequest, FormatId, ReviewDecision};

const DEFAULT_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDecisions {
    /// Accepted decisions, one per item, ordered by `itemIndex`.
    pub decisions: Vec<ReviewDecision>,
    /// Entries dropped as malformed, unknown or superseded.
    pub discarded: usize,
}

pub fn parse_decisions(raw: &str, request: &AgentReviewRequest) -> ParsedDecisions {
    let Some(value) = extract_json(raw) else {
        debug!(chars = raw.len(), "no JSON found in service output");
        return ParsedDecisions::default();
    };

    let entries: &[Value] = match &value {
        Value::Array(items) => items.as_slice(),
        Value::Object(obj) => match obj.get("decisions") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    let mut best: BTreeMap<u64, ReviewDecision> = BTreeMap::new();
    let mut discarded = 0;
    for entry in entries {
        let Some(decision) = decision_from(entry, request) else {
            discarded += 1;
            continue;
        };
        let outranked = best
            .get(&decision.item_index)
            .is_some_and(|kept| kept.confidence >= decision.confidence);
        if outranked {
            discarded += 1;
            continue;
        }
        if best.insert(decision.item_index, decision).is_some() {
            discarded += 1;
        }
    }

    ParsedDecisions {
        decisions: best.into_values().collect(),
        discarded,
    }
}

/// Parse `raw` as JSON, falling back to the first `{` .. last `}` span.
pub fn extract_json(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

fn decision_from(entry: &Value, request: &AgentReviewRequest) -> Option<ReviewDecision> {
    let obj = entry.as_object()?;
    let item_index = obj.get("itemIndex")?.as_u64()?;
    request.line(item_index)?;
    let final_type: FormatId = obj.get("finalType")?.as_str()?.parse().ok()?;
    let confidence = obj
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_CONFIDENCE)
        .clamp(0.0, 1.0);
    let reason = obj
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(ReviewDecision {
        item_index,
        final_type,
        confidence,
        reason,
    })
}
