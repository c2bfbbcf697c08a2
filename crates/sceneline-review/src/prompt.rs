//! Payload sent to the decision service.

use serde::Serialize;
use serde_json::json;

use sceneline_core::{AgentReviewRequest, FormatId};

const BASE_MAX_TOKENS: u32 = 600;
const TOKENS_PER_LINE: u32 = 120;
const MAX_TOKENS_CAP: u32 = 4096;

/// System instructions plus the compact item list for one review call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewPayload {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

/// Output budget: grows with the number of lines, capped.
pub fn max_tokens_for(lines: usize) -> u32 {
    let lines = u32::try_from(lines).unwrap_or(u32::MAX);
    BASE_MAX_TOKENS
        .saturating_add(TOKENS_PER_LINE.saturating_mul(lines))
        .clamp(BASE_MAX_TOKENS, MAX_TOKENS_CAP)
}

pub fn system_prompt() -> String {
    let allowed = FormatId::ALL
        .iter()
        .map(FormatId::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "\
You review the structural classification of lines from an Arabic screenplay.

Each item is one line with the type a rule-based classifier assigned to it, the \
reasons it was flagged, and a few neighbouring lines for context. Decide the \
correct type for every item. Items marked \"forced\" must receive a decision.

Allowed types: {allowed}

Respond ONLY with a JSON object. No markdown fences, no explanation, just raw JSON:
{{
  \"decisions\": [
    {{\"itemIndex\": 0, \"finalType\": \"one of the allowed types\", \"confidence\": 0.0, \"reason\": \"short justification\"}}
  ]
}}

Use each itemIndex exactly as given. confidence is a number between 0 and 1. \
If the assigned type is already correct, return it unchanged as finalType."
    )
}

pub fn build_payload(request: &AgentReviewRequest) -> ReviewPayload {
    let items: Vec<_> = request
        .suspicious_lines
        .iter()
        .map(|line| {
            json!({
                "itemIndex": line.item_index,
                "assignedType": line.assigned_type,
                "text": line.text,
                "required": request.required_item_indexes.contains(&line.item_index),
                "forced": request.forced_item_indexes.contains(&line.item_index),
                "reasons": line.reasons,
                "context": line.context_lines.iter().map(|c| json!({
                    "lineIndex": c.line_index,
                    "assignedType": c.assigned_type,
                    "text": c.text,
                })).collect::<Vec<_>>(),
            })
        })
        .collect();

    let user = format!(
        "Session: {session}\n\
         Lines in document: {total}\n\
         Items to review: {count}\n\
         \n\
         {items}",
        session = request.session_id,
        total = request.total_reviewed,
        count = items.len(),
        items = serde_json::Value::Array(items),
    );

    ReviewPayload {
        system: system_prompt(),
        user,
        max_tokens: max_tokens_for(request.suspicious_lines.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sceneline_core::{ReviewContextLine, RoutingBand, SuspiciousLine};

    fn request() -> AgentReviewRequest {
        AgentReviewRequest {
            session_id: "s-9".into(),
            total_reviewed: 30,
            suspicious_lines: vec![SuspiciousLine {
                item_index: 0,
                line_index: 12,
                text: "تدخل نور".into(),
                assigned_type: FormatId::Dialogue,
                total_suspicion: 45.0,
                escalation_score: Some(45.0),
                routing_band: Some(RoutingBand::AgentForced),
                critical_mismatch: Some(true),
                distinct_detectors: Some(1),
                reasons: vec!["dialogue opens with a narrative verb".into()],
                context_lines: vec![ReviewContextLine {
                    line_index: 11,
                    assigned_type: FormatId::Character,
                    text: "نور:".into(),
                }],
            }],
            required_item_indexes: vec![0],
            forced_item_indexes: vec![0],
        }
    }

    #[test]
    fn max_tokens_scale_and_cap() {
        assert_eq!(max_tokens_for(0), 600);
        assert_eq!(max_tokens_for(1), 720);
        assert_eq!(max_tokens_for(10), 1800);
        assert_eq!(max_tokens_for(29), 4080);
        assert_eq!(max_tokens_for(30), 4096);
        assert_eq!(max_tokens_for(usize::MAX), 4096);
    }

    #[test]
    fn system_prompt_lists_every_type() {
        let prompt = system_prompt();
        for format in FormatId::ALL {
            assert!(prompt.contains(format.as_str()), "missing {format}");
        }
        assert!(prompt.contains("\"decisions\""));
    }

    #[test]
    fn user_message_carries_items() {
        let payload = build_payload(&request());
        assert_eq!(payload.max_tokens, 720);
        assert!(payload.user.starts_with("Session: s-9\n"));
        let json_start = payload.user.find('[').unwrap();
        let items: serde_json::Value = serde_json::from_str(&payload.user[json_start..]).unwrap();
        assert_eq!(items[0]["itemIndex"], 0);
        assert_eq!(items[0]["assignedType"], "dialogue");
        assert_eq!(items[0]["forced"], true);
        assert_eq!(items[0]["context"][0]["assignedType"], "character");
    }
}
