//! Review request validation.
//!
//! Works on the raw JSON value so that every shape problem is reported with
//! a precise reason instead of a generic deserialisation error. Fails on the
//! first problem found; nothing is partially accepted.

use std::collections::HashSet;

use serde_json::{Map, Value};

use sceneline_core::review::{
    MAX_CONTEXT_TEXT_CHARS, MAX_REASONS, MAX_SESSION_ID_CHARS, MAX_SUSPICIOUS_TEXT_CHARS,
};
use sceneline_core::{AgentReviewRequest, FormatId, RoutingBand};

use crate::error::ValidationError;

const MAX_SCORE: f64 = 100.0;

type Result<T> = std::result::Result<T, ValidationError>;

/// Validate a raw request body and return the normalized typed request.
///
/// `requiredItemIndexes` defaults to every suspicious `itemIndex` when
/// omitted, `forcedItemIndexes` to the `agent-forced` ones. Both lists are
/// deduplicated, keeping first occurrence order.
pub fn validate_request(body: &Value) -> Result<AgentReviewRequest> {
    let obj = body
        .as_object()
        .ok_or_else(|| ValidationError::new("request body must be a JSON object"))?;

    let session_id = match obj.get("sessionId").and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => s,
        _ => return Err(ValidationError::new("sessionId must be a non-empty string")),
    };
    if session_id.chars().count() > MAX_SESSION_ID_CHARS {
        return Err(ValidationError::new(format!(
            "sessionId exceeds {MAX_SESSION_ID_CHARS} characters"
        )));
    }

    let total_reviewed = obj
        .get("totalReviewed")
        .and_then(Value::as_u64)
        .ok_or_else(|| ValidationError::new("totalReviewed must be a non-negative integer"))?;

    let lines = obj
        .get("suspiciousLines")
        .and_then(Value::as_array)
        .ok_or_else(|| ValidationError::new("suspiciousLines must be an array"))?;

    let mut known = Vec::with_capacity(lines.len());
    let mut default_forced = Vec::new();
    for (pos, line) in lines.iter().enumerate() {
        let checked = check_line(line, pos)?;
        if known.contains(&checked.item_index) {
            return Err(ValidationError::new(format!(
                "suspiciousLines[{pos}].itemIndex {} is duplicated",
                checked.item_index
            )));
        }
        known.push(checked.item_index);
        if checked.forced {
            default_forced.push(checked.item_index);
        }
    }

    let required = match index_list(obj, "requiredItemIndexes")? {
        Some(list) => list,
        None => known.clone(),
    };
    let forced = match index_list(obj, "forcedItemIndexes")? {
        Some(list) => list,
        None => default_forced,
    };

    let known_set: HashSet<u64> = known.iter().copied().collect();
    if let Some(idx) = required.iter().find(|i| !known_set.contains(i)) {
        return Err(ValidationError::new(format!(
            "requiredItemIndexes references unknown itemIndex {idx}"
        )));
    }
    if let Some(idx) = forced.iter().find(|i| !known_set.contains(i)) {
        return Err(ValidationError::new(format!(
            "forcedItemIndexes references unknown itemIndex {idx}"
        )));
    }
    if let Some(idx) = forced.iter().find(|i| !required.contains(i)) {
        return Err(ValidationError::new(format!(
            "forced itemIndex {idx} is not in requiredItemIndexes"
        )));
    }

    let mut request: AgentReviewRequest = serde_json::from_value(body.clone())
        .map_err(|e| ValidationError::new(format!("malformed request: {e}")))?;
    request.session_id = session_id.to_string();
    request.total_reviewed = total_reviewed;
    request.required_item_indexes = required;
    request.forced_item_indexes = forced;
    Ok(request)
}

/// Re-check a request built in code so it carries the same guarantees as
/// one that arrived over the wire.
pub trait Validate: Sized {
    fn validated(self) -> Result<Self>;
}

impl Validate for AgentReviewRequest {
    fn validated(self) -> Result<Self> {
        let value = serde_json::to_value(&self)
            .map_err(|e| ValidationError::new(format!("request is not serializable: {e}")))?;
        validate_request(&value)
    }
}

// ── Field checks ──

struct CheckedLine {
    item_index: u64,
    forced: bool,
}

fn check_line(line: &Value, pos: usize) -> Result<CheckedLine> {
    let at = |field: &str| format!("suspiciousLines[{pos}].{field}");
    let obj = line
        .as_object()
        .ok_or_else(|| ValidationError::new(format!("suspiciousLines[{pos}] must be an object")))?;

    let item_index = require_index(obj, "itemIndex", &at)?;
    require_index(obj, "lineIndex", &at)?;
    require_text(obj, "text", MAX_SUSPICIOUS_TEXT_CHARS, &at)?;
    require_type(obj, "assignedType", &at)?;

    match obj.get("totalSuspicion").and_then(Value::as_f64) {
        Some(score) if (0.0..=MAX_SCORE).contains(&score) => {}
        _ => {
            return Err(ValidationError::new(format!(
                "{} must be a number in [0, 100]",
                at("totalSuspicion")
            )));
        }
    }
    if let Some(score) = present(obj, "escalationScore") {
        if !score.as_f64().is_some_and(|s| (0.0..=MAX_SCORE).contains(&s)) {
            return Err(ValidationError::new(format!(
                "{} must be a number in [0, 100]",
                at("escalationScore")
            )));
        }
    }

    let band = match present(obj, "routingBand") {
        None => None,
        Some(v) => match v.as_str().and_then(RoutingBand::parse) {
            Some(band) => Some(band),
            None => {
                return Err(ValidationError::new(format!(
                    "{} must be agent-candidate or agent-forced",
                    at("routingBand")
                )));
            }
        },
    };

    if present(obj, "criticalMismatch").is_some_and(|v| !v.is_boolean()) {
        return Err(ValidationError::new(format!("{} must be a boolean", at("criticalMismatch"))));
    }
    if present(obj, "distinctDetectors").is_some_and(|v| v.as_u64().is_none()) {
        return Err(ValidationError::new(format!(
            "{} must be a non-negative integer",
            at("distinctDetectors")
        )));
    }

    if let Some(reasons) = present(obj, "reasons") {
        let list = reasons
            .as_array()
            .filter(|l| l.iter().all(Value::is_string))
            .ok_or_else(|| ValidationError::new(format!("{} must be an array of strings", at("reasons"))))?;
        if list.len() > MAX_REASONS {
            return Err(ValidationError::new(format!(
                "{} has more than {MAX_REASONS} entries",
                at("reasons")
            )));
        }
    }

    if let Some(context) = present(obj, "contextLines") {
        let list = context
            .as_array()
            .ok_or_else(|| ValidationError::new(format!("{} must be an array", at("contextLines"))))?;
        for (j, ctx) in list.iter().enumerate() {
            let ctx_at = |field: &str| format!("suspiciousLines[{pos}].contextLines[{j}].{field}");
            let ctx_obj = ctx.as_object().ok_or_else(|| {
                ValidationError::new(format!("suspiciousLines[{pos}].contextLines[{j}] must be an object"))
            })?;
            require_index(ctx_obj, "lineIndex", &ctx_at)?;
            require_type(ctx_obj, "assignedType", &ctx_at)?;
            match ctx_obj.get("text").and_then(Value::as_str) {
                Some(t) if t.chars().count() <= MAX_CONTEXT_TEXT_CHARS => {}
                _ => {
                    return Err(ValidationError::new(format!(
                        "{} must be a string of at most {MAX_CONTEXT_TEXT_CHARS} characters",
                        ctx_at("text")
                    )));
                }
            }
        }
    }

    Ok(CheckedLine {
        item_index,
        forced: band == Some(RoutingBand::AgentForced),
    })
}

/// A field that is present and not `null`.
fn present<'a>(obj: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    obj.get(field).filter(|v| !v.is_null())
}

fn require_index(
    obj: &Map<String, Value>,
    field: &str,
    at: &dyn Fn(&str) -> String,
) -> Result<u64> {
    obj.get(field)
        .and_then(Value::as_u64)
        .ok_or_else(|| ValidationError::new(format!("{} must be a non-negative integer", at(field))))
}

fn require_text(
    obj: &Map<String, Value>,
    field: &str,
    max_chars: usize,
    at: &dyn Fn(&str) -> String,
) -> Result<()> {
    match obj.get(field).and_then(Value::as_str) {
        Some(t) if !t.trim().is_empty() && t.chars().count() <= max_chars => Ok(()),
        _ => Err(ValidationError::new(format!(
            "{} must be a non-empty string of at most {max_chars} characters",
            at(field)
        ))),
    }
}

fn require_type(obj: &Map<String, Value>, field: &str, at: &dyn Fn(&str) -> String) -> Result<()> {
    match obj.get(field).and_then(Value::as_str) {
        Some(t) if t.parse::<FormatId>().is_ok() => Ok(()),
        _ => Err(ValidationError::new(format!(
            "{} must be one of the allowed line types",
            at(field)
        ))),
    }
}

/// Optional list of item indexes, deduplicated in first-seen order.
fn index_list(obj: &Map<String, Value>, field: &str) -> Result<Option<Vec<u64>>> {
    let Some(value) = present(obj, field) else {
        return Ok(None);
    };
    let items = value
        .as_array()
        .ok_or_else(|| ValidationError::new(format!("{field} must be an array of integers")))?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let idx = item
            .as_u64()
            .ok_or_else(|| ValidationError::new(format!("{field} must be an array of integers")))?;
        if !out.contains(&idx) {
            out.push(idx);
        }
    }
    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn line(item_index: u64, band: &str) -> Value {
        json!({
            "itemIndex": item_index,
            "lineIndex": item_index + 10,
            "text": "يدخل أحمد الغرفة",
            "assignedType": "dialogue",
            "totalSuspicion": 55.0,
            "routingBand": band,
            "reasons": ["dialogue opens with a narrative verb"],
        })
    }

    fn body(lines: Vec<Value>) -> Value {
        json!({
            "sessionId": "session-1",
            "totalReviewed": 20,
            "suspiciousLines": lines,
        })
    }

    fn reason(value: Value) -> String {
        validate_request(&value).unwrap_err().reason().to_string()
    }

    #[test]
    fn defaults_required_and_forced() {
        let req = validate_request(&body(vec![
            line(0, "agent-candidate"),
            line(1, "agent-forced"),
        ]))
        .unwrap();
        assert_eq!(req.required_item_indexes, vec![0, 1]);
        assert_eq!(req.forced_item_indexes, vec![1]);
        assert_eq!(req.suspicious_lines[1].line_index, 11);
    }

    #[test]
    fn deduplicates_index_lists() {
        let mut value = body(vec![line(0, "agent-forced"), line(1, "agent-candidate")]);
        value["requiredItemIndexes"] = json!([1, 0, 1, 0]);
        value["forcedItemIndexes"] = json!([0, 0]);
        let req = validate_request(&value).unwrap();
        assert_eq!(req.required_item_indexes, vec![1, 0]);
        assert_eq!(req.forced_item_indexes, vec![0]);
    }

    #[test]
    fn rejects_non_object() {
        assert_eq!(reason(json!([1, 2])), "request body must be a JSON object");
    }

    #[test]
    fn rejects_bad_session_and_total() {
        let mut value = body(vec![]);
        value["sessionId"] = json!("   ");
        assert!(reason(value).contains("sessionId"));

        let mut value = body(vec![]);
        value["sessionId"] = json!("x".repeat(MAX_SESSION_ID_CHARS + 1));
        assert!(reason(value).contains("exceeds"));

        let mut value = body(vec![]);
        value["totalReviewed"] = json!(2.5);
        assert!(reason(value).contains("totalReviewed"));
    }

    #[test]
    fn integral_floats_are_not_integers() {
        let mut value = body(vec![]);
        value["totalReviewed"] = json!(5.0);
        assert_eq!(reason(value), "totalReviewed must be a non-negative integer");

        let mut value = body(vec![line(0, "agent-candidate")]);
        value["suspiciousLines"][0]["itemIndex"] = json!(1.0);
        assert_eq!(
            reason(value),
            "suspiciousLines[0].itemIndex must be a non-negative integer"
        );

        let mut value = body(vec![line(0, "agent-candidate")]);
        value["requiredItemIndexes"] = json!([0.0]);
        assert!(reason(value).contains("array of integers"));
    }

    #[test]
    fn rejects_bad_line_fields() {
        let mut bad = line(0, "agent-forced");
        bad["assignedType"] = json!("shot");
        assert!(reason(body(vec![bad])).contains("assignedType"));

        let mut bad = line(0, "agent-forced");
        bad["routingBand"] = json!("urgent");
        assert!(reason(body(vec![bad])).contains("routingBand"));

        let mut bad = line(0, "agent-forced");
        bad["totalSuspicion"] = json!(140);
        assert!(reason(body(vec![bad])).contains("totalSuspicion"));

        let mut bad = line(0, "agent-forced");
        bad["itemIndex"] = json!(-1);
        assert!(reason(body(vec![bad])).contains("itemIndex"));

        let mut bad = line(0, "agent-forced");
        bad["text"] = json!("ا".repeat(MAX_SUSPICIOUS_TEXT_CHARS + 1));
        assert!(reason(body(vec![bad])).contains("text"));

        let mut bad = line(0, "agent-forced");
        bad["reasons"] = json!(vec!["r"; MAX_REASONS + 1]);
        assert!(reason(body(vec![bad])).contains("reasons"));

        let mut bad = line(0, "agent-forced");
        bad["contextLines"] = json!([{ "lineIndex": 3, "assignedType": "action" }]);
        assert!(reason(body(vec![bad])).contains("contextLines[0].text"));
    }

    #[test]
    fn rejects_duplicate_item_index() {
        let err = reason(body(vec![line(2, "agent-candidate"), line(2, "agent-forced")]));
        assert!(err.contains("duplicated"));
    }

    #[test]
    fn rejects_subset_violations() {
        let mut value = body(vec![line(0, "agent-candidate")]);
        value["requiredItemIndexes"] = json!([0, 7]);
        assert!(reason(value).contains("unknown itemIndex 7"));

        let mut value = body(vec![line(0, "agent-candidate")]);
        value["forcedItemIndexes"] = json!([9]);
        assert!(reason(value).contains("unknown itemIndex 9"));

        let mut value = body(vec![line(0, "agent-forced"), line(1, "agent-candidate")]);
        value["requiredItemIndexes"] = json!([1]);
        assert!(reason(value).contains("forced itemIndex 0"));
    }

    #[test]
    fn ignores_unknown_fields() {
        let mut value = body(vec![line(0, "agent-candidate")]);
        value["client"] = json!("desktop");
        value["suspiciousLines"][0]["debug"] = json!({"x": 1});
        assert!(validate_request(&value).is_ok());
    }

    #[test]
    fn typed_requests_are_revalidated() {
        let mut req = validate_request(&body(vec![line(0, "agent-forced")])).unwrap();
        req.required_item_indexes.clear();
        let err = req.validated().unwrap_err();
        assert_eq!(err.status(), 400);
        assert!(err.reason().contains("forced itemIndex 0"));
    }
}
