//! Review coordinator: one bounded review call per classification cycle.
//!
//! `review` never returns an error. Transport and parse failures become a
//! response status; only request validation fails the call, and it does so
//! before any network traffic.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};

use sceneline_core::{
    AgentReviewRequest, AgentReviewResponse, CoverageMeta, ReviewStatus, ScreenplayBlock,
};

use crate::config::ReviewerConfig;
use crate::coverage::{compute_coverage, status_for};
use crate::error::{TransportError, ValidationError};
use crate::parse::parse_decisions;
use crate::prompt::{ReviewPayload, build_payload};
use crate::transport::ReviewTransport;
use crate::validate::validate_request;

pub struct ReviewCoordinator {
    config: ReviewerConfig,
    primary: Option<Arc<dyn ReviewTransport>>,
    fallback: Option<Arc<dyn ReviewTransport>>,
}

impl ReviewCoordinator {
    /// Coordinator with explicitly injected transports.
    pub fn new(
        config: ReviewerConfig,
        primary: Option<Arc<dyn ReviewTransport>>,
        fallback: Option<Arc<dyn ReviewTransport>>,
    ) -> Self {
        Self {
            config,
            primary,
            fallback,
        }
    }

    /// Coordinator talking to the Messages API at the configured URLs.
    /// Without a credential no transport is built.
    #[cfg(feature = "http")]
    pub fn from_config(config: ReviewerConfig) -> Result<Self, TransportError> {
        use crate::transport::MessagesTransport;

        let Some(key) = config.api_key.clone() else {
            return Ok(Self::new(config, None, None));
        };
        let primary: Arc<dyn ReviewTransport> =
            Arc::new(MessagesTransport::new("primary", &config.base_url, key.clone())?);
        let fallback: Arc<dyn ReviewTransport> =
            Arc::new(MessagesTransport::new("fallback", &config.fallback_url, key)?);
        Ok(Self::new(config, Some(primary), Some(fallback)))
    }

    pub fn config(&self) -> &ReviewerConfig {
        &self.config
    }

    /// Validate a raw request body, then review it.
    pub async fn review_value(&self, body: &Value) -> Result<AgentReviewResponse, ValidationError> {
        let request = validate_request(body)?;
        Ok(self.review(&request).await)
    }

    /// Review an already validated request.
    pub async fn review(&self, request: &AgentReviewRequest) -> AgentReviewResponse {
        let started = Instant::now();

        if request.suspicious_lines.is_empty() {
            return respond(
                ReviewStatus::Skipped,
                "no suspicious lines to review".into(),
                compute_coverage(request, &[]),
                Vec::new(),
                started,
            );
        }

        if !self.config.has_credential() || self.primary.is_none() {
            let meta = compute_coverage(request, &[]);
            let (status, message) = if request.has_forced() {
                (
                    ReviewStatus::Error,
                    format!(
                        "review credential is not configured; {} forced line(s) left unresolved",
                        meta.unresolved_forced_item_indexes.len()
                    ),
                )
            } else {
                (
                    ReviewStatus::Warning,
                    "review credential is not configured; review skipped".to_string(),
                )
            };
            warn!(status = status.as_str(), "review credential missing");
            return respond(status, message, meta, Vec::new(), started);
        }

        let payload = build_payload(request);
        let (raw, transport) = match self.call(&payload, started).await {
            Ok(answer) => answer,
            Err(failures) => {
                let mut meta = compute_coverage(request, &[]);
                meta.model = Some(self.config.model.clone());
                return respond(
                    ReviewStatus::Error,
                    format!("review transport failed: {failures}"),
                    meta,
                    Vec::new(),
                    started,
                );
            }
        };

        let parsed = parse_decisions(&raw, request);
        let mut meta = compute_coverage(request, &parsed.decisions);
        meta.discarded_decisions = parsed.discarded;
        meta.transport = Some(transport);
        meta.model = Some(self.config.model.clone());

        let status = status_for(&meta);
        let message = match status {
            ReviewStatus::Error => format!(
                "{} forced line(s) unresolved",
                meta.unresolved_forced_item_indexes.len()
            ),
            ReviewStatus::Warning => format!(
                "{} required line(s) without a decision",
                meta.missing_item_indexes.len()
            ),
            ReviewStatus::Skipped => "service returned no usable decisions".to_string(),
            ReviewStatus::Applied => format!("{} decision(s) reconciled", meta.decision_count),
        };
        respond(status, message, meta, parsed.decisions, started)
    }

    /// Primary, then fallback on transport failure, within one deadline.
    /// Returns the raw text and the label of the transport that answered.
    async fn call(&self, payload: &ReviewPayload, started: Instant) -> Result<(String, String), String> {
        let deadline = started + self.config.timeout;
        let mut failures = Vec::new();

        for transport in self.primary.iter().chain(self.fallback.iter()) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                failures.push(format!("{}: {}", transport.label(), TransportError::Timeout));
                break;
            }

            let attempt = transport.complete(payload, &self.config.model, remaining);
            let outcome = tokio::time::timeout(remaining, attempt)
                .await
                .unwrap_or(Err(TransportError::Timeout));
            match outcome {
                Ok(raw) => return Ok((raw, transport.label().to_string())),
                Err(e) => {
                    warn!(transport = transport.label(), error = %e, "review transport failed");
                    failures.push(format!("{}: {e}", transport.label()));
                }
            }
        }
        Err(failures.join("; "))
    }
}

fn respond(
    status: ReviewStatus,
    message: String,
    meta: CoverageMeta,
    decisions: Vec<sceneline_core::ReviewDecision>,
    started: Instant,
) -> AgentReviewResponse {
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    info!(
        status = status.as_str(),
        decisions = decisions.len(),
        missing = meta.missing_item_indexes.len(),
        unresolved_forced = meta.unresolved_forced_item_indexes.len(),
        latency_ms,
        "review complete"
    );
    AgentReviewResponse {
        status,
        decisions,
        message,
        latency_ms,
        meta,
    }
}

/// Apply reviewer verdicts to the blocks they were requested for.
///
/// Only `applied` and `warning` responses are applied. Text is never
/// touched, and a block whose type no longer matches the request is left
/// alone.
pub fn apply_decisions(
    blocks: &[ScreenplayBlock],
    request: &AgentReviewRequest,
    response: &AgentReviewResponse,
) -> Vec<ScreenplayBlock> {
    let mut out = blocks.to_vec();
    if !response.status.allows_apply() {
        return out;
    }

    let mut changed = 0;
    for decision in &response.decisions {
        let Some(line) = request.line(decision.item_index) else {
            continue;
        };
        let Some(block) = usize::try_from(line.line_index)
            .ok()
            .and_then(|i| out.get_mut(i))
        else {
            continue;
        };
        if block.format_id == line.assigned_type && block.format_id != decision.final_type {
            block.format_id = decision.final_type;
            changed += 1;
        }
    }
    debug!(changed, "applied review decisions");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use sceneline_core::FormatId;

    enum Step {
        Reply(&'static str),
        Fail,
        Hang,
    }

    struct Scripted {
        label: &'static str,
        step: Step,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(label: &'static str, step: Step) -> Arc<Self> {
            Arc::new(Self {
                label,
                step,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReviewTransport for Scripted {
        fn label(&self) -> &str {
            self.label
        }

        async fn complete(
            &self,
            _payload: &ReviewPayload,
            _model: &str,
            _timeout: Duration,
        ) -> Result<String, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.step {
                Step::Reply(text) => Ok(text.to_string()),
                Step::Fail => Err(TransportError::Server {
                    status: 503,
                    body: "unavailable".into(),
                }),
                Step::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Err(TransportError::EmptyResponse)
                }
            }
        }
    }

    fn body(band: &str) -> Value {
        json!({
            "sessionId": "session-c",
            "totalReviewed": 5,
            "suspiciousLines": [{
                "itemIndex": 1,
                "lineIndex": 2,
                "text": "تدخل نور إلى الغرفة",
                "assignedType": "dialogue",
                "totalSuspicion": 45.0,
                "routingBand": band,
            }],
        })
    }

    fn keyed() -> ReviewerConfig {
        ReviewerConfig::new(Some("test-key".into())).with_timeout(Duration::from_secs(5))
    }

    fn coordinator(primary: &Arc<Scripted>, fallback: &Arc<Scripted>) -> ReviewCoordinator {
        let primary: Arc<dyn ReviewTransport> = primary.clone();
        let fallback: Arc<dyn ReviewTransport> = fallback.clone();
        ReviewCoordinator::new(keyed(), Some(primary), Some(fallback))
    }

    const ACTION_FOR_1: &str =
        r#"{"decisions":[{"itemIndex":1,"finalType":"action","confidence":0.92,"reason":"narration"}]}"#;

    #[tokio::test]
    async fn forced_line_without_credential_is_error() {
        let coordinator = ReviewCoordinator::new(ReviewerConfig::new(None), None, None);
        let resp = coordinator.review_value(&body("agent-forced")).await.unwrap();
        assert_eq!(resp.status, ReviewStatus::Error);
        assert_eq!(resp.meta.unresolved_forced_item_indexes, vec![1]);
        assert!(resp.decisions.is_empty());
    }

    #[tokio::test]
    async fn candidate_line_without_credential_is_warning() {
        let coordinator = ReviewCoordinator::new(ReviewerConfig::new(None), None, None);
        let resp = coordinator.review_value(&body("agent-candidate")).await.unwrap();
        assert_eq!(resp.status, ReviewStatus::Warning);
        assert_eq!(resp.meta.missing_item_indexes, vec![1]);
        assert!(resp.meta.unresolved_forced_item_indexes.is_empty());
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_transport() {
        let primary = Scripted::new("primary", Step::Reply(ACTION_FOR_1));
        let fallback = Scripted::new("fallback", Step::Reply(ACTION_FOR_1));
        let coordinator = coordinator(&primary, &fallback);

        let mut bad = body("agent-forced");
        bad["forcedItemIndexes"] = json!([4]);
        let err = coordinator.review_value(&bad).await.unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(primary.calls() + fallback.calls(), 0);
    }

    #[tokio::test]
    async fn empty_request_is_skipped_without_call() {
        let primary = Scripted::new("primary", Step::Reply(ACTION_FOR_1));
        let fallback = Scripted::new("fallback", Step::Fail);
        let coordinator = coordinator(&primary, &fallback);
        let resp = coordinator
            .review_value(&json!({"sessionId": "s", "totalReviewed": 3, "suspiciousLines": []}))
            .await
            .unwrap();
        assert_eq!(resp.status, ReviewStatus::Skipped);
        assert_eq!(primary.calls(), 0);
    }

    #[tokio::test]
    async fn primary_answer_is_applied() {
        let primary = Scripted::new("primary", Step::Reply(ACTION_FOR_1));
        let fallback = Scripted::new("fallback", Step::Fail);
        let coordinator = coordinator(&primary, &fallback);

        let resp = coordinator.review_value(&body("agent-forced")).await.unwrap();
        assert_eq!(resp.status, ReviewStatus::Applied);
        assert_eq!(resp.decisions.len(), 1);
        assert_eq!(resp.decisions[0].final_type, FormatId::Action);
        assert_eq!(resp.meta.transport.as_deref(), Some("primary"));
        assert_eq!(resp.meta.model.as_deref(), Some("claude-sonnet-4-5"));
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn fallback_used_after_primary_failure() {
        let primary = Scripted::new("primary", Step::Fail);
        let fallback = Scripted::new("fallback", Step::Reply(ACTION_FOR_1));
        let coordinator = coordinator(&primary, &fallback);

        let resp = coordinator.review_value(&body("agent-forced")).await.unwrap();
        assert_eq!(resp.status, ReviewStatus::Applied);
        assert_eq!(resp.meta.transport.as_deref(), Some("fallback"));
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn unparsable_answer_does_not_trigger_fallback() {
        let primary = Scripted::new("primary", Step::Reply("sorry, no JSON today"));
        let fallback = Scripted::new("fallback", Step::Reply(ACTION_FOR_1));
        let coordinator = coordinator(&primary, &fallback);

        let resp = coordinator.review_value(&body("agent-candidate")).await.unwrap();
        assert_eq!(resp.status, ReviewStatus::Warning);
        assert!(resp.decisions.is_empty());
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn both_transports_failing_is_error() {
        let primary = Scripted::new("primary", Step::Fail);
        let fallback = Scripted::new("fallback", Step::Fail);
        let coordinator = coordinator(&primary, &fallback);

        let resp = coordinator.review_value(&body("agent-candidate")).await.unwrap();
        assert_eq!(resp.status, ReviewStatus::Error);
        assert!(resp.message.contains("primary: server returned 503"));
        assert!(resp.message.contains("fallback: server returned 503"));
    }

    #[tokio::test]
    async fn timeout_budget_is_shared() {
        let primary = Scripted::new("primary", Step::Hang);
        let fallback = Scripted::new("fallback", Step::Reply(ACTION_FOR_1));
        let primary_dyn: Arc<dyn ReviewTransport> = primary.clone();
        let fallback_dyn: Arc<dyn ReviewTransport> = fallback.clone();
        let config = keyed().with_timeout(Duration::from_millis(150));
        let coordinator = ReviewCoordinator::new(config, Some(primary_dyn), Some(fallback_dyn));

        let resp = coordinator.review_value(&body("agent-forced")).await.unwrap();
        assert_eq!(resp.status, ReviewStatus::Error);
        assert!(resp.message.contains("timed out"));
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn confirming_forced_line_is_error() {
        let primary = Scripted::new(
            "primary",
            Step::Reply(r#"{"decisions":[{"itemIndex":1,"finalType":"dialogue","confidence":0.8}]}"#),
        );
        let fallback = Scripted::new("fallback", Step::Fail);
        let coordinator = coordinator(&primary, &fallback);

        let resp = coordinator.review_value(&body("agent-forced")).await.unwrap();
        assert_eq!(resp.status, ReviewStatus::Error);
        assert_eq!(resp.meta.unresolved_forced_item_indexes, vec![1]);
        assert!(resp.meta.missing_item_indexes.is_empty());
    }

    #[tokio::test]
    async fn decisions_apply_only_when_allowed() {
        let primary = Scripted::new("primary", Step::Reply(ACTION_FOR_1));
        let fallback = Scripted::new("fallback", Step::Fail);
        let coordinator = coordinator(&primary, &fallback);
        let request = validate_request(&body("agent-forced")).unwrap();

        let blocks = vec![
            ScreenplayBlock::new(FormatId::Action, "يجلس"),
            ScreenplayBlock::new(FormatId::Character, "نور:"),
            ScreenplayBlock::new(FormatId::Dialogue, "تدخل نور إلى الغرفة"),
        ];
        let resp = coordinator.review(&request).await;
        let updated = apply_decisions(&blocks, &request, &resp);
        assert_eq!(updated[2].format_id, FormatId::Action);
        assert_eq!(updated[2].text, blocks[2].text);
        assert_eq!(updated[..2], blocks[..2]);

        let mut rejected = resp.clone();
        rejected.status = ReviewStatus::Error;
        assert_eq!(apply_decisions(&blocks, &request, &rejected), blocks);
    }

    #[tokio::test]
    async fn response_wire_shape() {
        let coordinator = ReviewCoordinator::new(ReviewerConfig::new(None), None, None);
        let resp = coordinator.review_value(&body("agent-forced")).await.unwrap();
        let wire = serde_json::to_value(&resp).unwrap();
        assert_eq!(wire["status"], "error");
        assert_eq!(wire["meta"]["unresolvedForcedItemIndexes"], json!([1]));
        assert_eq!(wire["meta"]["requiredItemIndexes"], json!([1]));
        assert!(wire["latencyMs"].is_u64());
    }

    #[cfg(feature = "http")]
    #[tokio::test]
    async fn http_fallback_end_to_end() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let primary = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&primary)
            .await;

        let fallback = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": ACTION_FOR_1}]
            })))
            .expect(1)
            .mount(&fallback)
            .await;

        let config = keyed()
            .with_base_url(primary.uri())
            .with_fallback_url(fallback.uri());
        let coordinator = ReviewCoordinator::from_config(config).unwrap();
        let resp = coordinator.review_value(&body("agent-forced")).await.unwrap();
        assert_eq!(resp.status, ReviewStatus::Applied);
        assert_eq!(resp.meta.transport.as_deref(), Some("fallback"));
    }
}
