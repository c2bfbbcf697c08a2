//! Review wire types shared by the escalation scorer and the review coordinator.
//!
//! Field names are camelCase on the wire. Unknown fields are ignored on
//! deserialisation; request shape rules beyond what serde enforces live in
//! the review crate's validator.

use serde::{Deserialize, Serialize};

use crate::LineType;

pub const MAX_SUSPICIOUS_TEXT_CHARS: usize = 6000;
pub const MAX_CONTEXT_TEXT_CHARS: usize = 4000;
pub const MAX_REASONS: usize = 16;
pub const MAX_SESSION_ID_CHARS: usize = 120;

/// Escalation tier of a suspicious line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingBand {
    AgentCandidate,
    AgentForced,
}

impl RoutingBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentCandidate => "agent-candidate",
            Self::AgentForced => "agent-forced",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "agent-candidate" => Some(Self::AgentCandidate),
            "agent-forced" => Some(Self::AgentForced),
            _ => None,
        }
    }
}

/// A neighbouring, already-classified line given to the reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewContextLine {
    pub line_index: u64,
    pub assigned_type: LineType,
    pub text: String,
}

/// A classified line flagged for a second opinion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspiciousLine {
    pub item_index: u64,
    pub line_index: u64,
    pub text: String,
    pub assigned_type: LineType,
    pub total_suspicion: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_band: Option<RoutingBand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_mismatch: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct_detectors: Option<u32>,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub context_lines: Vec<ReviewContextLine>,
}

impl SuspiciousLine {
    pub fn is_forced(&self) -> bool {
        self.routing_band == Some(RoutingBand::AgentForced)
    }
}

/// One bounded unit of review work.
///
/// Invariant: `forced_item_indexes ⊆ required_item_indexes ⊆ {item_index}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentReviewRequest {
    pub session_id: String,
    pub total_reviewed: u64,
    pub suspicious_lines: Vec<SuspiciousLine>,
    #[serde(default)]
    pub required_item_indexes: Vec<u64>,
    #[serde(default)]
    pub forced_item_indexes: Vec<u64>,
}

impl AgentReviewRequest {
    pub fn line(&self, item_index: u64) -> Option<&SuspiciousLine> {
        self.suspicious_lines
            .iter()
            .find(|l| l.item_index == item_index)
    }

    pub fn has_forced(&self) -> bool {
        !self.forced_item_indexes.is_empty()
    }
}

/// A reviewer verdict for one suspicious item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDecision {
    pub item_index: u64,
    pub final_type: LineType,
    pub confidence: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Applied,
    Warning,
    Error,
    Skipped,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }

    /// Whether decisions from a response with this status may be applied.
    pub fn allows_apply(&self) -> bool {
        matches!(self, Self::Applied | Self::Warning)
    }
}

/// Coverage bookkeeping: which escalated lines received a reconciled decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageMeta {
    pub requested_count: usize,
    pub decision_count: usize,
    pub required_item_indexes: Vec<u64>,
    pub forced_item_indexes: Vec<u64>,
    pub missing_item_indexes: Vec<u64>,
    pub unresolved_forced_item_indexes: Vec<u64>,
    #[serde(default)]
    pub discarded_decisions: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentReviewResponse {
    pub status: ReviewStatus,
    pub decisions: Vec<ReviewDecision>,
    pub message: String,
    pub latency_ms: u64,
    pub meta: CoverageMeta,
}
