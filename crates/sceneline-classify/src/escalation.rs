//! Suspicion scoring: decides which classified blocks need a second opinion.
//!
//! Every detector looks at one block and its immediate neighbours and either
//! stays silent or contributes weighted evidence. Scores are aggregated per
//! block and mapped onto a routing band. No I/O.

use serde::{Deserialize, Serialize};
use tracing::info;

use sceneline_core::review::{MAX_CONTEXT_TEXT_CHARS, MAX_REASONS, MAX_SUSPICIOUS_TEXT_CHARS};
use sceneline_core::{
    AgentReviewRequest, FormatId, ReviewContextLine, RoutingBand, ScreenplayBlock, SuspiciousLine,
};

use crate::lexicon;

const MAX_SCORE: f64 = 100.0;
/// Bonus per additional independent detector.
const CORROBORATION_BONUS: f64 = 10.0;

const CUE_NAME_MAX_WORDS: usize = 3;
const CUE_NAME_MAX_CHARS: usize = 30;
const LOCATION_MAX_WORDS: usize = 6;
const PARENTHETICAL_MAX_WORDS: usize = 12;
const CUE_SHAPED_MAX_WORDS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationThresholds {
    /// Escalation score from which a line becomes a review candidate.
    pub candidate: f64,
    /// Escalation score from which review is mandatory.
    pub forced: f64,
    /// Distinct detectors from which review is mandatory.
    pub forced_detectors: u32,
}

impl Default for EscalationThresholds {
    fn default() -> Self {
        Self {
            candidate: 40.0,
            forced: 80.0,
            forced_detectors: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Detector {
    DialogueNarrativeVerb,
    CharacterNameLength,
    CharacterWithoutDialogue,
    SceneHeaderMissingTime,
    SceneLocationTooLong,
    ActionCueShaped,
    ActionQuotedSpeech,
    TransitionMisplaced,
    ParentheticalTooLong,
}

impl Detector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DialogueNarrativeVerb => "dialogue-narrative-verb",
            Self::CharacterNameLength => "character-name-length",
            Self::CharacterWithoutDialogue => "character-without-dialogue",
            Self::SceneHeaderMissingTime => "scene-header-missing-time",
            Self::SceneLocationTooLong => "scene-location-too-long",
            Self::ActionCueShaped => "action-cue-shaped",
            Self::ActionQuotedSpeech => "action-quoted-speech",
            Self::TransitionMisplaced => "transition-misplaced",
            Self::ParentheticalTooLong => "parenthetical-too-long",
        }
    }
}

/// One piece of suspicion evidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub detector: Detector,
    pub weight: f64,
    pub reason: String,
    /// Hard contradiction between type and content.
    pub critical: bool,
}

impl Evidence {
    fn new(detector: Detector, weight: f64, reason: impl Into<String>) -> Self {
        Self {
            detector,
            weight,
            reason: reason.into(),
            critical: false,
        }
    }

    fn critical(mut self) -> Self {
        self.critical = true;
        self
    }
}

/// Aggregated suspicion for one block.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineAssessment {
    pub line_index: usize,
    pub format_id: FormatId,
    pub evidence: Vec<Evidence>,
    pub total_suspicion: f64,
    pub escalation_score: f64,
    pub distinct_detectors: u32,
    pub critical_mismatch: bool,
    pub routing_band: Option<RoutingBand>,
}

impl LineAssessment {
    pub fn is_escalated(&self) -> bool {
        self.routing_band.is_some()
    }

    pub fn reasons(&self) -> impl Iterator<Item = &str> {
        self.evidence.iter().map(|e| e.reason.as_str())
    }
}

/// Score every block. The output has one entry per block, in block order.
pub fn score_blocks(
    blocks: &[ScreenplayBlock],
    thresholds: &EscalationThresholds,
) -> Vec<LineAssessment> {
    let assessments: Vec<LineAssessment> = (0..blocks.len())
        .map(|i| assess(blocks, i, thresholds))
        .collect();

    let forced = assessments
        .iter()
        .filter(|a| a.routing_band == Some(RoutingBand::AgentForced))
        .count();
    let candidates = assessments
        .iter()
        .filter(|a| a.routing_band == Some(RoutingBand::AgentCandidate))
        .count();
    info!(
        blocks = blocks.len(),
        forced, candidates, "escalation scoring complete"
    );
    assessments
}

/// Only the assessments that cross a routing threshold.
pub fn escalated(assessments: &[LineAssessment]) -> impl Iterator<Item = &LineAssessment> {
    assessments.iter().filter(|a| a.is_escalated())
}

fn assess(blocks: &[ScreenplayBlock], i: usize, thresholds: &EscalationThresholds) -> LineAssessment {
    let evidence = detect(blocks, i);

    let sum: f64 = evidence.iter().map(|e| e.weight).sum();
    let total_suspicion = sum.clamp(0.0, MAX_SCORE);

    let mut detectors: Vec<Detector> = evidence.iter().map(|e| e.detector).collect();
    detectors.dedup();
    let distinct_detectors = detectors.len() as u32;

    let bonus = CORROBORATION_BONUS * distinct_detectors.saturating_sub(1) as f64;
    let escalation_score = (total_suspicion + bonus).clamp(0.0, MAX_SCORE);
    let critical_mismatch = evidence.iter().any(|e| e.critical);

    let routing_band = if critical_mismatch
        || distinct_detectors >= thresholds.forced_detectors
        || escalation_score >= thresholds.forced
    {
        Some(RoutingBand::AgentForced)
    } else if escalation_score >= thresholds.candidate {
        Some(RoutingBand::AgentCandidate)
    } else {
        None
    };

    LineAssessment {
        line_index: i,
        format_id: blocks[i].format_id,
        evidence,
        total_suspicion,
        escalation_score,
        distinct_detectors,
        critical_mismatch,
        routing_band,
    }
}

// ── Detectors ──

fn detect(blocks: &[ScreenplayBlock], i: usize) -> Vec<Evidence> {
    let block = &blocks[i];
    let text = block.text.as_str();
    let next = blocks.get(i + 1).map(|b| b.format_id);
    let mut evidence = Vec::new();

    match block.format_id {
        FormatId::Dialogue => {
            if lexicon::starts_with_narrative_verb(text) {
                let e = Evidence::new(
                    Detector::DialogueNarrativeVerb,
                    45.0,
                    "dialogue opens with a narrative verb",
                );
                evidence.push(if lexicon::has_dialogue_punctuation(text) {
                    e
                } else {
                    e.critical()
                });
            } else if lexicon::contains_narrative_verb(text) {
                evidence.push(Evidence::new(
                    Detector::DialogueNarrativeVerb,
                    20.0,
                    "dialogue contains a narrative verb",
                ));
            }
        }
        FormatId::Character => {
            let name = lexicon::cue_name(text);
            if lexicon::word_count(name) > CUE_NAME_MAX_WORDS
                || name.chars().count() > CUE_NAME_MAX_CHARS
            {
                evidence.push(Evidence::new(
                    Detector::CharacterNameLength,
                    40.0,
                    "character cue is too long for a name",
                ));
            }
            if !matches!(next, Some(FormatId::Dialogue | FormatId::Parenthetical)) {
                evidence.push(Evidence::new(
                    Detector::CharacterWithoutDialogue,
                    45.0,
                    "character cue is not followed by dialogue",
                ));
            }
        }
        FormatId::SceneHeader1 => {
            if next != Some(FormatId::SceneHeader2) {
                evidence.push(Evidence::new(
                    Detector::SceneHeaderMissingTime,
                    30.0,
                    "scene number without a time-of-day line",
                ));
            }
        }
        FormatId::SceneHeaderTopLine => {
            if !lexicon::has_time_of_day(text) {
                evidence.push(Evidence::new(
                    Detector::SceneHeaderMissingTime,
                    30.0,
                    "scene heading has no time-of-day token",
                ));
            }
        }
        FormatId::SceneHeader3 => {
            if lexicon::word_count(text) > LOCATION_MAX_WORDS {
                evidence.push(Evidence::new(
                    Detector::SceneLocationTooLong,
                    30.0,
                    "scene location is unusually long",
                ));
            }
        }
        FormatId::Action => {
            let ends_with_colon = text.trim_end().ends_with([':', '：']);
            let short = lexicon::word_count(text) <= CUE_SHAPED_MAX_WORDS;
            let speech_follows = blocks.get(i + 1).is_some_and(|b| {
                b.format_id == FormatId::Action && lexicon::has_dialogue_punctuation(&b.text)
            });
            if ends_with_colon || (short && speech_follows) {
                evidence.push(Evidence::new(
                    Detector::ActionCueShaped,
                    40.0,
                    "action line is shaped like a character cue",
                ));
            }
            if lexicon::has_quoted_speech(text) {
                evidence.push(Evidence::new(
                    Detector::ActionQuotedSpeech,
                    25.0,
                    "action contains quoted speech",
                ));
            }
        }
        FormatId::Transition => {
            if next.is_some_and(|f| !f.is_scene_header()) {
                evidence.push(Evidence::new(
                    Detector::TransitionMisplaced,
                    20.0,
                    "transition is not followed by a scene heading",
                ));
            }
        }
        FormatId::Parenthetical => {
            if lexicon::word_count(text) > PARENTHETICAL_MAX_WORDS {
                evidence.push(Evidence::new(
                    Detector::ParentheticalTooLong,
                    25.0,
                    "parenthetical is too long",
                ));
            }
        }
        FormatId::Basmala | FormatId::SceneHeader2 => {}
    }

    evidence
}

// ── Review request ──

/// Package escalated assessments into a review request.
///
/// Items are numbered from 0 in block order; `lineIndex` is the block index.
/// Every item is required; forced-band items are also forced.
pub fn build_review_request(
    session_id: &str,
    blocks: &[ScreenplayBlock],
    assessments: &[LineAssessment],
    context_radius: usize,
) -> AgentReviewRequest {
    let mut suspicious_lines = Vec::new();
    for (item_index, assessment) in escalated(assessments).enumerate() {
        let Some(block) = blocks.get(assessment.line_index) else {
            continue;
        };
        let start = assessment.line_index.saturating_sub(context_radius);
        let end = (assessment.line_index + context_radius + 1).min(blocks.len());
        let context_lines = (start..end)
            .filter(|&j| j != assessment.line_index)
            .map(|j| ReviewContextLine {
                line_index: j as u64,
                assigned_type: blocks[j].format_id,
                text: truncate_chars(&blocks[j].text, MAX_CONTEXT_TEXT_CHARS),
            })
            .collect();

        suspicious_lines.push(SuspiciousLine {
            item_index: item_index as u64,
            line_index: assessment.line_index as u64,
            text: truncate_chars(&block.text, MAX_SUSPICIOUS_TEXT_CHARS),
            assigned_type: block.format_id,
            total_suspicion: assessment.total_suspicion,
            escalation_score: Some(assessment.escalation_score),
            routing_band: assessment.routing_band,
            critical_mismatch: Some(assessment.critical_mismatch),
            distinct_detectors: Some(assessment.distinct_detectors),
            reasons: assessment
                .reasons()
                .take(MAX_REASONS)
                .map(str::to_string)
                .collect(),
            context_lines,
        });
    }

    let required_item_indexes = suspicious_lines.iter().map(|l| l.item_index).collect();
    let forced_item_indexes = suspicious_lines
        .iter()
        .filter(|l| l.is_forced())
        .map(|l| l.item_index)
        .collect();

    AgentReviewRequest {
        session_id: session_id.to_string(),
        total_reviewed: blocks.len() as u64,
        suspicious_lines,
        required_item_indexes,
        forced_item_indexes,
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}
