//! Rule-cascade line classifier.
//!
//! Assigns each normalized line exactly one [`FormatId`]. Rules are tried in
//! a fixed order and the first match wins:
//!
//! 1. basmala opener
//! 2. scene-header-1 (scene keyword + number), or scene-header-top-line when
//!    the same line also carries time-of-day / interior-exterior tokens
//! 3. scene-header-2 (time-of-day + interior/exterior)
//! 4. scene-header-3 (location line right after a header-2)
//! 5. transition keyword
//! 6. character cue (line-initial name + colon, nothing after it)
//! 7. dialogue (continues a speech run)
//! 8. parenthetical (bracketed, colon-free, inside a speech run)
//! 9. action (default)
//!
//! Names inside action or dialogue text never turn a line into a cue; only
//! the line-initial `name:` shape does, and only on lines the normalizer did
//! not already mark as speech.

use serde::Serialize;

use sceneline_core::{ClassifierRole, FormatId};

use crate::lexicon;
use crate::normalizer::{LineHint, NormalizedLine};

/// Longest line (in words) still accepted as a scene heading line.
const HEADER_MAX_WORDS: usize = 8;

/// Which cascade rule produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rule {
    Basmala,
    SceneNumber,
    SceneNumberWithSlug,
    TimeAndPlace,
    LocationAfterHeader,
    TransitionKeyword,
    NameColon,
    SpeechContinuation,
    BracketedDirection,
    Default,
}

impl Rule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basmala => "basmala",
            Self::SceneNumber => "scene-number",
            Self::SceneNumberWithSlug => "scene-number-with-slug",
            Self::TimeAndPlace => "time-and-place",
            Self::LocationAfterHeader => "location-after-header",
            Self::TransitionKeyword => "transition-keyword",
            Self::NameColon => "name-colon",
            Self::SpeechContinuation => "speech-continuation",
            Self::BracketedDirection => "bracketed-direction",
            Self::Default => "default",
        }
    }
}

/// A normalized line with its assigned type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedLine {
    pub line_index: usize,
    pub format_id: FormatId,
    pub text: String,
    pub hint: LineHint,
    pub indented: bool,
    pub rule: Rule,
}

/// Deterministic line classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineClassifier {
    role: ClassifierRole,
}

impl LineClassifier {
    pub fn new(role: ClassifierRole) -> Self {
        Self { role }
    }

    pub fn role(&self) -> ClassifierRole {
        self.role
    }

    /// Classify one line given the type of the line before it.
    pub fn classify(&self, line: &NormalizedLine, prev: Option<FormatId>) -> ClassifiedLine {
        let (format_id, rule) = decide(&line.text, line.hint, prev);
        let text = match self.role {
            ClassifierRole::LabelOnly => line.text.clone(),
            ClassifierRole::LimitedRewrite => rewrite(format_id, &line.text),
        };
        ClassifiedLine {
            line_index: line.index,
            format_id,
            text,
            hint: line.hint,
            indented: line.indented,
            rule,
        }
    }

    /// Classify a whole normalized sequence in narrative order.
    pub fn classify_batch(&self, lines: &[NormalizedLine]) -> Vec<ClassifiedLine> {
        let mut out: Vec<ClassifiedLine> = Vec::with_capacity(lines.len());
        for line in lines {
            let prev = out.last().map(|c| c.format_id);
            out.push(self.classify(line, prev));
        }
        out
    }
}

pub fn classify_lines(lines: &[NormalizedLine], role: ClassifierRole) -> Vec<ClassifiedLine> {
    LineClassifier::new(role).classify_batch(lines)
}

/// Classify bare texts with no normalizer hints.
pub fn classify_texts(texts: &[&str]) -> Vec<ClassifiedLine> {
    let lines: Vec<NormalizedLine> = texts
        .iter()
        .enumerate()
        .map(|(index, text)| NormalizedLine {
            index,
            text: text.trim().to_string(),
            source: index..index + 1,
            indented: text.starts_with(char::is_whitespace),
            hint: LineHint::Plain,
        })
        .collect();
    LineClassifier::default().classify_batch(&lines)
}

fn decide(text: &str, hint: LineHint, prev: Option<FormatId>) -> (FormatId, Rule) {
    let speech_hint = matches!(
        hint,
        LineHint::Cue | LineHint::Dialogue | LineHint::Parenthetical
    );
    let in_speech_run = prev.is_some_and(|p| p.is_speech());
    let dash = lexicon::starts_with_dash(text);
    let bracketed = lexicon::is_fully_bracketed(text);

    if lexicon::is_basmala(text) {
        return (FormatId::Basmala, Rule::Basmala);
    }

    if !speech_hint {
        if let Some(rest) = lexicon::scene_number_rest(text) {
            if lexicon::has_time_of_day(rest) || lexicon::has_place_marker(rest) {
                return (FormatId::SceneHeaderTopLine, Rule::SceneNumberWithSlug);
            }
            return (FormatId::SceneHeader1, Rule::SceneNumber);
        }

        if lexicon::has_time_of_day(text)
            && lexicon::has_place_marker(text)
            && lexicon::word_count(text) <= HEADER_MAX_WORDS
        {
            return (FormatId::SceneHeader2, Rule::TimeAndPlace);
        }

        let after_slug = matches!(
            prev,
            Some(FormatId::SceneHeader2 | FormatId::SceneHeaderTopLine)
        );
        if after_slug
            && !matches!(
                hint,
                LineHint::Transition | LineHint::Separator | LineHint::Opener
            )
            && lexicon::word_count(text) <= HEADER_MAX_WORDS
            && !dash
            && !lexicon::is_transition(text)
            && lexicon::split_cue(text).is_none()
        {
            return (FormatId::SceneHeader3, Rule::LocationAfterHeader);
        }
    }

    if hint != LineHint::Cue && lexicon::is_transition(text) {
        return (FormatId::Transition, Rule::TransitionKeyword);
    }

    if matches!(hint, LineHint::Plain | LineHint::Cue)
        && lexicon::split_cue(text).is_some_and(|(_, rest)| rest.is_empty())
    {
        return (FormatId::Character, Rule::NameColon);
    }

    let continues_speech = matches!(
        hint,
        LineHint::Plain | LineHint::Dialogue | LineHint::Parenthetical
    );

    if in_speech_run && continues_speech && !dash && !bracketed {
        return (FormatId::Dialogue, Rule::SpeechContinuation);
    }

    if in_speech_run && continues_speech && bracketed && !lexicon::has_colon(text) {
        return (FormatId::Parenthetical, Rule::BracketedDirection);
    }

    (FormatId::Action, Rule::Default)
}

/// Canonical text for `limited-rewrite`: whitespace collapsed, cue colons
/// tightened, bracket padding removed.
fn rewrite(format_id: FormatId, text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match format_id {
        FormatId::Character => match collapsed.chars().next_back() {
            Some(colon) if lexicon::has_colon(&colon.to_string()) => {
                format!("{}{colon}", lexicon::cue_name(&collapsed))
            }
            _ => collapsed,
        },
        FormatId::Parenthetical => {
            let mut chars = collapsed.chars();
            match (chars.next(), chars.next_back()) {
                (Some(open), Some(close)) => format!("{open}{}{close}", chars.as_str().trim()),
                _ => collapsed,
            }
        }
        _ => collapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;

    fn formats_of(raw: &str) -> Vec<FormatId> {
        let normalized = normalize(raw);
        LineClassifier::default()
            .classify_batch(&normalized.lines)
            .into_iter()
            .map(|c| c.format_id)
            .collect()
    }

    #[test]
    fn scene_then_speech() {
        assert_eq!(
            formats_of("مشهد 1\nداخلي - ليل\nغرفة المعيشة\nنور :\nمرحبا"),
            vec![
                FormatId::SceneHeader1,
                FormatId::SceneHeader2,
                FormatId::SceneHeader3,
                FormatId::Character,
                FormatId::Dialogue,
            ]
        );
    }

    #[test]
    fn repeated_transitions_stay_separate() {
        assert_eq!(
            formats_of("قطع\nقطع"),
            vec![FormatId::Transition, FormatId::Transition]
        );
    }

    #[test]
    fn cue_named_like_a_transition_is_a_character() {
        assert_eq!(
            formats_of("قطع: نعم\nقطع إلى:"),
            vec![FormatId::Character, FormatId::Dialogue, FormatId::Transition]
        );
    }

    #[test]
    fn top_line_when_slug_shares_the_number_line() {
        assert_eq!(
            formats_of("مشهد 3 - خارجي - نهار\nالحديقة\nيلعب الأطفال"),
            vec![
                FormatId::SceneHeaderTopLine,
                FormatId::SceneHeader3,
                FormatId::Action,
            ]
        );
    }

    #[test]
    fn basmala_first() {
        assert_eq!(
            formats_of("بسم الله الرحمن الرحيم\n\nمشهد 1"),
            vec![FormatId::Basmala, FormatId::SceneHeader1]
        );
    }

    #[test]
    fn parenthetical_inside_run_and_dialogue_after_it() {
        assert_eq!(
            formats_of("نور :\n(بهدوء)\nلا تذهب"),
            vec![
                FormatId::Character,
                FormatId::Parenthetical,
                FormatId::Dialogue,
            ]
        );
    }

    #[test]
    fn action_after_dialogue_run() {
        assert_eq!(
            formats_of("أحمد: أين كنت؟\nيجلس أحمد على الأريكة"),
            vec![FormatId::Character, FormatId::Dialogue, FormatId::Action]
        );
    }

    #[test]
    fn names_inside_text_are_not_cues() {
        // "نور" appears mid-line; only a line-initial name-colon is a cue.
        assert_eq!(
            formats_of("تنظر نور إلى أحمد وتقول له شيئا"),
            vec![FormatId::Action]
        );
        // A colon inside seeded dialogue does not open a new cue.
        let lines = normalize("نور: قال:");
        let classified = LineClassifier::default().classify_batch(&lines.lines);
        assert_eq!(classified[1].format_id, FormatId::Dialogue);
    }

    #[test]
    fn song_lyrics_without_cue_are_action() {
        assert_eq!(
            formats_of("يا ليل يا عين\nيا ليل يا عين"),
            vec![FormatId::Action]
        );
    }

    #[test]
    fn song_lyrics_after_cue_are_dialogue() {
        assert_eq!(
            formats_of("المغني :\n  يا ليل يا عين\n  يا ليل يا عين"),
            vec![FormatId::Character, FormatId::Dialogue]
        );
    }

    #[test]
    fn separator_is_action_and_breaks_speech_run() {
        assert_eq!(
            formats_of("نور: مرحبا\n=====\nأهلا"),
            vec![
                FormatId::Character,
                FormatId::Dialogue,
                FormatId::Action,
                FormatId::Action,
            ]
        );
    }

    #[test]
    fn rule_is_recorded() {
        let normalized = normalize("مشهد 1\nقطع");
        let classified = LineClassifier::default().classify_batch(&normalized.lines);
        assert_eq!(classified[0].rule, Rule::SceneNumber);
        assert_eq!(classified[1].rule, Rule::TransitionKeyword);
        assert_eq!(classified[1].rule.as_str(), "transition-keyword");
    }

    #[test]
    fn label_only_keeps_text() {
        let normalized = normalize("نور :\n(  بهدوء  )");
        let classified = LineClassifier::new(ClassifierRole::LabelOnly).classify_batch(&normalized.lines);
        assert_eq!(classified[0].text, "نور :");
        assert_eq!(classified[1].text, "(  بهدوء  )");
    }

    #[test]
    fn limited_rewrite_canonicalises_text() {
        let normalized = normalize("نور :\n(  بهدوء  )\nلا   تذهب");
        let classified =
            LineClassifier::new(ClassifierRole::LimitedRewrite).classify_batch(&normalized.lines);
        assert_eq!(classified[0].text, "نور:");
        assert_eq!(classified[1].text, "(بهدوء)");
        assert_eq!(classified[2].text, "لا تذهب");
        assert_eq!(classified[2].format_id, FormatId::Dialogue);
    }

    #[test]
    fn classify_texts_without_hints() {
        let classified = classify_texts(&["مشهد 4", "ليلى :", "صباح الخير", "قطع"]);
        let formats: Vec<FormatId> = classified.iter().map(|c| c.format_id).collect();
        assert_eq!(
            formats,
            vec![
                FormatId::SceneHeader1,
                FormatId::Character,
                FormatId::Dialogue,
                FormatId::Transition,
            ]
        );
    }
}
