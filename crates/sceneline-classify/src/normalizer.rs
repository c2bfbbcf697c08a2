//! Line normalization: trailing-whitespace cleanup, blank-run collapsing,
//! and grouping of physically adjacent lines into logical units.
//!
//! The normalizer never fails. Input it cannot make sense of degrades to one
//! action line per physical line.

use std::ops::Range;

use serde::Serialize;

use crate::lexicon;

/// One physical input line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    pub index: usize,
    /// Trailing whitespace and control characters removed; leading indentation kept.
    pub raw_text: String,
    pub trimmed_text: String,
}

impl Line {
    pub fn is_blank(&self) -> bool {
        self.trimmed_text.is_empty()
    }

    pub fn is_indented(&self) -> bool {
        self.raw_text.starts_with(char::is_whitespace)
    }
}

/// Why the normalizer emitted a logical line the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineHint {
    /// No grouping information (line did not come from the normalizer).
    Plain,
    Separator,
    /// Basmala line, always standalone.
    Opener,
    SceneOpener,
    /// Emitted verbatim right after a scene opener.
    SceneFollower,
    Transition,
    Cue,
    Dialogue,
    Parenthetical,
    Action,
}

/// One logical line produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedLine {
    pub index: usize,
    pub text: String,
    /// Physical lines this logical line was built from.
    pub source: Range<usize>,
    /// First contributing physical line was indented.
    pub indented: bool,
    pub hint: LineHint,
}

impl NormalizedLine {
    /// Number of physical lines folded into this one beyond the first.
    pub fn joined_lines(&self) -> usize {
        self.source.len().saturating_sub(1)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedText {
    pub lines: Vec<NormalizedLine>,
    pub physical: Vec<Line>,
}

impl NormalizedText {
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn non_blank_physical(&self) -> impl Iterator<Item = &Line> {
        self.physical.iter().filter(|l| !l.is_blank())
    }
}

/// Split into physical lines, stripping trailing `\r`, whitespace, and
/// control characters.
pub fn split_lines(raw: &str) -> Vec<Line> {
    raw.split('\n')
        .enumerate()
        .map(|(index, line)| {
            let raw_text = line
                .trim_end_matches(|c: char| c.is_whitespace() || c.is_control())
                .replace(|c: char| c.is_control() && c != '\t', "");
            let trimmed_text = raw_text.trim().to_string();
            Line {
                index,
                raw_text,
                trimmed_text,
            }
        })
        .collect()
}

/// Normalize raw screenplay text into logical lines plus merge hints.
pub fn normalize(raw: &str) -> NormalizedText {
    let physical = split_lines(raw);
    let mut state = State::default();
    for line in &physical {
        state.push(line);
    }
    state.flush_all();
    NormalizedText {
        lines: state.out,
        physical,
    }
}

// ── State machine ──

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Follow {
    #[default]
    None,
    AfterOpener,
    AfterHeaderLine,
}

#[derive(Debug)]
struct Buffer {
    parts: Vec<String>,
    start: usize,
    end: usize,
    indented: bool,
}

impl Buffer {
    fn open(line: &Line) -> Self {
        Self {
            parts: vec![line.trimmed_text.clone()],
            start: line.index,
            end: line.index + 1,
            indented: line.is_indented(),
        }
    }

    fn push(&mut self, line: &Line) {
        self.parts.push(line.trimmed_text.clone());
        self.end = line.index + 1;
    }
}

#[derive(Debug, Default)]
struct State {
    out: Vec<NormalizedLine>,
    action: Option<Buffer>,
    /// `Some` while a speech run is open; the inner buffer is `None` until
    /// the first dialogue text arrives.
    dialogue: Option<Option<Buffer>>,
    follow: Follow,
}

impl State {
    fn push(&mut self, line: &Line) {
        let text = line.trimmed_text.as_str();

        if line.is_blank() {
            self.flush_all();
            self.follow = Follow::None;
            return;
        }

        if lexicon::is_separator(text) {
            self.flush_all();
            self.follow = Follow::None;
            self.emit_verbatim(line, LineHint::Separator);
            return;
        }

        if lexicon::starts_scene(text) {
            self.flush_all();
            self.emit_verbatim(line, LineHint::SceneOpener);
            self.follow = Follow::AfterOpener;
            return;
        }

        // A name cue ends the heading run; time and place lines stay followers.
        if self.follow != Follow::None
            && lexicon::split_cue(text).is_some()
            && !lexicon::has_time_of_day(text)
            && !lexicon::has_place_marker(text)
        {
            self.follow = Follow::None;
        }

        match self.follow {
            Follow::AfterOpener => {
                self.emit_verbatim(line, LineHint::SceneFollower);
                self.follow = if lexicon::has_time_of_day(text) || lexicon::has_place_marker(text)
                {
                    Follow::AfterHeaderLine
                } else {
                    Follow::None
                };
                return;
            }
            Follow::AfterHeaderLine => {
                self.emit_verbatim(line, LineHint::SceneFollower);
                self.follow = Follow::None;
                return;
            }
            Follow::None => {}
        }

        if lexicon::is_transition(text) {
            self.flush_all();
            self.emit_verbatim(line, LineHint::Transition);
            return;
        }

        if lexicon::is_basmala(text) {
            self.flush_all();
            self.emit_verbatim(line, LineHint::Opener);
            return;
        }

        if let Some((cue, rest)) = lexicon::split_cue(text) {
            self.flush_all();
            self.emit(cue.to_string(), line.index..line.index + 1, line.is_indented(), LineHint::Cue);
            let seed = (!rest.is_empty()).then(|| Buffer {
                parts: vec![rest.to_string()],
                start: line.index,
                end: line.index + 1,
                indented: false,
            });
            self.dialogue = Some(seed);
            return;
        }

        if self.dialogue.is_some() {
            self.push_speech(line);
            return;
        }

        match &mut self.action {
            Some(buf) => buf.push(line),
            None => self.action = Some(Buffer::open(line)),
        }
    }

    /// A line arriving while a speech run is open.
    fn push_speech(&mut self, line: &Line) {
        let text = line.trimmed_text.as_str();

        if lexicon::is_fully_bracketed(text) && !lexicon::has_colon(text) {
            self.flush_dialogue_buffer();
            self.emit_verbatim(line, LineHint::Parenthetical);
            return;
        }

        let dash = lexicon::starts_with_dash(text);
        match self.dialogue.as_mut() {
            // A cue with nothing after its colon takes the next line as speech.
            Some(run) if run.is_none() && !dash => *run = Some(Buffer::open(line)),
            Some(Some(buf)) if line.is_indented() && !dash => buf.push(line),
            _ => {
                self.flush_dialogue();
                self.action = Some(Buffer::open(line));
            }
        }
    }

    fn emit_verbatim(&mut self, line: &Line, hint: LineHint) {
        self.emit(
            line.trimmed_text.clone(),
            line.index..line.index + 1,
            line.is_indented(),
            hint,
        );
    }

    fn emit(&mut self, text: String, source: Range<usize>, indented: bool, hint: LineHint) {
        let index = self.out.len();
        self.out.push(NormalizedLine {
            index,
            text,
            source,
            indented,
            hint,
        });
    }

    fn emit_buffer(&mut self, buf: Buffer, hint: LineHint) {
        self.emit(buf.parts.join(" "), buf.start..buf.end, buf.indented, hint);
    }

    fn flush_action(&mut self) {
        if let Some(buf) = self.action.take() {
            self.emit_buffer(buf, LineHint::Action);
        }
    }

    /// Emit pending dialogue text but keep the speech run open.
    fn flush_dialogue_buffer(&mut self) {
        if let Some(Some(buf)) = self.dialogue.as_mut().map(Option::take) {
            self.emit_buffer(buf, LineHint::Dialogue);
        }
    }

    /// Emit pending dialogue text and close the speech run.
    fn flush_dialogue(&mut self) {
        if let Some(Some(buf)) = self.dialogue.take() {
            self.emit_buffer(buf, LineHint::Dialogue);
        }
    }

    fn flush_all(&mut self) {
        self.flush_action();
        self.flush_dialogue();
    }
}
