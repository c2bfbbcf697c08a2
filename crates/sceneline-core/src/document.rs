//! Versioned screenplay document and its lossless encodings.
//!
//! Three encodings are supported:
//!
//! - plain text: block texts joined by `\n`. Lossless for text, drops types;
//!   this is what gets fed back to the normalizer for re-classification.
//! - markup: one `<div data-format="…">…</div>` element per block.
//! - JSON: `{"version": 1, "blocks": [...]}`.

use serde::{Deserialize, Serialize};

use crate::{DocumentError, FormatId};

/// Current on-disk/wire version of [`ScreenplayDocument`].
pub const DOCUMENT_VERSION: u32 = 1;

/// One structurally typed unit of screenplay text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenplayBlock {
    pub format_id: FormatId,
    pub text: String,
}

impl ScreenplayBlock {
    pub fn new(format_id: FormatId, text: impl Into<String>) -> Self {
        Self {
            format_id,
            text: text.into(),
        }
    }
}

/// Ordered block sequence. Order is narrative order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenplayDocument {
    pub version: u32,
    pub blocks: Vec<ScreenplayBlock>,
}

impl Default for ScreenplayDocument {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ScreenplayDocument {
    pub fn new(blocks: Vec<ScreenplayBlock>) -> Self {
        Self {
            version: DOCUMENT_VERSION,
            blocks,
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks whose type is anything other than `action`.
    pub fn non_action_count(&self) -> usize {
        non_action_count(&self.blocks)
    }

    pub fn format_sequence(&self) -> Vec<FormatId> {
        self.blocks.iter().map(|b| b.format_id).collect()
    }

    pub fn to_plain_text(&self) -> String {
        to_plain_text(&self.blocks)
    }

    pub fn to_source_text(&self) -> String {
        to_source_text(&self.blocks)
    }

    pub fn to_markup(&self) -> String {
        self.blocks
            .iter()
            .map(|b| {
                format!(
                    "<div data-format=\"{}\">{}</div>",
                    b.format_id,
                    escape_markup(&b.text)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parse markup produced by [`to_markup`](Self::to_markup).
    ///
    /// Blank lines between elements are tolerated; anything else that is not
    /// a well-formed block element is an error.
    pub fn from_markup(markup: &str) -> Result<Self, DocumentError> {
        let mut blocks = Vec::new();
        for (i, line) in markup.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            blocks.push(parse_markup_element(line, i + 1)?);
        }
        Ok(Self::new(blocks))
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let doc: Self = serde_json::from_str(json)?;
        if doc.version != DOCUMENT_VERSION {
            return Err(DocumentError::UnsupportedVersion {
                found: doc.version,
                expected: DOCUMENT_VERSION,
            });
        }
        Ok(doc)
    }
}

pub fn non_action_count(blocks: &[ScreenplayBlock]) -> usize {
    blocks
        .iter()
        .filter(|b| b.format_id != FormatId::Action)
        .count()
}

pub fn to_plain_text(blocks: &[ScreenplayBlock]) -> String {
    blocks
        .iter()
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Plain text laid out for re-classification: blocks are separated by a
/// blank line, except speech lines that must stay attached to their cue.
/// Dialogue right after a `name:` cue goes back on the cue line, so a colon
/// inside the dialogue cannot open a second cue.
pub fn to_source_text(blocks: &[ScreenplayBlock]) -> String {
    let mut out = String::new();
    let mut prev: Option<&ScreenplayBlock> = None;
    for block in blocks {
        if let Some(p) = prev {
            out.push_str(match block.format_id {
                FormatId::Dialogue if ends_with_cue_colon(p) => " ",
                FormatId::Dialogue | FormatId::Parenthetical => "\n",
                _ => "\n\n",
            });
        }
        out.push_str(&block.text);
        prev = Some(block);
    }
    out
}

fn ends_with_cue_colon(block: &ScreenplayBlock) -> bool {
    block.format_id == FormatId::Character && block.text.trim_end().ends_with([':', '：'])
}

// ── Markup helpers ──

const OPEN_PREFIX: &str = "<div data-format=\"";
const CLOSE_TAG: &str = "</div>";

fn parse_markup_element(line: &str, line_no: usize) -> Result<ScreenplayBlock, DocumentError> {
    let malformed = |detail: &str| DocumentError::Markup {
        line: line_no,
        detail: detail.to_string(),
    };

    let rest = line
        .strip_prefix(OPEN_PREFIX)
        .ok_or_else(|| malformed("expected <div data-format=\"…\">"))?;
    let (format, rest) = rest
        .split_once("\">")
        .ok_or_else(|| malformed("unterminated data-format attribute"))?;
    let body = rest
        .strip_suffix(CLOSE_TAG)
        .ok_or_else(|| malformed("missing </div>"))?;

    let format_id: FormatId = format.parse()?;
    Ok(ScreenplayBlock::new(format_id, unescape_markup(body)))
}

fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("<br>"),
            _ => out.push(ch),
        }
    }
    out
}

fn unescape_markup(body: &str) -> String {
    // `<br>` cannot collide with escaped text: a literal '<' is always `&lt;`.
    body.replace("<br>", "\n")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ScreenplayDocument {
        ScreenplayDocument::new(vec![
            ScreenplayBlock::new(FormatId::Basmala, "بسم الله الرحمن الرحيم"),
            ScreenplayBlock::new(FormatId::SceneHeader1, "مشهد 1"),
            ScreenplayBlock::new(FormatId::SceneHeader2, "داخلي - ليل"),
            ScreenplayBlock::new(FormatId::Character, "نور :"),
            ScreenplayBlock::new(FormatId::Dialogue, "قال لي \"<لا>\" & رحل"),
            ScreenplayBlock::new(FormatId::Action, "سطر أول\nسطر ثان"),
        ])
    }

    #[test]
    fn markup_round_trip_is_lossless() {
        let doc = sample();
        let markup = doc.to_markup();
        assert_eq!(markup.lines().count(), doc.len());
        let parsed = ScreenplayDocument::from_markup(&markup).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn markup_escapes_literal_br() {
        let doc = ScreenplayDocument::new(vec![ScreenplayBlock::new(FormatId::Action, "a<br>b")]);
        let parsed = ScreenplayDocument::from_markup(&doc.to_markup()).unwrap();
        assert_eq!(parsed.blocks[0].text, "a<br>b");
    }

    #[test]
    fn markup_rejects_unknown_format() {
        let err = ScreenplayDocument::from_markup("<div data-format=\"shot\">x</div>").unwrap_err();
        assert!(matches!(err, DocumentError::UnknownFormat(_)));
    }

    #[test]
    fn markup_rejects_malformed_element() {
        let err = ScreenplayDocument::from_markup("<p>hello</p>").unwrap_err();
        assert!(matches!(err, DocumentError::Markup { line: 1, .. }));

        let err = ScreenplayDocument::from_markup("\n<div data-format=\"action\">open").unwrap_err();
        assert!(matches!(err, DocumentError::Markup { line: 2, .. }));
    }

    #[test]
    fn json_round_trip_and_version_check() {
        let doc = sample();
        let json = doc.to_json().unwrap();
        assert!(json.contains("\"formatId\":\"scene-header-1\""));
        assert_eq!(ScreenplayDocument::from_json(&json).unwrap(), doc);

        let future = r#"{"version":9,"blocks":[]}"#;
        let err = ScreenplayDocument::from_json(future).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::UnsupportedVersion { found: 9, expected: 1 }
        ));
    }

    #[test]
    fn plain_text_and_counts() {
        let doc = sample();
        assert_eq!(doc.non_action_count(), 5);
        assert!(doc.to_plain_text().starts_with("بسم الله الرحمن الرحيم\nمشهد 1\n"));
        assert_eq!(doc.format_sequence()[3], FormatId::Character);
    }

    #[test]
    fn source_text_keeps_speech_attached() {
        let doc = ScreenplayDocument::new(vec![
            ScreenplayBlock::new(FormatId::Action, "يدخل أحمد"),
            ScreenplayBlock::new(FormatId::Action, "يجلس"),
            ScreenplayBlock::new(FormatId::Character, "نور:"),
            ScreenplayBlock::new(FormatId::Parenthetical, "(بهدوء)"),
            ScreenplayBlock::new(FormatId::Dialogue, "مرحبا"),
        ]);
        assert_eq!(
            doc.to_source_text(),
            "يدخل أحمد\n\nيجلس\n\nنور:\n(بهدوء)\nمرحبا"
        );
    }

    #[test]
    fn source_text_puts_dialogue_on_cue_line() {
        let doc = ScreenplayDocument::new(vec![
            ScreenplayBlock::new(FormatId::Character, "نور:"),
            ScreenplayBlock::new(FormatId::Dialogue, "قال أبي: لا"),
            ScreenplayBlock::new(FormatId::Dialogue, "ثم خرج"),
            ScreenplayBlock::new(FormatId::Character, "سامي"),
            ScreenplayBlock::new(FormatId::Dialogue, "نعم"),
        ]);
        assert_eq!(
            doc.to_source_text(),
            "نور: قال أبي: لا\nثم خرج\n\nسامي\nنعم"
        );
    }
}
