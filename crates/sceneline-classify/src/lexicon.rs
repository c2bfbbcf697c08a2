//! Keyword tables and token-level predicates for Arabic screenplay text.
//!
//! Everything here is a pure function over `&str`. Line shapes (scene
//! numbers, cues, separators, transitions) are anchored regexes compiled once;
//! keyword lookups work on whitespace/punctuation-separated tokens so that
//! keywords embedded inside longer words never fire.

use std::sync::LazyLock;

use regex::Regex;

/// Word that opens every scene heading.
pub const SCENE_KEYWORD: &str = "مشهد";

/// Opening invocation line.
pub const BASMALA: &str = "بسم الله الرحمن الرحيم";

pub const TIME_OF_DAY: &[&str] = &[
    "ليل", "ليلا", "ليلاً", "الليل", "ليلي", "نهار", "نهارا", "نهاراً", "النهار", "نهاري", "صباح",
    "صباحا", "صباحاً", "الصباح", "مساء", "مساءً", "مساءا", "المساء", "فجر", "الفجر", "ظهر",
    "ظهرا", "الظهر", "عصر", "العصر", "غروب", "الغروب", "شروق", "الشروق",
];

pub const INTERIOR_EXTERIOR: &[&str] = &["داخلي", "خارجي", "داخلى", "خارجى"];

/// Whole-line transitions, compared after whitespace collapsing.
pub const TRANSITIONS: &[&str] = &[
    "قطع",
    "قطع إلى",
    "قطع الى",
    "قطع مفاجئ",
    "مزج",
    "مزج إلى",
    "مزج الى",
    "اختفاء",
    "اختفاء تدريجي",
    "ظهور تدريجي",
    "انتقال",
];

/// Third-person narrative verbs that rarely open spoken lines.
pub const NARRATIVE_VERBS: &[&str] = &[
    "يدخل", "تدخل", "يخرج", "تخرج", "ينظر", "تنظر", "يجلس", "تجلس", "يقف", "تقف", "يلتفت",
    "تلتفت", "يمسك", "تمسك", "يركض", "تركض", "يبتسم", "تبتسم", "يضع", "تضع", "يفتح", "تفتح",
    "يغلق", "تغلق", "يتجه", "تتجه", "يسير", "تسير", "نرى", "نسمع",
];

pub const DASH_GLYPHS: &[char] = &['-', '–', '—', '−'];

const CUE_COLONS: &[char] = &[':', '：'];
const CUE_NAME_MAX_CHARS: usize = 50;
const CUE_NAME_MAX_WORDS: usize = 5;
const SENTENCE_PUNCTUATION: &[char] = &['.', '،', '؛', '!', '?', '؟', '"', '«', '»'];

const DIALOGUE_PUNCTUATION: &[char] = &['؟', '?', '!', '…'];

/// Characters that split tokens besides whitespace.
const TOKEN_SEPARATORS: &[char] = &['-', '–', '—', '−', '/', ',', '،', '.', ':', '؛', '|'];

// ── Patterns ──

/// Character class for ASCII, Arabic-Indic and extended Arabic-Indic digits.
const DIGIT_CLASS: &str = "[0-9٠-٩۰-۹]";

static SCENE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\s*{SCENE_KEYWORD}[\s:\-–—−]*{DIGIT_CLASS}+"))
        .expect("scene number pattern compiles")
});

static SCENE_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\s*{SCENE_KEYWORD}(?:$|[\s:\-–—−]|{DIGIT_CLASS})"))
        .expect("scene start pattern compiles")
});

static SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:={5,}|-{5,})\s*$").expect("separator pattern compiles")
});

/// Whole-line transition, inner spaces flexible, optional trailing `:`/`.`.
static TRANSITION: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives = TRANSITIONS
        .iter()
        .map(|t| {
            t.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"^\s*(?:{alternatives})\s*[:.：]*\s*$"))
        .expect("transition pattern compiles")
});

/// Basmala after optional ornament brackets, inner spaces flexible.
static BASMALA_LINE: LazyLock<Regex> = LazyLock::new(|| {
    let words = BASMALA
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");
    Regex::new(&format!(r"^[\s﴿﴾{{}}()\[\]«»*]*{words}")).expect("basmala pattern compiles")
});

/// Everything up to and including the first colon.
static CUE_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<name>[^:：]*)[:：]").expect("cue pattern compiles"));

/// First colon sits between two digits, as in `10:30`.
static CLOCK_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^[^:：]*{DIGIT_CLASS}[:：]{DIGIT_CLASS}"))
        .expect("clock pattern compiles")
});

/// One bracket pair around the whole line, in either storage order (text
/// typed right-to-left sometimes arrives with mirrored brackets).
static FULLY_BRACKETED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\(.*\)|\).*\(|\[.*\]|\].*\[|﴾.*﴿|﴿.*﴾)\s*$")
        .expect("bracket pattern compiles")
});

static QUOTED_SPEECH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"«.*»|".*""#).expect("quote pattern compiles"));

// ── Tokens ──

/// Split on whitespace and header punctuation, dropping empties.
pub fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c.is_whitespace() || TOKEN_SEPARATORS.contains(&c))
        .filter(|t| !t.is_empty())
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

// ── Scene headings ──

/// If `text` opens with the scene keyword followed by a number, return what
/// follows the number.
pub fn scene_number_rest(text: &str) -> Option<&str> {
    SCENE_NUMBER.find(text).map(|m| &text[m.end()..])
}

/// Lines that start a new scene for the normalizer: keyword first, number optional.
pub fn starts_scene(text: &str) -> bool {
    SCENE_START.is_match(text)
}

pub fn has_time_of_day(text: &str) -> bool {
    tokens(text).any(|t| TIME_OF_DAY.contains(&t))
}

pub fn has_place_marker(text: &str) -> bool {
    tokens(text).any(|t| INTERIOR_EXTERIOR.contains(&t))
}

// ── Whole-line shapes ──

pub fn is_transition(text: &str) -> bool {
    TRANSITION.is_match(text)
}

pub fn is_basmala(text: &str) -> bool {
    BASMALA_LINE.is_match(text)
}

/// Five or more repeats of a single `=` or `-`.
pub fn is_separator(text: &str) -> bool {
    SEPARATOR.is_match(text)
}

pub fn starts_with_dash(text: &str) -> bool {
    text.trim_start()
        .chars()
        .next()
        .is_some_and(|c| DASH_GLYPHS.contains(&c))
}

/// Whole line wrapped in one bracket pair, in either storage order (text
/// typed right-to-left sometimes arrives with mirrored brackets).
pub fn is_fully_bracketed(text: &str) -> bool {
    FULLY_BRACKETED.is_match(text)
}

pub fn has_colon(text: &str) -> bool {
    text.contains(CUE_COLONS)
}

/// Split a `name:rest` character cue. Returns the cue part (including the
/// colon, original spacing kept) and the trimmed remainder.
pub fn split_cue(text: &str) -> Option<(&str, &str)> {
    let trimmed = text.trim();
    let head = CUE_HEAD.captures(trimmed)?;
    let cue_end = head.get(0)?.end();
    let name = head.name("name")?.as_str().trim();

    if name.is_empty()
        || name.chars().count() > CUE_NAME_MAX_CHARS
        || word_count(name) > CUE_NAME_MAX_WORDS
        || name.contains(SENTENCE_PUNCTUATION)
        || starts_with_dash(name)
        || CLOCK_TIME.is_match(trimmed)
    {
        return None;
    }

    Some((&trimmed[..cue_end], trimmed[cue_end..].trim()))
}

/// Name part of a cue line, without the colon.
pub fn cue_name(text: &str) -> &str {
    text.trim().trim_end_matches(CUE_COLONS).trim()
}

// ── Escalation predicates ──

pub fn starts_with_narrative_verb(text: &str) -> bool {
    tokens(text)
        .next()
        .is_some_and(|t| NARRATIVE_VERBS.contains(&t))
}

pub fn contains_narrative_verb(text: &str) -> bool {
    tokens(text).any(|t| NARRATIVE_VERBS.contains(&t))
}

pub fn has_dialogue_punctuation(text: &str) -> bool {
    text.contains(DIALOGUE_PUNCTUATION)
}

pub fn has_quoted_speech(text: &str) -> bool {
    QUOTED_SPEECH.is_match(text)
}
