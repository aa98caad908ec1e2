//! Language hint for typed input.
//!
//! Speech input already carries the recognition language. Typed text is
//! classified by script instead: plain ASCII is English, and the first
//! Indic script block found decides the code. Anything else keeps the
//! language currently selected for recognition.

use std::sync::LazyLock;

use regex::Regex;

/// Letters, digits, whitespace and basic punctuation only.
static PLAIN_ASCII: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^[a-zA-Z0-9\s.,!?'"()\-]+$"#).unwrap());

/// Unicode blocks checked in order. Marathi shares Devanagari and is
/// reported as Hindi.
const SCRIPT_BLOCKS: &[(char, char, &str)] = &[
    ('\u{0900}', '\u{097F}', "hi"), // Devanagari
    ('\u{0980}', '\u{09FF}', "bn"), // Bengali
    ('\u{0C00}', '\u{0C7F}', "te"), // Telugu
    ('\u{0B80}', '\u{0BFF}', "ta"), // Tamil
    ('\u{0A80}', '\u{0AFF}', "gu"), // Gujarati
    ('\u{0C80}', '\u{0CFF}', "kn"), // Kannada
    ('\u{0D00}', '\u{0D7F}', "ml"), // Malayalam
    ('\u{0A00}', '\u{0A7F}', "pa"), // Gurmukhi
];

/// Language code to send with typed `text`.
pub fn typed_language_hint(text: &str, selected: &str) -> String {
    let trimmed = text.trim();
    if PLAIN_ASCII.is_match(trimmed) {
        return "en".to_string();
    }

    SCRIPT_BLOCKS
        .iter()
        .find(|(start, end, _)| trimmed.chars().any(|c| (*start..=*end).contains(&c)))
        .map(|(_, _, code)| code.to_string())
        .unwrap_or_else(|| selected.to_string())
}
