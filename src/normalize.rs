//! Normalization functions producing comparable forms of titles and artists.
//!
//! All functions are pure and total: any input (including empty) yields a
//! string, never an error. `normalize_string` is idempotent and is the base
//! every other form is built on.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// KEYWORDS
// ============================================================================

/// Keywords that turn a trailing clause into a remix/edit/version suffix.
pub const TITLE_VERSION_KEYWORDS: &[&str] =
    &["remix", "edit", "mix", "version", "bootleg", "rework", "flip", "vip"];

/// Words that usually sit directly in front of a version keyword
/// ("Extended Mix", "Radio Edit", "Club Version").
pub const VERSION_QUALIFIERS: &[&str] = &[
    "extended", "original", "radio", "club", "dub", "short", "long", "vocal", "instrumental",
    "album", "single", "clean", "dirty",
];

/// Keywords marking a track as a different version of the same song.
pub const VARIATION_KEYWORDS: &[&str] = &[
    "remix", "edit", "vip", "flip", "bootleg", "rework", "extended", "intro", "outro", "mashup",
    "blend", "version", "mix", "dub", "instrumental", "acapella", "sped", "slowed", "pitched",
];

/// Words shorter than this carry no signal for word-overlap checks.
pub const SIGNIFICANT_WORD_MIN_LEN: usize = 3;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Bracketed clause containing a version keyword anywhere: "(Skrillex Remix)", "[VIP]"
pub static BRACKETED_VERSION_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s*[\(\[][^\(\)\[\]]*\b(?:remix(?:ed)?|edit|mix|version|bootleg|rework(?:ed)?|flip|vip)\b[^\(\)\[\]]*[\)\]]",
    )
    .unwrap()
});

/// Dash-introduced suffix clause with a version keyword: "Song - Extended Mix"
/// Requires whitespace around the dash so "Jay-Z" is left alone.
pub static DASH_VERSION_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s+[-–—]\s+[^-–—]*\b(?:remix(?:ed)?|edit|mix|version|bootleg|rework(?:ed)?|flip|vip)\b.*$",
    )
    .unwrap()
});

/// Trailing annotation like "(Audio)", "[Clean]", "(2019)"
pub static TRAILING_ANNOTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[\(\[][^\(\)\[\]]*[\)\]]\s*$").unwrap());

/// Brackets are dropped before splitting credits: "A (feat. B)" → "A  feat. B "
pub static CREDIT_BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\(\)\[\]]").unwrap());

/// Multi-artist separator pattern for splitting a credit into performers.
/// Matches: &, /, ,, ;, +, ×, x, vs, and, with, feat, ft, featuring
pub static ARTIST_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*(?:[&/,;+×]|(?:\s+(?:x|vs\.?|and|with|feat\.?|ft\.?|featuring)\s+))\s*")
        .unwrap()
});

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to lower-case ASCII by applying NFKD decomposition and
/// removing combining marks, then transliterating what is left.
/// e.g., "Beyoncé" → "beyonce", "Motörhead" → "motorhead"
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    any_ascii(&stripped).to_lowercase()
}

/// Whitespace tokens long enough to carry signal.
pub fn significant_words(s: &str) -> impl Iterator<Item = &str> {
    s.split_whitespace()
        .filter(|w| w.chars().count() >= SIGNIFICANT_WORD_MIN_LEN)
}

/// True when a normalized title contains any variation keyword as a word.
pub fn has_variation_keyword(normalized_title: &str) -> bool {
    normalized_title
        .split_whitespace()
        .any(|w| VARIATION_KEYWORDS.contains(&w))
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Lower-case, fold to ASCII, turn `/`, `&`, `,` into spaces, strip any other
/// punctuation, collapse whitespace and trim.
pub fn normalize_string(s: &str) -> String {
    let folded = fold_to_ascii(s);
    let mut out = String::with_capacity(folded.len());
    for c in folded.chars() {
        if matches!(c, '/' | '&' | ',') || c.is_whitespace() {
            out.push(' ');
        } else if c.is_ascii_alphanumeric() {
            out.push(c);
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize an artist credit so collaboration spellings line up:
/// "A feat. B", "A ft. B" and "A featuring B" all become "a ft b";
/// "A & B", "A and B", "A x B" and "A vs. B" all become "a b".
/// A leading "the" is dropped.
pub fn normalize_artist(s: &str) -> String {
    let normalized = normalize_string(s);
    let mut tokens: Vec<&str> = Vec::new();
    for (i, token) in normalized.split(' ').enumerate() {
        match token {
            "the" if i == 0 => {}
            "feat" | "featuring" => tokens.push("ft"),
            "and" | "x" | "vs" => {}
            other => tokens.push(other),
        }
    }
    if tokens.is_empty() {
        // Single-word names like "X" or "The"
        return normalized;
    }
    tokens.join(" ")
}

/// Split a raw artist credit into individually normalized performers.
/// e.g., "Drake, Rihanna & Future" → ["drake", "rihanna", "future"]
pub fn split_artists(s: &str) -> Vec<String> {
    let unbracketed = CREDIT_BRACKETS.replace_all(s, " ");
    ARTIST_SEPARATOR
        .split(&unbracketed)
        .map(normalize_artist)
        .filter(|a| !a.is_empty())
        .collect()
}

/// Base title for cross-version matching: remix/edit/version clauses and
/// trailing annotations removed, then normalized.
/// e.g., "Red Button (Extended Mix)" → "red button",
///       "Red Button - Skrillex Remix" → "red button"
pub fn normalize_title(s: &str) -> String {
    let mut result = BRACKETED_VERSION_CLAUSE.replace_all(s, "").to_string();
    result = DASH_VERSION_CLAUSE.replace(&result, "").to_string();

    // "Song (Audio) [Clean]" needs more than one pass
    loop {
        let stripped = TRAILING_ANNOTATION.replace(&result, "");
        if stripped.len() == result.len() {
            break;
        }
        result = stripped.to_string();
    }

    let normalized = normalize_string(&result);
    if normalized.is_empty() {
        // Nothing left outside the brackets: "[VIP]", "(Intro)"
        return normalize_string(s);
    }
    truncate_version_suffix(&normalized)
}

/// Cut an unbracketed suffix clause: "red button extended mix" → "red button".
/// Only applies when the title ends with a keyword; the first word is never cut.
fn truncate_version_suffix(normalized: &str) -> String {
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    let ends_with_keyword = tokens
        .last()
        .is_some_and(|t| TITLE_VERSION_KEYWORDS.contains(t));
    if tokens.len() < 2 || !ends_with_keyword {
        return normalized.to_string();
    }

    let Some(first_keyword) = tokens
        .iter()
        .skip(1)
        .position(|t| TITLE_VERSION_KEYWORDS.contains(t))
        .map(|p| p + 1)
    else {
        return normalized.to_string();
    };

    let mut end = first_keyword;
    while end > 1 && VERSION_QUALIFIERS.contains(&tokens[end - 1]) {
        end -= 1;
    }
    tokens[..end].join(" ")
}

// ============================================================================
// TESTS
// ============================================================================
