//! Similarity scoring between normalized strings.
//!
//! This module contains:
//! - Generic string similarity (containment bonus, word overlap, edit distance)
//! - Title similarity over base and full titles
//! - Artist similarity across individual performers
//! - The "Artist - Title" embedded-in-title heuristic

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;

use crate::config::MatchConfig;
use crate::normalize::{
    normalize_artist, normalize_string, normalize_title, significant_words, split_artists,
};

// ============================================================================
// Similarity Constants
// ============================================================================

/// Floor of the containment bonus when one string contains the other
pub const CONTAINMENT_BASE: f64 = 0.85;

/// Share of the containment bonus scaled by the length ratio
pub const CONTAINMENT_LENGTH_WEIGHT: f64 = 0.15;

/// Weight of the word-set (Jaccard) overlap in the blended similarity
pub const WORD_OVERLAP_WEIGHT: f64 = 0.6;

/// Weight of the edit-distance ratio in the blended similarity
pub const EDIT_DISTANCE_WEIGHT: f64 = 0.4;

/// A performer-level artist match must beat this to override the whole-credit score
pub const PERFORMER_MATCH_THRESHOLD: f64 = 0.8;

// ============================================================================
// Regex Patterns
// ============================================================================

/// Spaced dash variants: "Artist - Title", "Artist – Title", "Artist _ Title"
pub static SPACED_DASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+[-–—_]\s+").unwrap());

/// Bare dash variants: "Artist-Title", "Artist_Title"
pub static BARE_DASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-–—_]").unwrap());

// ============================================================================
// String Similarity
// ============================================================================

/// Similarity between two raw strings (0.0 to 1.0). Both are normalized first.
pub fn calculate_similarity(a: &str, b: &str) -> f64 {
    similarity_normalized(&normalize_string(a), &normalize_string(b))
}

/// Similarity between two strings that are already normalized.
pub fn similarity_normalized(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let a_len = a.chars().count();
    let b_len = b.chars().count();
    let (shorter, longer, short_len, long_len) = if a_len <= b_len {
        (a, b, a_len, b_len)
    } else {
        (b, a, b_len, a_len)
    };

    if longer.contains(shorter) {
        let ratio = short_len as f64 / long_len as f64;
        return (CONTAINMENT_BASE + CONTAINMENT_LENGTH_WEIGHT * ratio).min(1.0);
    }

    let overlap = word_overlap(a, b);
    let distance = strsim::levenshtein(a, b);
    let edit_similarity = 1.0 - distance as f64 / long_len as f64;

    (WORD_OVERLAP_WEIGHT * overlap + EDIT_DISTANCE_WEIGHT * edit_similarity).clamp(0.0, 1.0)
}

/// Jaccard similarity on whitespace tokens.
pub fn word_overlap(a: &str, b: &str) -> f64 {
    let tokens_a: FxHashSet<&str> = a.split_whitespace().collect();
    let tokens_b: FxHashSet<&str> = b.split_whitespace().collect();

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();

    intersection as f64 / union as f64
}

// ============================================================================
// Title Similarity
// ============================================================================

/// Best of base-title and full-title similarity, so "Song" vs "Song (Remix)"
/// is not penalized for the suffix.
pub fn calculate_title_similarity(t1: &str, t2: &str) -> f64 {
    title_similarity_normalized(
        &normalize_title(t1),
        &normalize_string(t1),
        &normalize_title(t2),
        &normalize_string(t2),
    )
}

/// Title similarity over precomputed (base, full) normalized forms.
pub fn title_similarity_normalized(base1: &str, full1: &str, base2: &str, full2: &str) -> f64 {
    let base = similarity_normalized(base1, base2);
    if base >= 1.0 {
        return base;
    }
    base.max(similarity_normalized(full1, full2))
}

// ============================================================================
// Artist Similarity
// ============================================================================

/// Compare two artist credits performer by performer. A performer pair above
/// `PERFORMER_MATCH_THRESHOLD` wins; otherwise the whole credits are compared.
pub fn calculate_artist_similarity(a1: &str, a2: &str) -> f64 {
    let performers_1 = split_artists(a1);
    let performers_2 = split_artists(a2);

    let best_pair = performers_1
        .iter()
        .flat_map(|p1| performers_2.iter().map(move |p2| similarity_normalized(p1, p2)))
        .fold(0.0_f64, f64::max);

    if best_pair > PERFORMER_MATCH_THRESHOLD {
        return best_pair;
    }

    similarity_normalized(&normalize_artist(a1), &normalize_artist(a2))
}

// ============================================================================
// Embedded Artist Heuristic
// ============================================================================

/// Scores recovered from a library title that embeds "Artist - Title".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmbeddedArtistScore {
    pub title_score: f64,
    pub artist_score: f64,
}

impl EmbeddedArtistScore {
    pub fn combined(&self, config: &MatchConfig) -> f64 {
        self.title_score * config.title_weight + self.artist_score * config.artist_weight
    }
}

/// Split a title on the first dash, preferring a spaced one so "Jay-Z - Song"
/// splits after "Jay-Z".
fn split_on_dash(title: &str) -> Option<(&str, &str)> {
    let m = SPACED_DASH.find(title).or_else(|| BARE_DASH.find(title))?;
    let (left, right) = (title[..m.start()].trim(), title[m.end()..].trim());
    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some((left, right))
}

/// Heuristic for files tagged as "Artist - Title" in the title field.
///
/// With a dash split, the left side is scored as the artist and the right side
/// as the title; both must clear their thresholds. Without one, falls back to
/// checking that the first significant word of the recognized artist and of the
/// recognized title both appear in the library title.
pub fn check_artist_in_title(
    library_title: &str,
    recognized_title: &str,
    recognized_artist: &str,
) -> Option<EmbeddedArtistScore> {
    check_artist_in_title_with(
        library_title,
        recognized_title,
        recognized_artist,
        &MatchConfig::default(),
    )
}

pub fn check_artist_in_title_with(
    library_title: &str,
    recognized_title: &str,
    recognized_artist: &str,
    config: &MatchConfig,
) -> Option<EmbeddedArtistScore> {
    if library_title.trim().is_empty()
        || recognized_title.trim().is_empty()
        || recognized_artist.trim().is_empty()
    {
        return None;
    }

    if let Some((left, right)) = split_on_dash(library_title) {
        let artist_score = calculate_artist_similarity(left, recognized_artist);
        let title_score = calculate_title_similarity(right, recognized_title);
        if artist_score > config.embedded_artist_threshold
            && title_score > config.embedded_title_threshold
        {
            return Some(EmbeddedArtistScore {
                title_score,
                artist_score,
            });
        }
        return None;
    }

    let library_norm = normalize_string(library_title);
    let library_words: FxHashSet<&str> = library_norm.split_whitespace().collect();
    let artist_norm = normalize_artist(recognized_artist);
    let title_base = normalize_title(recognized_title);

    let artist_word = significant_words(&artist_norm).next()?;
    let title_word = significant_words(&title_base).next()?;

    if library_words.contains(artist_word) && library_words.contains(title_word) {
        Some(EmbeddedArtistScore {
            title_score: config.embedded_fallback_score,
            artist_score: config.embedded_fallback_score,
        })
    } else {
        None
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_similarity_exact_and_empty() {
        assert_eq!(calculate_similarity("Midnight Groove", "midnight groove!"), 1.0);
        assert_eq!(calculate_similarity("", "Midnight Groove"), 0.0);
        assert_eq!(calculate_similarity("Midnight Groove", ""), 0.0);
        assert_eq!(calculate_similarity("", ""), 0.0);
    }

    #[test]
    fn test_similarity_containment_bonus() {
        // "red button" (10) inside "red button extended" (19)
        let score = calculate_similarity("Red Button", "Red Button Extended");
        assert!(approx(score, 0.85 + 0.15 * (10.0 / 19.0)));
        assert!(score > 0.85 && score < 1.0);
    }

    #[test]
    fn test_similarity_blend() {
        // No containment: Jaccard 1/3, levenshtein("abc def", "abc xyz") = 3 over 7
        let score = calculate_similarity("abc def", "abc xyz");
        let expected = 0.6 * (1.0 / 3.0) + 0.4 * (1.0 - 3.0 / 7.0);
        assert!(approx(score, expected));
    }

    #[test]
    fn test_similarity_unrelated_is_low() {
        let score = calculate_similarity("Midnight Groove", "Quantum Leap");
        assert!(score < 0.5, "score was {}", score);
    }

    #[test]
    fn test_similarity_symmetric() {
        let pairs = [("one more time", "one more"), ("abc def", "abc xyz"), ("Levels", "Lovels")];
        for (a, b) in pairs {
            assert!(approx(calculate_similarity(a, b), calculate_similarity(b, a)));
        }
    }

    #[test]
    fn test_title_similarity_ignores_remix_suffix() {
        assert_eq!(calculate_title_similarity("Red Button", "Red Button (Extended Mix)"), 1.0);
        assert_eq!(calculate_title_similarity("Red Button - VIP", "Red Button"), 1.0);
        assert!(calculate_title_similarity("Red Button", "Blue Lagoon") < 0.5);
    }

    #[test]
    fn test_artist_similarity_performer_overlap() {
        // Recognition lists both, library only the main artist
        assert_eq!(
            calculate_artist_similarity("Calvin Harris feat. Dua Lipa", "Calvin Harris"),
            1.0
        );
        // Different ordering of collaborators
        assert_eq!(
            calculate_artist_similarity("Dua Lipa & Calvin Harris", "Calvin Harris, Dua Lipa"),
            1.0
        );
        assert_eq!(calculate_artist_similarity("The Beatles", "Beatles"), 1.0);
    }

    #[test]
    fn test_artist_similarity_falls_back_to_whole_credit() {
        let score = calculate_artist_similarity("Deep House Collective", "Deep House Collektive");
        assert!(score > 0.6 && score < 1.0, "score was {}", score);
        assert_eq!(calculate_artist_similarity("", "Drake"), 0.0);
    }

    #[test]
    fn test_artist_in_title_dash_split() {
        let result =
            check_artist_in_title("Drake - Red Button (Audio)", "Red Button", "Drake").unwrap();
        assert_eq!(result.artist_score, 1.0);
        assert_eq!(result.title_score, 1.0);
    }

    #[test]
    fn test_artist_in_title_dash_variants() {
        assert!(check_artist_in_title("Drake – Red Button", "Red Button", "Drake").is_some());
        assert!(check_artist_in_title("Drake_Red Button", "Red Button", "Drake").is_some());
        assert!(check_artist_in_title("Jay-Z - Encore", "Encore", "Jay-Z").is_some());
    }

    #[test]
    fn test_artist_in_title_rejects_wrong_halves() {
        assert!(check_artist_in_title("Adele - Hello", "Red Button", "Drake").is_none());
        assert!(check_artist_in_title("Drake - Hello", "Red Button", "Drake").is_none());
    }

    #[test]
    fn test_artist_in_title_fallback_without_dash() {
        let result =
            check_artist_in_title("Drake Red Button Official", "Red Button", "Drake").unwrap();
        assert_eq!(result.title_score, 0.7);
        assert_eq!(result.artist_score, 0.7);
        assert!(check_artist_in_title("Red Button Official", "Red Button", "Drake").is_none());
    }

    #[test]
    fn test_artist_in_title_empty_inputs() {
        assert!(check_artist_in_title("", "Red Button", "Drake").is_none());
        assert!(check_artist_in_title("Drake - Red Button", "", "Drake").is_none());
    }
}
