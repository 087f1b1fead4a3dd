//! Candidate prefilter.
//!
//! One cheap pass over the whole library (string equality, substring and word
//! lookups only, no edit distance) that keeps the tracks worth scoring and
//! ranks them by how they matched.

use rustc_hash::FxHashSet;
use std::borrow::Cow;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{MatchError, Result};
use crate::models::{LibraryTrack, NormalizedFields};
use crate::normalize::significant_words;

/// Tracks screened between cancellation checks
pub const PREFILTER_CHUNK_SIZE: usize = 4096;

/// How a candidate survived the prefilter. Lower sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    /// Full or base title equal
    Exact = 1,
    /// One title contains the other
    Containment = 2,
    /// At least half of the significant title words present
    WordMajority = 3,
    /// Artist token plus any title word
    ArtistWord = 4,
    /// Not screened; the whole library is being scanned
    Unfiltered = 5,
}

/// A library track selected for full scoring.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub track: &'a LibraryTrack,
    pub fields: Cow<'a, NormalizedFields>,
    pub priority: Priority,
}

impl<'a> Candidate<'a> {
    /// Candidate for the full-library fallback scan.
    pub fn unfiltered(track: &'a LibraryTrack) -> Self {
        Self {
            track,
            fields: track.normalized(),
            priority: Priority::Unfiltered,
        }
    }
}

/// Significant words of the recognized track, computed once per query.
struct QueryWords<'q> {
    title: Vec<&'q str>,
    artist: Vec<&'q str>,
}

impl<'q> QueryWords<'q> {
    fn new(query: &'q NormalizedFields) -> Self {
        Self {
            title: significant_words(&query.base_title).collect(),
            artist: significant_words(&query.artist).collect(),
        }
    }
}

fn contains_either(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}

fn classify_priority(
    query: &NormalizedFields,
    words: &QueryWords<'_>,
    fields: &NormalizedFields,
) -> Option<Priority> {
    if fields.title.is_empty() {
        return None;
    }

    if fields.title == query.title
        || (!fields.base_title.is_empty() && fields.base_title == query.base_title)
    {
        return Some(Priority::Exact);
    }

    if contains_either(&fields.title, &query.title)
        || contains_either(&fields.base_title, &query.base_title)
    {
        return Some(Priority::Containment);
    }

    let title_words: FxHashSet<&str> = fields.title.split_whitespace().collect();
    let matched = words
        .title
        .iter()
        .filter(|w| title_words.contains(*w))
        .count();
    if !words.title.is_empty() && matched * 2 >= words.title.len() {
        return Some(Priority::WordMajority);
    }

    if matched > 0 && !words.artist.is_empty() {
        let artist_words: FxHashSet<&str> = fields.artist.split_whitespace().collect();
        if words.artist.iter().any(|w| artist_words.contains(w)) {
            return Some(Priority::ArtistWord);
        }
    }

    None
}

/// Screen the library for a recognized track's normalized fields.
///
/// Returns at most `cap` candidates ordered by priority, library order breaking
/// ties. An empty result means the caller should scan everything.
pub fn prefilter_candidates<'a>(
    query: &NormalizedFields,
    library: &'a [LibraryTrack],
    cap: usize,
    cancel: &CancellationToken,
) -> Result<Vec<Candidate<'a>>> {
    let words = QueryWords::new(query);
    let mut candidates = Vec::new();

    for chunk in library.chunks(PREFILTER_CHUNK_SIZE) {
        if cancel.is_cancelled() {
            return Err(MatchError::Cancelled);
        }
        for track in chunk {
            let fields = track.normalized();
            if let Some(priority) = classify_priority(query, &words, &fields) {
                candidates.push(Candidate {
                    track,
                    fields,
                    priority,
                });
            }
        }
    }

    let screened = candidates.len();
    candidates.sort_by_key(|c| c.priority);
    candidates.truncate(cap);

    debug!(
        library = library.len(),
        screened,
        kept = candidates.len(),
        "prefilter pass complete"
    );
    Ok(candidates)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn query(title: &str, artist: &str) -> NormalizedFields {
        NormalizedFields::compute(title, artist)
    }

    fn run(q: &NormalizedFields, library: &[LibraryTrack], cap: usize) -> Vec<(String, Priority)> {
        prefilter_candidates(q, library, cap, &CancellationToken::new())
            .unwrap()
            .into_iter()
            .map(|c| (c.track.id.clone(), c.priority))
            .collect()
    }

    #[test]
    fn test_priorities_and_order() {
        let library = vec![
            LibraryTrack::new("half", "Button Mashers", "Drake"),
            LibraryTrack::new("majority", "The Red Big Button", "Someone"),
            LibraryTrack::new("contain", "Red Button Anthem", "Someone"),
            LibraryTrack::new("exact", "Red Button", "Someone"),
            LibraryTrack::new("base", "Red Button (Club Mix)", "Someone"),
            LibraryTrack::new("none", "Blue Lagoon", "Drake"),
        ];
        let result = run(&query("Red Button", "Drake"), &library, 100);
        assert_eq!(
            result,
            vec![
                ("exact".to_string(), Priority::Exact),
                ("base".to_string(), Priority::Exact),
                ("contain".to_string(), Priority::Containment),
                ("half".to_string(), Priority::WordMajority),
                ("majority".to_string(), Priority::WordMajority),
            ]
        );
    }

    #[test]
    fn test_artist_word_bucket() {
        let library = vec![
            LibraryTrack::new("a", "Midnight Dreams Forever", "Deep House Collective"),
            LibraryTrack::new("b", "Midnight Dreams Forever", "Other Band"),
        ];
        // One of three significant words is present: not a majority
        let result = run(&query("Midnight Groove Session", "Deep House Collective"), &library, 100);
        assert_eq!(result, vec![("a".to_string(), Priority::ArtistWord)]);
    }

    #[test]
    fn test_cap_keeps_best_priorities() {
        let mut library: Vec<LibraryTrack> = (0..150)
            .map(|i| LibraryTrack::new(format!("c{}", i), format!("Red Button {}", i), "X"))
            .collect();
        library.push(LibraryTrack::new("exact", "Red Button", "X"));
        let result = run(&query("Red Button", "X"), &library, 100);
        assert_eq!(result.len(), 100);
        assert_eq!(result[0], ("exact".to_string(), Priority::Exact));
    }

    #[test]
    fn test_missing_artist_still_screened() {
        let library = vec![LibraryTrack::new("1", "Red Button", "")];
        let result = run(&query("Red Button", "Drake"), &library, 100);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_empty_titles_are_skipped() {
        let library = vec![LibraryTrack::new("1", "", "Drake")];
        assert!(run(&query("Red Button", "Drake"), &library, 100).is_empty());
    }

    #[test]
    fn test_cancelled_prefilter() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let library = vec![LibraryTrack::new("1", "Red Button", "Drake")];
        let result = prefilter_candidates(&query("Red Button", "Drake"), &library, 100, &cancel);
        assert!(matches!(result, Err(MatchError::Cancelled)));
    }
}
