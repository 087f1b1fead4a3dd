//! Variation search: other edits, remixes and versions of the recognized song.
//!
//! Unlike the matcher, which asks "is this the same tagged entry", this asks
//! "is this a different version of the same song" and is therefore looser on
//! titles and stricter on keywords.

use rustc_hash::FxHashSet;
use std::borrow::Cow;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::MatchConfig;
use crate::error::{MatchError, Result};
use crate::models::{
    LibraryTrack, NormalizedFields, RecognizedTrack, VariationKind, VariationResult,
};
use crate::normalize::{has_variation_keyword, significant_words};
use crate::prefilter::PREFILTER_CHUNK_SIZE;
use crate::scoring::{calculate_artist_similarity, title_similarity_normalized};

/// Find up to five other versions of the recognized song, most similar first.
/// `exclude_id` is the already-matched track, never returned.
pub fn find_variations(
    recognized: &RecognizedTrack,
    library: &[LibraryTrack],
    exclude_id: Option<&str>,
) -> Vec<VariationResult> {
    find_variations_with(
        recognized,
        library,
        exclude_id,
        &MatchConfig::default(),
        &CancellationToken::new(),
    )
    .unwrap_or_default()
}

pub fn find_variations_with(
    recognized: &RecognizedTrack,
    library: &[LibraryTrack],
    exclude_id: Option<&str>,
    config: &MatchConfig,
    cancel: &CancellationToken,
) -> Result<Vec<VariationResult>> {
    if recognized.title.trim().is_empty() || library.is_empty() {
        return Ok(Vec::new());
    }

    let query = NormalizedFields::compute(&recognized.title, &recognized.artist);
    let mut base_words: Vec<&str> = significant_words(&query.base_title).collect();
    if base_words.is_empty() {
        // Titles made only of short words ("Up", "I Am")
        base_words = query.base_title.split_whitespace().collect();
    }
    if base_words.is_empty() {
        return Ok(Vec::new());
    }

    let candidates = collect_candidates(library, exclude_id, &base_words, config, cancel)?;

    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut results = Vec::new();

    for (track, fields) in &candidates {
        if !seen.insert(track.id.as_str()) {
            continue;
        }

        let title_similarity = title_similarity_normalized(
            &fields.base_title,
            &fields.title,
            &query.base_title,
            &query.title,
        );
        let artist_similarity = if !fields.artist.is_empty() && fields.artist == query.artist {
            1.0
        } else {
            calculate_artist_similarity(&track.artist, &recognized.artist)
        };
        let has_keyword = has_variation_keyword(&fields.title);

        let title_words: FxHashSet<&str> = fields.title.split_whitespace().collect();
        let matched = base_words.iter().filter(|w| title_words.contains(*w)).count();
        let word_majority = matched * 2 > base_words.len();

        let include = (title_similarity > config.variation_title_with_artist
            && artist_similarity > config.variation_artist_match)
            || (title_similarity > config.variation_title_with_keyword && has_keyword)
            || (word_majority
                && title_similarity > config.variation_majority_title
                && artist_similarity > config.variation_majority_artist);

        if include {
            results.push(VariationResult {
                track: (*track).clone(),
                kind: if has_keyword {
                    VariationKind::Variation
                } else {
                    VariationKind::Related
                },
                similarity: title_similarity,
            });
        }
    }

    debug!(
        candidates = candidates.len(),
        included = results.len(),
        "variation search complete"
    );

    results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    results.truncate(config.variation_limit);
    Ok(results)
}

/// Tracks sharing at least one base-title word, in library order, capped.
fn collect_candidates<'a>(
    library: &'a [LibraryTrack],
    exclude_id: Option<&str>,
    base_words: &[&str],
    config: &MatchConfig,
    cancel: &CancellationToken,
) -> Result<Vec<(&'a LibraryTrack, Cow<'a, NormalizedFields>)>> {
    let mut candidates = Vec::new();

    for chunk in library.chunks(PREFILTER_CHUNK_SIZE) {
        if cancel.is_cancelled() {
            return Err(MatchError::Cancelled);
        }
        for track in chunk {
            if exclude_id == Some(track.id.as_str()) {
                continue;
            }
            let fields = track.normalized();
            let shares_word = fields
                .title
                .split_whitespace()
                .any(|w| base_words.contains(&w));
            if shares_word {
                candidates.push((track, fields));
                if candidates.len() >= config.variation_candidate_cap {
                    return Ok(candidates);
                }
            }
        }
    }

    Ok(candidates)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excludes_match_and_tags_variation() {
        let library = vec![
            LibraryTrack::new("X", "Red Button", "Drake"),
            LibraryTrack::new("Y", "Red Button (Extended Mix)", "Drake"),
            LibraryTrack::new("Z", "Blue Lagoon", "Drake"),
        ];
        let recognized = RecognizedTrack::new("Red Button", "Drake");
        let results = find_variations(&recognized, &library, Some("X"));

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].track.id, "Y");
        assert_eq!(results[0].kind, VariationKind::Variation);
        assert!(results.iter().all(|r| r.track.id != "X"));
    }

    #[test]
    fn test_duplicate_ids_returned_once() {
        let library = vec![
            LibraryTrack::new("X", "Red Button", "Drake"),
            LibraryTrack::new("Y", "Red Button (Extended Mix)", "Drake"),
            LibraryTrack::new("Y", "Red Button (Extended Mix)", "Drake"),
        ];
        let recognized = RecognizedTrack::new("Red Button", "Drake");
        let results = find_variations(&recognized, &library, Some("X"));

        let ids: Vec<&str> = results.iter().map(|r| r.track.id.as_str()).collect();
        assert_eq!(ids, vec!["Y"]);
    }

    #[test]
    fn test_related_without_keyword() {
        let library = vec![
            LibraryTrack::new("X", "Red Button", "Drake"),
            LibraryTrack::new("dup", "Red Button", "Drake feat. Future"),
        ];
        let recognized = RecognizedTrack::new("Red Button", "Drake");
        let results = find_variations(&recognized, &library, Some("X"));

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].track.id, "dup");
        assert_eq!(results[0].kind, VariationKind::Related);
    }

    #[test]
    fn test_other_artist_remix_needs_keyword() {
        let library = vec![
            LibraryTrack::new("remix", "Red Button (Skrillex Remix)", "Skrillex"),
            LibraryTrack::new("cover", "Red Button", "Some Cover Band"),
        ];
        let recognized = RecognizedTrack::new("Red Button", "Drake");
        let results = find_variations(&recognized, &library, None);

        let ids: Vec<&str> = results.iter().map(|r| r.track.id.as_str()).collect();
        assert_eq!(ids, vec!["remix"]);
    }

    #[test]
    fn test_limit_and_ordering() {
        let mut library: Vec<LibraryTrack> = (0..8)
            .map(|i| {
                LibraryTrack::new(format!("r{}", i), format!("Red Button (Remix {})", i), "Drake")
            })
            .collect();
        library.push(LibraryTrack::new("loose", "Red Buttons Anthem", "Drake"));

        let recognized = RecognizedTrack::new("Red Button", "Drake");
        let results = find_variations(&recognized, &library, None);

        assert_eq!(results.len(), 5);
        for pair in results.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
        assert!(results.iter().all(|r| r.track.id != "loose"));
    }

    #[test]
    fn test_empty_library_and_title() {
        let recognized = RecognizedTrack::new("Red Button", "Drake");
        assert!(find_variations(&recognized, &[], None).is_empty());

        let library = vec![LibraryTrack::new("Y", "Red Button (VIP)", "Drake")];
        assert!(find_variations(&RecognizedTrack::new("", "Drake"), &library, None).is_empty());
    }

    #[test]
    fn test_all_bracket_title_finds_variation() {
        let library = vec![
            LibraryTrack::new("orig", "[Untitled]", "Drake"),
            LibraryTrack::new("vip", "[Untitled] (VIP)", "Drake"),
        ];
        let recognized = RecognizedTrack::new("[Untitled]", "Drake");
        let results = find_variations(&recognized, &library, Some("orig"));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].track.id, "vip");
        assert_eq!(results[0].kind, VariationKind::Variation);
    }

    #[test]
    fn test_short_word_titles_still_searched() {
        let library = vec![
            LibraryTrack::new("orig", "Up", "Stellar Drift"),
            LibraryTrack::new("vip", "Up (VIP)", "Stellar Drift"),
        ];
        let recognized = RecognizedTrack::new("Up", "Stellar Drift");
        let results = find_variations(&recognized, &library, Some("orig"));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].track.id, "vip");
    }
}
