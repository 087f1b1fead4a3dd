//! Match classification.
//!
//! Scores prefiltered candidates against the recognized track, assigns a
//! confidence tier and orders the results. Falls back to scanning the whole
//! library when the prefilter finds nothing.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::MatchConfig;
use crate::error::{MatchError, Result};
use crate::models::{LibraryTrack, MatchConfidence, MatchResult, NormalizedFields, RecognizedTrack};
use crate::prefilter::{prefilter_candidates, Candidate, Priority};
use crate::scoring::{
    calculate_artist_similarity, check_artist_in_title_with, title_similarity_normalized,
};

/// Candidates scored between cancellation checks
pub const CLASSIFY_CHUNK_SIZE: usize = 256;

/// Find library entries matching a recognized track, best first.
///
/// Empty title or empty library yields an empty list.
pub fn find_matches(recognized: &RecognizedTrack, library: &[LibraryTrack]) -> Vec<MatchResult> {
    find_matches_with(
        recognized,
        library,
        &MatchConfig::default(),
        &CancellationToken::new(),
    )
    .unwrap_or_default()
}

/// `find_matches` with explicit thresholds and cooperative cancellation.
pub fn find_matches_with(
    recognized: &RecognizedTrack,
    library: &[LibraryTrack],
    config: &MatchConfig,
    cancel: &CancellationToken,
) -> Result<Vec<MatchResult>> {
    if recognized.title.trim().is_empty() || library.is_empty() {
        return Ok(Vec::new());
    }

    let query = NormalizedFields::compute(&recognized.title, &recognized.artist);
    if query.title.is_empty() {
        return Ok(Vec::new());
    }

    let mut candidates = prefilter_candidates(&query, library, config.prefilter_cap, cancel)?;
    if candidates.is_empty() {
        debug!(
            title = %recognized.title,
            library = library.len(),
            "prefilter found no candidates, scanning full library"
        );
        candidates = library.iter().map(Candidate::unfiltered).collect();
    }

    classify_candidates(recognized, &query, &candidates, config, cancel)
}

/// Score every candidate, keep those reaching a confidence tier and sort them
/// by score descending. Candidate order breaks ties.
///
/// With early exit on, a High match above `early_exit_score` ends the scan at
/// the first candidate of a lower priority than its own. Candidates must be
/// ordered by priority.
pub fn classify_candidates(
    recognized: &RecognizedTrack,
    query: &NormalizedFields,
    candidates: &[Candidate<'_>],
    config: &MatchConfig,
    cancel: &CancellationToken,
) -> Result<Vec<MatchResult>> {
    let mut results = Vec::new();
    // Priority bucket of the first decisive match; that bucket is still scored
    // in full since its order says nothing about score.
    let mut decisive_priority: Option<Priority> = None;

    'chunks: for chunk in candidates.chunks(CLASSIFY_CHUNK_SIZE) {
        if cancel.is_cancelled() {
            return Err(MatchError::Cancelled);
        }
        for candidate in chunk {
            if decisive_priority.is_some_and(|p| candidate.priority > p) {
                debug!(
                    skipped = ?candidate.priority,
                    "decisive match found, skipping lower-priority candidates"
                );
                break 'chunks;
            }
            let Some(result) = score_candidate(recognized, query, candidate, config) else {
                continue;
            };
            if decisive_priority.is_none()
                && config.early_exit
                && result.confidence == MatchConfidence::High
                && result.score > config.early_exit_score
            {
                decisive_priority = Some(candidate.priority);
            }
            results.push(result);
        }
    }

    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    Ok(results)
}

/// Tier for a pair of scores, `None` when below every tier.
pub fn classify_confidence(
    title_score: f64,
    artist_score: f64,
    config: &MatchConfig,
) -> Option<MatchConfidence> {
    if title_score > config.high_title && artist_score > config.high_artist {
        Some(MatchConfidence::High)
    } else if title_score > config.medium_title && artist_score > config.medium_artist {
        Some(MatchConfidence::Medium)
    } else if title_score > config.low_title && artist_score > config.low_artist {
        Some(MatchConfidence::Low)
    } else {
        None
    }
}

fn score_candidate(
    recognized: &RecognizedTrack,
    query: &NormalizedFields,
    candidate: &Candidate<'_>,
    config: &MatchConfig,
) -> Option<MatchResult> {
    let fields = &candidate.fields;
    let track = candidate.track;

    let mut title_score = title_similarity_normalized(
        &fields.base_title,
        &fields.title,
        &query.base_title,
        &query.title,
    );
    let mut artist_score = if !fields.artist.is_empty() && fields.artist == query.artist {
        1.0
    } else {
        calculate_artist_similarity(&track.artist, &recognized.artist)
    };

    let direct = title_score * config.title_weight + artist_score * config.artist_weight;
    if direct < 1.0 {
        if let Some(embedded) =
            check_artist_in_title_with(&track.title, &recognized.title, &recognized.artist, config)
        {
            if embedded.combined(config) > direct {
                title_score = embedded.title_score;
                artist_score = embedded.artist_score;
            }
        }
    }

    let confidence = classify_confidence(title_score, artist_score, config)?;
    Some(MatchResult {
        track: track.clone(),
        confidence,
        score: title_score * config.title_weight + artist_score * config.artist_weight,
        title_score,
        artist_score,
    })
}

/// The match to present as "the" identification: first high-confidence
/// result, else first medium one. Low-confidence results never qualify.
pub fn get_best_match(results: &[MatchResult]) -> Option<&MatchResult> {
    results
        .iter()
        .find(|r| r.confidence == MatchConfidence::High)
        .or_else(|| {
            results
                .iter()
                .find(|r| r.confidence == MatchConfidence::Medium)
        })
}

// ============================================================================
// TESTS
// ============================================================================
