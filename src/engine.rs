//! One identification run: match, pick the best, find its variations, then
//! locate the crates holding it.
//!
//! Scoring is CPU-bound and runs on the blocking pool; crate location is the
//! only stage that awaits the library collaborator.

use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::MatchConfig;
use crate::crates::{find_track_crates_with, CrateLoader, DEFAULT_LOAD_CONCURRENCY};
use crate::error::Result;
use crate::matcher::{find_matches_with, get_best_match};
use crate::models::{
    CrateMembership, CrateNode, LibraryTrack, MatchResult, RecognizedTrack, VariationResult,
};
use crate::variations::find_variations_with;

/// Everything the host shows for one recognized sample.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentificationReport {
    pub recognized: RecognizedTrack,
    pub matches: Vec<MatchResult>,
    pub best_match: Option<MatchResult>,
    pub variations: Vec<VariationResult>,
    pub crates: Vec<CrateMembership>,
}

/// Matching and variation search only; `crates` is left empty.
///
/// Synchronous so batch callers can fan queries out across threads.
pub fn identify_in_library(
    recognized: &RecognizedTrack,
    library: &[LibraryTrack],
    config: &MatchConfig,
    cancel: &CancellationToken,
) -> Result<IdentificationReport> {
    let matches = find_matches_with(recognized, library, config, cancel)?;
    let best_match = get_best_match(&matches).cloned();
    let exclude_id = best_match.as_ref().map(|m| m.track.id.as_str());
    let variations = find_variations_with(recognized, library, exclude_id, config, cancel)?;

    debug!(
        title = %recognized.title,
        matches = matches.len(),
        best = ?best_match.as_ref().map(|m| &m.track.id),
        variations = variations.len(),
        "library search complete"
    );

    Ok(IdentificationReport {
        recognized: recognized.clone(),
        matches,
        best_match,
        variations,
        crates: Vec::new(),
    })
}

/// Fill in `crates` for the report's best match. No best match, no lookup.
pub async fn locate_best_match_crates(
    report: &mut IdentificationReport,
    crate_tree: &[CrateNode],
    loader: &dyn CrateLoader,
    cancel: &CancellationToken,
    concurrency: usize,
) -> Result<()> {
    if let Some(best) = &report.best_match {
        report.crates =
            find_track_crates_with(&best.track.id, crate_tree, loader, cancel, concurrency).await?;
    }
    Ok(())
}

/// Full identification with sequential crate loads.
pub async fn identify(
    recognized: RecognizedTrack,
    library: Arc<Vec<LibraryTrack>>,
    crate_tree: &[CrateNode],
    loader: &dyn CrateLoader,
    config: &MatchConfig,
    cancel: &CancellationToken,
) -> Result<IdentificationReport> {
    identify_with(
        recognized,
        library,
        crate_tree,
        loader,
        config,
        cancel,
        DEFAULT_LOAD_CONCURRENCY,
    )
    .await
}

pub async fn identify_with(
    recognized: RecognizedTrack,
    library: Arc<Vec<LibraryTrack>>,
    crate_tree: &[CrateNode],
    loader: &dyn CrateLoader,
    config: &MatchConfig,
    cancel: &CancellationToken,
    concurrency: usize,
) -> Result<IdentificationReport> {
    let task_config = config.clone();
    let task_cancel = cancel.clone();
    let mut report = tokio::task::spawn_blocking(move || {
        identify_in_library(&recognized, &library, &task_config, &task_cancel)
    })
    .await??;

    locate_best_match_crates(&mut report, crate_tree, loader, cancel, concurrency).await?;
    Ok(report)
}

// ============================================================================
// TESTS
// ============================================================================
