//! Matching thresholds and weights.
//!
//! Every number the matcher compares against lives here as a named default,
//! and can be overridden per run from a TOML file:
//!
//! ```toml
//! high_title = 0.8
//! prefilter_cap = 250
//! early_exit = false
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================================================
// Score Weights
// ============================================================================

/// Weight of the title score in `MatchResult::score`
pub const TITLE_WEIGHT: f64 = 0.6;

/// Weight of the artist score in `MatchResult::score`
pub const ARTIST_WEIGHT: f64 = 0.4;

// ============================================================================
// Confidence Tiers (title, artist); both must be exceeded
// ============================================================================

pub const HIGH_TITLE_THRESHOLD: f64 = 0.75;
pub const HIGH_ARTIST_THRESHOLD: f64 = 0.6;
pub const MEDIUM_TITLE_THRESHOLD: f64 = 0.6;
pub const MEDIUM_ARTIST_THRESHOLD: f64 = 0.4;
pub const LOW_TITLE_THRESHOLD: f64 = 0.5;
pub const LOW_ARTIST_THRESHOLD: f64 = 0.3;

/// A high-confidence result above this score stops classification early
pub const EARLY_EXIT_SCORE: f64 = 0.9;

// ============================================================================
// Embedded "Artist - Title" Heuristic
// ============================================================================

pub const EMBEDDED_ARTIST_THRESHOLD: f64 = 0.7;
pub const EMBEDDED_TITLE_THRESHOLD: f64 = 0.6;

/// Title and artist estimate when no dash split exists but both first words appear
pub const EMBEDDED_FALLBACK_SCORE: f64 = 0.7;

// ============================================================================
// Candidate Caps
// ============================================================================

pub const PREFILTER_CAP: usize = 100;
pub const VARIATION_CANDIDATE_CAP: usize = 200;
pub const VARIATION_LIMIT: usize = 5;

// ============================================================================
// Variation Inclusion
// ============================================================================

/// Title similarity needed when the artist matches
pub const VARIATION_TITLE_WITH_ARTIST: f64 = 0.55;

/// Artist similarity that counts as "artist matches"
pub const VARIATION_ARTIST_MATCH: f64 = 0.7;

/// Title similarity needed when a variation keyword is present
pub const VARIATION_TITLE_WITH_KEYWORD: f64 = 0.7;

/// Title and artist similarity needed when most significant words match
pub const VARIATION_MAJORITY_TITLE: f64 = 0.45;
pub const VARIATION_MAJORITY_ARTIST: f64 = 0.6;

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub title_weight: f64,
    pub artist_weight: f64,

    pub high_title: f64,
    pub high_artist: f64,
    pub medium_title: f64,
    pub medium_artist: f64,
    pub low_title: f64,
    pub low_artist: f64,

    pub early_exit: bool,
    pub early_exit_score: f64,

    pub embedded_artist_threshold: f64,
    pub embedded_title_threshold: f64,
    pub embedded_fallback_score: f64,

    pub prefilter_cap: usize,

    pub variation_candidate_cap: usize,
    pub variation_limit: usize,
    pub variation_title_with_artist: f64,
    pub variation_artist_match: f64,
    pub variation_title_with_keyword: f64,
    pub variation_majority_title: f64,
    pub variation_majority_artist: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            title_weight: TITLE_WEIGHT,
            artist_weight: ARTIST_WEIGHT,
            high_title: HIGH_TITLE_THRESHOLD,
            high_artist: HIGH_ARTIST_THRESHOLD,
            medium_title: MEDIUM_TITLE_THRESHOLD,
            medium_artist: MEDIUM_ARTIST_THRESHOLD,
            low_title: LOW_TITLE_THRESHOLD,
            low_artist: LOW_ARTIST_THRESHOLD,
            early_exit: true,
            early_exit_score: EARLY_EXIT_SCORE,
            embedded_artist_threshold: EMBEDDED_ARTIST_THRESHOLD,
            embedded_title_threshold: EMBEDDED_TITLE_THRESHOLD,
            embedded_fallback_score: EMBEDDED_FALLBACK_SCORE,
            prefilter_cap: PREFILTER_CAP,
            variation_candidate_cap: VARIATION_CANDIDATE_CAP,
            variation_limit: VARIATION_LIMIT,
            variation_title_with_artist: VARIATION_TITLE_WITH_ARTIST,
            variation_artist_match: VARIATION_ARTIST_MATCH,
            variation_title_with_keyword: VARIATION_TITLE_WITH_KEYWORD,
            variation_majority_title: VARIATION_MAJORITY_TITLE,
            variation_majority_artist: VARIATION_MAJORITY_ARTIST,
        }
    }
}

impl MatchConfig {
    /// Parse a (possibly partial) TOML override; unspecified keys keep defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: MatchConfig = toml::from_str(content).context("Parse match config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Read match config {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Reject thresholds outside 0..=1 and non-positive caps.
    pub fn validate(&self) -> Result<()> {
        let unit_values = [
            ("title_weight", self.title_weight),
            ("artist_weight", self.artist_weight),
            ("high_title", self.high_title),
            ("high_artist", self.high_artist),
            ("medium_title", self.medium_title),
            ("medium_artist", self.medium_artist),
            ("low_title", self.low_title),
            ("low_artist", self.low_artist),
            ("early_exit_score", self.early_exit_score),
            ("embedded_artist_threshold", self.embedded_artist_threshold),
            ("embedded_title_threshold", self.embedded_title_threshold),
            ("embedded_fallback_score", self.embedded_fallback_score),
            ("variation_title_with_artist", self.variation_title_with_artist),
            ("variation_artist_match", self.variation_artist_match),
            ("variation_title_with_keyword", self.variation_title_with_keyword),
            ("variation_majority_title", self.variation_majority_title),
            ("variation_majority_artist", self.variation_majority_artist),
        ];
        for (name, value) in unit_values {
            if !(0.0..=1.0).contains(&value) {
                bail!("Invalid match config: {} = {} is outside 0..=1", name, value);
            }
        }

        let weight_sum = self.title_weight + self.artist_weight;
        if (weight_sum - 1.0).abs() > 1e-6 {
            bail!(
                "Invalid match config: title_weight + artist_weight must be 1.0, got {}",
                weight_sum
            );
        }

        if self.prefilter_cap == 0 || self.variation_candidate_cap == 0 {
            bail!("Invalid match config: candidate caps must be greater than zero");
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
