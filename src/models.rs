//! Core data models for track identification.
//!
//! This module contains the records exchanged with the recognition and library
//! collaborators plus the per-query result types produced by the matcher.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::normalize::{normalize_artist, normalize_string, normalize_title};

// ============================================================================
// Type Aliases
// ============================================================================

/// Opaque library track identifier (file path, database key, UUID...).
pub type TrackId = String;

/// Breadcrumb separator used in `CrateMembership::full_path`.
pub const CRATE_PATH_SEPARATOR: &str = " › ";

// ============================================================================
// Recognition Models
// ============================================================================

/// Best guess returned by the audio fingerprinting service for one sample.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedTrack {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
}

impl RecognizedTrack {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Library Models
// ============================================================================

/// Normalized forms of a track's title and artist.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NormalizedFields {
    /// `normalize_string(title)`, used for exact comparison
    pub title: String,
    /// `normalize_title(title)`, remix/edit suffixes removed
    pub base_title: String,
    /// `normalize_artist(artist)`
    pub artist: String,
}

impl NormalizedFields {
    pub fn compute(title: &str, artist: &str) -> Self {
        Self {
            title: normalize_string(title),
            base_title: normalize_title(title),
            artist: normalize_artist(artist),
        }
    }
}

/// One audio file in the user's collection. Read-only to the matcher.
///
/// Missing `title`/`artist` deserialize to empty strings so poorly tagged files
/// still take part in scoring.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryTrack {
    pub id: TrackId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub bpm: Option<f64>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    /// Read-through cache, valid for one library snapshot
    #[serde(skip)]
    pub normalized: Option<NormalizedFields>,
}

impl LibraryTrack {
    pub fn new(id: impl Into<String>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            ..Default::default()
        }
    }

    /// Cached normalized fields, or freshly computed ones when not cached.
    pub fn normalized(&self) -> Cow<'_, NormalizedFields> {
        match &self.normalized {
            Some(fields) => Cow::Borrowed(fields),
            None => Cow::Owned(NormalizedFields::compute(&self.title, &self.artist)),
        }
    }

    /// Fill the normalized cache, returning self for chaining.
    pub fn with_normalized(mut self) -> Self {
        self.normalized = Some(NormalizedFields::compute(&self.title, &self.artist));
        self
    }
}

/// Precompute normalized fields for every track of a library snapshot so
/// repeated searches skip the regex work.
pub fn precompute_normalized(library: &mut [LibraryTrack]) {
    for track in library.iter_mut() {
        if track.normalized.is_none() {
            track.normalized = Some(NormalizedFields::compute(&track.title, &track.artist));
        }
    }
}

// ============================================================================
// Match Models
// ============================================================================

/// Discretized match score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchConfidence {
    /// title > 0.75 and artist > 0.6
    High,
    /// title > 0.6 and artist > 0.4
    Medium,
    /// title > 0.5 and artist > 0.3; never chosen as the best match
    Low,
}

/// One library entry judged to be the recognized track.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub track: LibraryTrack,
    pub confidence: MatchConfidence,
    /// `title_score * title_weight + artist_score * artist_weight`
    pub score: f64,
    pub title_score: f64,
    pub artist_score: f64,
}

/// Whether a variation carries an explicit version keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariationKind {
    /// Title contains remix/edit/extended/...
    Variation,
    /// Matched on title and artist only
    Related,
}

/// A different version of the same underlying song.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationResult {
    pub track: LibraryTrack,
    #[serde(rename = "type")]
    pub kind: VariationKind,
    pub similarity: f64,
}

// ============================================================================
// Crate Models
// ============================================================================

/// A user-defined folder of tracks. Children are always known; membership may
/// have to be loaded on demand (`track_ids == None`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrateNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub children: Vec<CrateNode>,
    #[serde(default)]
    pub track_ids: Option<Vec<TrackId>>,
}

impl CrateNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_tracks<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TrackId>,
    {
        self.track_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_child(mut self, child: CrateNode) -> Self {
        self.children.push(child);
        self
    }
}

/// One crate (with breadcrumb path) containing the target track.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrateMembership {
    pub id: String,
    pub name: String,
    pub full_path: String,
}

// ============================================================================
// TESTS
// ============================================================================
