//! Track identification: match a recognized (title, artist) pair against a
//! local DJ library, find other versions of the song and the crates it lives in.

pub mod config;
pub mod crates;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod prefilter;
pub mod progress;
pub mod safety;
pub mod scoring;
pub mod variations;

pub use config::MatchConfig;
pub use crates::{find_track_crates, CrateLoader, JsonDirCrateLoader};
pub use engine::{identify, IdentificationReport};
pub use error::MatchError;
pub use matcher::{find_matches, get_best_match};
pub use models::{
    CrateMembership, CrateNode, LibraryTrack, MatchConfidence, MatchResult, RecognizedTrack,
    VariationKind, VariationResult,
};
pub use variations::find_variations;
