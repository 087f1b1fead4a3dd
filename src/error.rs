//! Errors surfaced by the matching engine.
//!
//! The pure stages never fail on bad input; only cancellation and a crashed
//! worker task reach the caller. Collaborator I/O failures stay `anyhow::Error`
//! at the `CrateLoader` seam and are logged, not propagated.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchError {
    /// The caller abandoned the identification run
    #[error("identification cancelled")]
    Cancelled,

    /// The blocking matching task panicked or was aborted
    #[error("matching task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, MatchError>;
