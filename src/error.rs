//! Error types for the paper sorter

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for paper sorter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the paper sorter
///
/// Only [`Error::InvalidDirectory`] and [`Error::Config`] abort a run; every per-file problem is
/// reported through [`ExtractError`], [`PlanConflict`] or [`ApplyError`] and
/// the batch continues.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not a directory: {path}")]
    InvalidDirectory { path: PathBuf },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),
}

/// Failure to derive an ordering key for a single file
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Cannot read metadata of {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unexpected filename format: {path}")]
    NoMatch { path: PathBuf },
}

/// Reason a computed step was dropped from a plan
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanConflict {
    #[error("{} already exists", target.display())]
    TargetExists { target: PathBuf },

    #[error("{} is already claimed by {}", target.display(), kept.display())]
    AmbiguousBase { target: PathBuf, kept: PathBuf },
}

/// Failure of a single physical rename
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("Failed to rename {} to {}: {source}", from.display(), to.display())]
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "{} appeared during the run; file left at {}",
        target.display(),
        stranded.display()
    )]
    RaceCollision { target: PathBuf, stranded: PathBuf },
}
