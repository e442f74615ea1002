//! Error types for the inference engine.
//!
//! Lookup misses (unknown food, allergen without issues) are deliberately
//! absent here: they degrade to zero contribution instead of failing.

use std::path::PathBuf;
use thiserror::Error;

/// Reference CSV could not be turned into tables. Fatal at startup.
#[derive(Error, Debug)]
pub enum DataLoadError {
    #[error("cannot read reference file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed reference file {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("reference file {} is missing required column '{column}'", path.display())]
    MissingColumn { path: PathBuf, column: &'static str },
}

/// Feedback persistence failed. Surfaced to the caller, never swallowed.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("feedback storage I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("feedback storage at {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration file problems.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Feedback rating outside the 1..=5 scale.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("rating must be between 1 and 5, got {0}")]
pub struct RatingError(pub u8);
