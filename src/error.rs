//! Error types
//!
//! Configuration problems are fatal before any remote call is made.
//! Record store failures are fatal while resolving cycles and are
//! downgraded to per-habit failures while creating occurrences.

use std::path::PathBuf;

use thiserror::Error;

/// Invalid or unreadable settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        /// Path that was being read
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The settings file could not be written back.
    #[error("Failed to write settings file {path}: {source}")]
    Write {
        /// Path that was being written
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The settings file is not valid TOML or does not match the schema.
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    /// Habits could not be rendered as TOML.
    #[error("Failed to serialize habits: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The settings file could not be edited in place.
    #[error("Failed to edit settings document: {0}")]
    Edit(#[from] toml_edit::TomlError),

    /// A required identifier is missing or blank.
    #[error("Missing required setting '{0}'")]
    Missing(&'static str),

    /// No cycle-start days were configured.
    #[error("Cycle dates cannot be empty")]
    EmptyCycleDates,

    /// A cycle-start day is outside 1..=28.
    #[error("Cycle date {0} is out of range (expected 1-28)")]
    CycleDateOutOfRange(u32),

    /// A frequency label was not recognized.
    #[error("Unknown habit frequency '{0}'")]
    UnknownFrequency(String),

    /// A weekday name was not recognized.
    #[error("Unknown weekday '{0}'")]
    UnknownWeekday(String),

    /// A habit is missing its id or name.
    #[error("Habit #{index} has an empty {field}")]
    InvalidHabit {
        /// Position of the habit in the settings file (1-indexed)
        index: usize,
        /// Name of the blank field
        field: &'static str,
    },
}

/// A failed call against the record store.
#[derive(Debug, Error)]
pub enum RecordStoreError {
    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },

    /// The response could not be interpreted.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The referenced record does not exist.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// The store refused the request.
    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// Fatal errors that abort a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Settings were invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Cycle ownership could not be determined.
    #[error("Failed to resolve cycle: {0}")]
    Store(#[from] RecordStoreError),
}
