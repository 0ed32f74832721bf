//! Error types for the cadence_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for cadence_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Program failed validation (empty, zero-length phase, stale total)
    #[error("Invalid program: {0}")]
    InvalidProgram(String),

    /// No program with the given id in the library or presets
    #[error("Program not found: {0}")]
    ProgramNotFound(String),

    /// Operation requires a signed-in user
    #[error("No user identity configured")]
    NotSignedIn,

    /// Program library persistence error
    #[error("Store error: {0}")]
    Store(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
