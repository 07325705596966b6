//! Error types for the kinetic_core library.
//!
//! The simulation engines themselves never fail on missing-but-expected data;
//! these variants cover configuration, reference data and file adapters.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for kinetic_core operations
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

    /// Reference snapshot validation error
    #[error("Reference data error: {0}")]
    Reference(String),

    /// A substance name or id could not be resolved against the reference data
    #[error("Unknown substance: {0}")]
    UnknownSubstance(String),

    /// Biomarker tag not recognised
    #[error("Unknown biomarker: {0}")]
    UnknownBiomarker(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
