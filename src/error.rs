//! Error types for Tapedeck

use std::io;
use thiserror::Error;

/// Result type for Tapedeck operations
pub type Result<T> = std::result::Result<T, DeckError>;

/// Errors that can occur in Tapedeck
#[derive(Debug, Error)]
pub enum DeckError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The stubbing library in use is outside the supported version range
    #[error("You are using {library} {version}. Tapedeck requires version {requirement}.")]
    IncompatibleAdapterVersion {
        /// Library identifier
        library: String,
        /// Version reported by the library
        version: String,
        /// Human readable requirement, e.g. `>= 1.0.0`
        requirement: String,
    },

    /// Invalid cassette name
    #[error("Invalid cassette name: {0}")]
    InvalidCassetteName(String),

    /// Cassette was used after it was ejected
    #[error("Cassette '{0}' has already been ejected")]
    CassetteEjected(String),

    /// A real request was attempted while connections are disabled
    #[error("Real HTTP connections are disabled. Request to {0} was blocked.")]
    RealConnectionDisabled(String),

    /// Interaction could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for DeckError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
