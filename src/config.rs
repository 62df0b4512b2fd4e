//! Configuration types for Tapedeck

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::cassette::CassetteOptions;
use crate::{DeckError, Result};

/// Global configuration consulted by a [`crate::Deck`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Identifier of the interception backend, resolved lazily
    #[serde(default)]
    pub stubbing_library: Option<String>,
    /// Exempt localhost from blocking and recording
    #[serde(default)]
    pub ignore_localhost: bool,
    /// Directory cassette storage implementations write into
    #[serde(default = "default_cassette_library_dir")]
    pub cassette_library_dir: PathBuf,
    /// Options applied to every inserted cassette unless overridden
    #[serde(default)]
    pub default_cassette_options: CassetteOptions,
}

fn default_cassette_library_dir() -> PathBuf {
    PathBuf::from("fixtures/cassettes")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stubbing_library: None,
            ignore_localhost: false,
            cassette_library_dir: default_cassette_library_dir(),
            default_cassette_options: CassetteOptions::default(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, parsed or validated
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DeckError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| DeckError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// An unset `stubbing_library` is valid here; it only fails when the
    /// adapter is resolved.
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self
            .stubbing_library
            .as_deref()
            .is_some_and(|library| library.trim().is_empty())
        {
            return Err(DeckError::ConfigError(
                "stubbing_library cannot be empty".to_string(),
            ));
        }

        if self.cassette_library_dir.as_os_str().is_empty() {
            return Err(DeckError::ConfigError(
                "cassette_library_dir cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
