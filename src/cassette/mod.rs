//! Cassettes and the stack that nests them

mod memory;
pub(crate) mod session;
mod stack;

pub use memory::{MemoryCassette, MemoryCassetteFactory};
pub use stack::CassetteStack;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::interaction::Interaction;
use crate::{DeckError, Result};

/// Maximum cassette name length
pub const MAX_NAME_LEN: usize = 255;

/// How a cassette treats interactions it has not seen before
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordMode {
    /// Record every interaction, replacing anything stored
    All,
    /// Never record
    None,
    /// Replay stored interactions and record new ones
    NewEpisodes,
    /// Record only if nothing has been stored yet
    Once,
}

impl Default for RecordMode {
    fn default() -> Self {
        Self::Once
    }
}

/// Options handed to the cassette factory on insert
///
/// Unset fields fall back to the configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CassetteOptions {
    /// Record mode
    #[serde(default)]
    pub record: Option<RecordMode>,
    /// Let unmatched requests through to the real network
    #[serde(default)]
    pub allow_real_http: Option<bool>,
}

impl CassetteOptions {
    /// Options with only the record mode set
    #[must_use]
    pub fn with_record(record: RecordMode) -> Self {
        Self {
            record: Some(record),
            ..Self::default()
        }
    }

    /// Fill every unset field from `defaults`
    #[must_use]
    pub fn merged_over(&self, defaults: &Self) -> Self {
        Self {
            record: self.record.or(defaults.record),
            allow_real_http: self.allow_real_http.or(defaults.allow_real_http),
        }
    }

    /// Effective record mode
    #[must_use]
    pub fn record_mode(&self) -> RecordMode {
        self.record.unwrap_or_default()
    }
}

/// A named recording session
pub trait Cassette: Send + Sync + fmt::Debug {
    /// Cassette name
    fn name(&self) -> &str;

    /// Capture one interaction
    ///
    /// # Errors
    ///
    /// Returns whatever the cassette's storage reports
    fn record(&self, interaction: Interaction) -> Result<()>;

    /// Close the cassette; it is never current again afterwards
    ///
    /// # Errors
    ///
    /// Returns whatever the cassette's storage reports
    fn eject(&self) -> Result<()>;
}

/// Builds cassettes for [`CassetteStack::insert`]
pub trait CassetteFactory: Send + Sync {
    /// Create a fresh cassette
    ///
    /// # Errors
    ///
    /// Returns error if the cassette cannot be created
    fn create(&self, name: &str, options: &CassetteOptions) -> Result<Arc<dyn Cassette>>;
}

impl<F> CassetteFactory for F
where
    F: Fn(&str, &CassetteOptions) -> Result<Arc<dyn Cassette>> + Send + Sync,
{
    fn create(&self, name: &str, options: &CassetteOptions) -> Result<Arc<dyn Cassette>> {
        self(name, options)
    }
}

/// Validate a cassette name
///
/// Names may contain `/` to group cassettes into subdirectories.
///
/// # Errors
///
/// Returns error if the name is empty, too long, absolute, or escapes the
/// cassette directory
pub fn validate_cassette_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DeckError::InvalidCassetteName(
            "Cassette name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(DeckError::InvalidCassetteName(format!(
            "Cassette name too long: {} > {MAX_NAME_LEN}",
            name.len()
        )));
    }

    if name.starts_with('/') || name.contains('\\') {
        return Err(DeckError::InvalidCassetteName(
            "Cassette name must be a relative path".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(DeckError::InvalidCassetteName(
            "Cassette name cannot contain null bytes".to_string(),
        ));
    }

    if name.split('/').any(|part| part == ".." || part.is_empty()) {
        return Err(DeckError::InvalidCassetteName(format!(
            "Cassette name has an invalid path segment: {name}"
        )));
    }

    Ok(())
}
