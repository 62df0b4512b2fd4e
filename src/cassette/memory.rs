//! In-memory cassette

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::interaction::Interaction;
use crate::{DeckError, Result};

use super::{validate_cassette_name, Cassette, CassetteFactory, CassetteOptions, RecordMode};

/// Cassette that keeps recorded interactions in memory
#[derive(Debug)]
pub struct MemoryCassette {
    name: String,
    options: CassetteOptions,
    interactions: Mutex<Vec<Interaction>>,
    ejected: AtomicBool,
}

impl MemoryCassette {
    /// Create an empty cassette
    ///
    /// # Errors
    ///
    /// Returns error if the name is invalid
    pub fn new(name: &str, options: CassetteOptions) -> Result<Self> {
        validate_cassette_name(name)?;

        Ok(Self {
            name: name.to_string(),
            options,
            interactions: Mutex::new(Vec::new()),
            ejected: AtomicBool::new(false),
        })
    }

    /// Options the cassette was inserted with
    #[must_use]
    pub fn options(&self) -> &CassetteOptions {
        &self.options
    }

    /// Snapshot of the recorded interactions
    #[must_use]
    pub fn interactions(&self) -> Vec<Interaction> {
        self.interactions.lock().clone()
    }

    /// Get interaction count
    #[must_use]
    pub fn interaction_count(&self) -> usize {
        self.interactions.lock().len()
    }

    /// Whether the cassette has been ejected
    #[must_use]
    pub fn is_ejected(&self) -> bool {
        self.ejected.load(Ordering::Acquire)
    }
}

impl Cassette for MemoryCassette {
    fn name(&self) -> &str {
        &self.name
    }

    fn record(&self, interaction: Interaction) -> Result<()> {
        if self.is_ejected() {
            return Err(DeckError::CassetteEjected(self.name.clone()));
        }

        if self.options.record_mode() == RecordMode::None {
            debug!(
                "Cassette '{}' does not record; dropped {}",
                self.name,
                interaction.uri()
            );
            return Ok(());
        }

        self.interactions.lock().push(interaction);
        Ok(())
    }

    fn eject(&self) -> Result<()> {
        if self.ejected.swap(true, Ordering::AcqRel) {
            return Err(DeckError::CassetteEjected(self.name.clone()));
        }

        debug!(
            "Cassette '{}' closed with {} interactions",
            self.name,
            self.interaction_count()
        );
        Ok(())
    }
}

/// Factory producing [`MemoryCassette`]s
///
/// Keeps a handle to every cassette it built so tests can inspect them after
/// they have been ejected.
#[derive(Debug, Default)]
pub struct MemoryCassetteFactory {
    created: Mutex<Vec<Arc<MemoryCassette>>>,
    created_count: AtomicUsize,
}

impl MemoryCassetteFactory {
    /// Create a new factory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every cassette built so far, oldest first
    #[must_use]
    pub fn created(&self) -> Vec<Arc<MemoryCassette>> {
        self.created.lock().clone()
    }

    /// Most recently built cassette with the given name
    #[must_use]
    pub fn last_named(&self, name: &str) -> Option<Arc<MemoryCassette>> {
        self.created
            .lock()
            .iter()
            .rev()
            .find(|cassette| cassette.name == name)
            .cloned()
    }

    /// Number of cassettes built
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.created_count.load(Ordering::Relaxed)
    }
}

impl CassetteFactory for MemoryCassetteFactory {
    fn create(&self, name: &str, options: &CassetteOptions) -> Result<Arc<dyn Cassette>> {
        let cassette = Arc::new(MemoryCassette::new(name, options.clone())?);

        self.created.lock().push(Arc::clone(&cassette));
        self.created_count.fetch_add(1, Ordering::Relaxed);

        Ok(cassette)
    }
}
