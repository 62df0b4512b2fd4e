//! LIFO stack of active cassettes

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::Result;

use super::{Cassette, CassetteFactory, CassetteOptions};

/// Stack of inserted cassettes; the top is the current one
///
/// The lock is never held while a factory or cassette hook runs, so hooks may
/// re-enter the stack.
pub struct CassetteStack {
    cassettes: Mutex<Vec<Arc<dyn Cassette>>>,
    factory: Arc<dyn CassetteFactory>,
}

impl CassetteStack {
    /// Create an empty stack that builds cassettes with `factory`
    #[must_use]
    pub fn new(factory: Arc<dyn CassetteFactory>) -> Self {
        Self {
            cassettes: Mutex::new(Vec::new()),
            factory,
        }
    }

    /// Build a new cassette and make it current
    ///
    /// Every call pushes a distinct instance, even for a repeated name.
    ///
    /// # Errors
    ///
    /// Returns the factory's error; nothing is pushed in that case
    pub fn insert(&self, name: &str, options: &CassetteOptions) -> Result<Arc<dyn Cassette>> {
        let cassette = self.factory.create(name, options)?;

        let depth = {
            let mut cassettes = self.cassettes.lock();
            cassettes.push(Arc::clone(&cassette));
            cassettes.len()
        };

        info!("Inserted cassette '{}' (depth: {})", name, depth);
        Ok(cassette)
    }

    /// The most recently inserted cassette that has not been ejected
    #[must_use]
    pub fn current(&self) -> Option<Arc<dyn Cassette>> {
        self.cassettes.lock().last().cloned()
    }

    /// Pop the current cassette and run its eject hook
    ///
    /// An empty stack is a no-op returning `None`.
    ///
    /// # Errors
    ///
    /// Returns the eject hook's error; the cassette stays popped
    pub fn eject(&self) -> Result<Option<Arc<dyn Cassette>>> {
        let Some(cassette) = self.cassettes.lock().pop() else {
            debug!("Eject on empty cassette stack");
            return Ok(None);
        };

        cassette.eject()?;

        info!(
            "Ejected cassette '{}' (depth: {})",
            cassette.name(),
            self.depth()
        );
        Ok(Some(cassette))
    }

    /// Number of active cassettes
    #[must_use]
    pub fn depth(&self) -> usize {
        self.cassettes.lock().len()
    }

    /// Whether no cassette is active
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cassettes.lock().is_empty()
    }

    /// Drop every cassette without running eject hooks
    ///
    /// Returns how many cassettes were discarded.
    pub fn clear(&self) -> usize {
        let discarded = std::mem::take(&mut *self.cassettes.lock());
        if !discarded.is_empty() {
            debug!("Discarded {} cassettes without ejecting", discarded.len());
        }
        discarded.len()
    }
}

impl fmt::Debug for CassetteStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .cassettes
            .lock()
            .iter()
            .map(|cassette| cassette.name().to_string())
            .collect();
        f.debug_struct("CassetteStack")
            .field("cassettes", &names)
            .finish_non_exhaustive()
    }
}
