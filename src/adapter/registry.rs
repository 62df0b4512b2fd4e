//! Identifier to adapter resolution

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::{DeckError, Result};

use super::{HyperAdapter, OfflineAdapter, StubbingAdapter};

/// Builds the adapter for one identifier
pub type AdapterConstructor = Arc<dyn Fn() -> Arc<dyn StubbingAdapter> + Send + Sync>;

struct Resolved {
    library: String,
    adapter: Arc<dyn StubbingAdapter>,
}

/// Maps backend identifiers to adapter constructors and memoizes the
/// resolved adapter until [`AdapterRegistry::reset`]
pub struct AdapterRegistry {
    constructors: DashMap<String, AdapterConstructor>,
    resolved: RwLock<Option<Resolved>>,
    resolutions: AtomicUsize,
}

impl AdapterRegistry {
    /// Create a registry with no backends
    #[must_use]
    pub fn new() -> Self {
        Self {
            constructors: DashMap::new(),
            resolved: RwLock::new(None),
            resolutions: AtomicUsize::new(0),
        }
    }

    /// Create a registry with the bundled `hyper` and `offline` backends
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(super::http::LIBRARY, || {
            Arc::new(HyperAdapter::new()) as Arc<dyn StubbingAdapter>
        });
        registry.register(super::offline::LIBRARY, || {
            Arc::new(OfflineAdapter::new()) as Arc<dyn StubbingAdapter>
        });
        registry
    }

    /// Register (or replace) the constructor for `library`
    pub fn register<F>(&self, library: impl Into<String>, constructor: F)
    where
        F: Fn() -> Arc<dyn StubbingAdapter> + Send + Sync + 'static,
    {
        let library = library.into();
        debug!("Registered stubbing library '{}'", library);
        self.constructors.insert(library, Arc::new(constructor));
    }

    /// Registered identifiers, sorted
    #[must_use]
    pub fn accepted_libraries(&self) -> Vec<String> {
        let mut libraries: Vec<String> = self
            .constructors
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        libraries.sort();
        libraries
    }

    /// Return the memoized adapter, resolving `configured` on first use
    ///
    /// Once resolved, later calls ignore `configured` until [`Self::reset`].
    ///
    /// # Errors
    ///
    /// Returns [`DeckError::ConfigError`] if `configured` is unset or names no
    /// registered backend
    pub fn resolve(&self, configured: Option<&str>) -> Result<Arc<dyn StubbingAdapter>> {
        if let Some(resolved) = self.resolved.read().as_ref() {
            return Ok(Arc::clone(&resolved.adapter));
        }

        let library = configured.unwrap_or_default();
        let constructor = self
            .constructors
            .get(library)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| DeckError::ConfigError(self.not_configured_message(configured)))?;

        // Constructed outside the lock so constructors may consult the registry
        let adapter = constructor();

        let mut slot = self.resolved.write();
        let resolved = slot.get_or_insert_with(|| {
            self.resolutions.fetch_add(1, Ordering::Relaxed);
            info!("Resolved stubbing library '{}'", library);
            Resolved {
                library: library.to_string(),
                adapter,
            }
        });

        Ok(Arc::clone(&resolved.adapter))
    }

    /// Identifier of the memoized adapter, if any
    #[must_use]
    pub fn selected(&self) -> Option<String> {
        self.resolved
            .read()
            .as_ref()
            .map(|resolved| resolved.library.clone())
    }

    /// Number of successful resolutions since creation
    #[must_use]
    pub fn resolution_count(&self) -> usize {
        self.resolutions.load(Ordering::Relaxed)
    }

    /// Forget the memoized adapter and selected identifier
    pub fn reset(&self) {
        if let Some(previous) = self.resolved.write().take() {
            debug!("Reset stubbing library '{}'", previous.library);
        }
    }

    fn not_configured_message(&self, configured: Option<&str>) -> String {
        let accepted = self.accepted_libraries().join(", ");
        match configured {
            Some(library) => format!(
                "The HTTP stubbing library is not configured correctly ('{library}' is not registered). You should set it to one of: {accepted}."
            ),
            None => format!(
                "The HTTP stubbing library is not configured correctly. You should set it to one of: {accepted}."
            ),
        }
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("libraries", &self.accepted_libraries())
            .field("selected", &self.selected())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_registered() {
        let registry = AdapterRegistry::with_defaults();
        assert_eq!(registry.accepted_libraries(), vec!["hyper", "offline"]);
        assert!(registry.selected().is_none());
    }

    #[test]
    fn test_resolve_by_identifier() {
        for library in ["hyper", "offline"] {
            let registry = AdapterRegistry::with_defaults();
            let adapter = registry.resolve(Some(library)).unwrap();
            assert_eq!(adapter.library(), library);
            assert_eq!(registry.selected().as_deref(), Some(library));
        }
    }

    #[test]
    fn test_unset_library_is_config_error() {
        let registry = AdapterRegistry::with_defaults();
        let err = registry.resolve(None).unwrap_err();

        assert!(matches!(err, DeckError::ConfigError(_)));
        let message = err.to_string();
        assert!(message.contains("is not configured correctly"));
        assert!(message.contains("hyper, offline"));
    }

    #[test]
    fn test_unknown_library_is_config_error() {
        let registry = AdapterRegistry::with_defaults();
        let err = registry.resolve(Some("curl")).unwrap_err();

        let message = err.to_string();
        assert!(message.contains("'curl' is not registered"));
        assert!(message.contains("hyper, offline"));
        assert!(registry.selected().is_none());
    }

    #[test]
    fn test_resolution_is_memoized() {
        let registry = AdapterRegistry::with_defaults();
        let first = registry.resolve(Some("hyper")).unwrap();

        for _ in 0..10 {
            let again = registry.resolve(Some("hyper")).unwrap();
            assert!(Arc::ptr_eq(&first, &again));
        }

        // A different identifier is ignored until reset
        let still_hyper = registry.resolve(Some("offline")).unwrap();
        assert!(Arc::ptr_eq(&first, &still_hyper));
        assert_eq!(registry.resolution_count(), 1);
    }

    #[test]
    fn test_reset_allows_reresolution() {
        let registry = AdapterRegistry::with_defaults();
        registry.resolve(Some("hyper")).unwrap();

        registry.reset();
        assert!(registry.selected().is_none());
        assert!(registry.resolve(None).is_err());

        let adapter = registry.resolve(Some("offline")).unwrap();
        assert_eq!(adapter.library(), "offline");
        assert_eq!(registry.resolution_count(), 2);
    }

    #[test]
    fn test_custom_registration() {
        let registry = AdapterRegistry::new();
        assert!(registry.resolve(Some("offline")).is_err());

        let constructed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&constructed);
        registry.register("custom", move || {
            counter.fetch_add(1, Ordering::Relaxed);
            Arc::new(OfflineAdapter::new()) as Arc<dyn StubbingAdapter>
        });

        registry.resolve(Some("custom")).unwrap();
        registry.resolve(Some("custom")).unwrap();
        assert_eq!(constructed.load(Ordering::Relaxed), 1);
        assert_eq!(registry.accepted_libraries(), vec!["custom"]);
    }
}
