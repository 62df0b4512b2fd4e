//! The deck: cassette stack, adapter registry and recording gatekeeper
//!
//! A [`Deck`] owns all mutable state. Tests running in parallel each build
//! their own deck; [`Deck::reset`] restores a deck to its initial state
//! between runs.
//!
//! ```
//! use tapedeck::cassette::CassetteOptions;
//! use tapedeck::interaction::{Interaction, RecordedRequest, RecordedResponse};
//! use tapedeck::{Deck, DeckError};
//!
//! let deck = Deck::new();
//! deck.configure(|config| {
//!     config.stubbing_library = Some("offline".to_string());
//!     config.ignore_localhost = true;
//! })?;
//!
//! deck.with_cassette("users/list", CassetteOptions::default(), |_cassette| {
//!     deck.record_interaction(Interaction::new(
//!         RecordedRequest::get("http://example.com/users"),
//!         RecordedResponse::new(200),
//!     ))
//! })?;
//!
//! assert!(deck.current_cassette().is_none());
//! # Ok::<(), DeckError>(())
//! ```

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, trace};

use crate::adapter::{AdapterRegistry, StubbingAdapter};
use crate::cassette::session::EjectGuard;
use crate::cassette::{
    Cassette, CassetteFactory, CassetteOptions, CassetteStack, MemoryCassetteFactory,
};
use crate::config::Config;
use crate::interaction::Interaction;
use crate::sink::{DevelopmentLog, InteractionSink};
use crate::{DeckError, Result};

/// Recording context holding the cassette stack, adapter registry and
/// override sink
pub struct Deck {
    config: RwLock<Config>,
    stack: CassetteStack,
    registry: AdapterRegistry,
    override_sink: RwLock<Option<Arc<dyn InteractionSink>>>,
}

impl Deck {
    /// Create a deck with default config, bundled adapters and in-memory
    /// cassettes
    #[must_use]
    pub fn new() -> Self {
        Self::with_factory(Arc::new(MemoryCassetteFactory::new()))
    }

    /// Create a deck whose cassettes are built by `factory`
    #[must_use]
    pub fn with_factory(factory: Arc<dyn CassetteFactory>) -> Self {
        Self::with_parts(Config::default(), AdapterRegistry::with_defaults(), factory)
    }

    /// Create a deck from explicit parts
    #[must_use]
    pub fn with_parts(
        config: Config,
        registry: AdapterRegistry,
        factory: Arc<dyn CassetteFactory>,
    ) -> Self {
        Self {
            config: RwLock::new(config),
            stack: CassetteStack::new(factory),
            registry,
            override_sink: RwLock::new(None),
        }
    }

    /// Snapshot of the current configuration
    #[must_use]
    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    /// Adapter registry, for registering additional backends
    #[must_use]
    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Cassette stack
    #[must_use]
    pub fn stack(&self) -> &CassetteStack {
        &self.stack
    }

    /// Mutate the configuration, then apply it to the adapter
    ///
    /// `configurator` works on a copy; no lock is held while it runs.
    ///
    /// # Errors
    ///
    /// Returns error if the adapter cannot be resolved or its version is
    /// incompatible
    pub fn configure<F>(&self, configurator: F) -> Result<()>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = self.config();
        configurator(&mut config);
        *self.config.write() = config;

        self.apply_global_config()
    }

    /// Push the configuration into the resolved adapter
    ///
    /// Checks the adapter version, disables real connections, then applies
    /// the localhost setting, in that order.
    ///
    /// # Errors
    ///
    /// Returns error if the adapter cannot be resolved or its version is
    /// incompatible
    pub fn apply_global_config(&self) -> Result<()> {
        let ignore_localhost = self.config.read().ignore_localhost;
        let adapter = self.adapter()?;

        adapter.check_version()?;
        adapter.set_connections_allowed(false);
        adapter.set_ignore_localhost(ignore_localhost);

        info!(
            "Configured stubbing library '{}' (ignore_localhost: {})",
            adapter.library(),
            ignore_localhost
        );
        Ok(())
    }

    /// The adapter selected by configuration, resolved once and memoized
    ///
    /// # Errors
    ///
    /// Returns [`DeckError::ConfigError`] if no registered backend is configured
    pub fn adapter(&self) -> Result<Arc<dyn StubbingAdapter>> {
        let library = self.config.read().stubbing_library.clone();
        self.registry.resolve(library.as_deref())
    }

    /// Insert a new cassette and make it current
    ///
    /// Unset `options` fields take the configured defaults.
    ///
    /// # Errors
    ///
    /// Returns the cassette factory's error
    pub fn insert_cassette(
        &self,
        name: &str,
        options: CassetteOptions,
    ) -> Result<Arc<dyn Cassette>> {
        let options = options.merged_over(&self.config.read().default_cassette_options);
        self.stack.insert(name, &options)
    }

    /// The cassette interactions are currently recorded into
    #[must_use]
    pub fn current_cassette(&self) -> Option<Arc<dyn Cassette>> {
        self.stack.current()
    }

    /// Eject the current cassette; `None` if no cassette is inserted
    ///
    /// # Errors
    ///
    /// Returns the cassette's eject error
    pub fn eject_cassette(&self) -> Result<Option<Arc<dyn Cassette>>> {
        self.stack.eject()
    }

    /// Run `body` with a freshly inserted cassette, ejecting it afterwards
    ///
    /// The eject runs exactly once when the insert succeeded, whether `body`
    /// returns `Ok`, `Err` or panics. A failed insert returns before `body`
    /// runs and ejects nothing. If both `body` and the eject fail, the body's
    /// error is returned and the eject error is logged.
    ///
    /// # Errors
    ///
    /// Returns the insert error, the body error, or the eject error, in that
    /// order of precedence
    pub fn with_cassette<T, E, F>(
        &self,
        name: &str,
        options: CassetteOptions,
        body: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(&Arc<dyn Cassette>) -> std::result::Result<T, E>,
        E: From<DeckError>,
    {
        let cassette = self.insert_cassette(name, options)?;
        let guard = EjectGuard::new(&self.stack, Arc::clone(&cassette));

        let outcome = body(&cassette);
        guard.finish(outcome)
    }

    /// Async form of [`Deck::with_cassette`]
    ///
    /// Dropping the returned future before it completes still ejects.
    ///
    /// # Errors
    ///
    /// Same as [`Deck::with_cassette`]
    pub async fn with_cassette_async<T, E, F, Fut>(
        &self,
        name: &str,
        options: CassetteOptions,
        body: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(Arc<dyn Cassette>) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<DeckError>,
    {
        let cassette = self.insert_cassette(name, options)?;
        let guard = EjectGuard::new(&self.stack, Arc::clone(&cassette));

        let outcome = body(cassette).await;
        guard.finish(outcome)
    }

    /// Route one observed interaction
    ///
    /// First match wins:
    /// 1. an installed override sink receives it;
    /// 2. with no cassette inserted it is dropped;
    /// 3. with localhost ignored, requests to a localhost alias are dropped;
    /// 4. otherwise the current cassette records it.
    ///
    /// # Errors
    ///
    /// Returns the sink or cassette error, or a resolution error if the
    /// adapter has to be resolved for the localhost check
    pub fn record_interaction(&self, interaction: Interaction) -> Result<()> {
        let sink = self.override_sink.read().clone();
        if let Some(sink) = sink {
            trace!("Override sink captured {}", interaction.uri());
            return sink.log(interaction);
        }

        let Some(cassette) = self.stack.current() else {
            trace!("No cassette inserted; dropped {}", interaction.uri());
            return Ok(());
        };

        if self.adapter()?.ignore_localhost() && interaction.targets_localhost() {
            trace!("Ignoring localhost request {}", interaction.uri());
            return Ok(());
        }

        trace!(
            "Recording {} into cassette '{}'",
            interaction.uri(),
            cassette.name()
        );
        cassette.record(interaction)
    }

    /// Send every interaction to a development log in `dir`
    ///
    /// Returns the path of the new log file.
    ///
    /// # Errors
    ///
    /// Returns error if the log file cannot be created
    pub fn enable_override_logging(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let log = DevelopmentLog::create(dir)?;
        let path = log.path().to_path_buf();
        self.install_override_sink(Arc::new(log));
        Ok(path)
    }

    /// Send every interaction to `sink`, bypassing the cassette stack
    pub fn install_override_sink(&self, sink: Arc<dyn InteractionSink>) {
        debug!("Installed override sink {:?}", sink);
        *self.override_sink.write() = Some(sink);
    }

    /// Remove the override sink, returning it
    pub fn disable_override_logging(&self) -> Option<Arc<dyn InteractionSink>> {
        let previous = self.override_sink.write().take();
        if previous.is_some() {
            debug!("Removed override sink");
        }
        previous
    }

    /// Whether an override sink is installed
    #[must_use]
    pub fn override_active(&self) -> bool {
        self.override_sink.read().is_some()
    }

    /// Restore the initial state: empty stack, unresolved adapter, no override
    /// sink, default configuration
    ///
    /// Discarded cassettes are not ejected.
    pub fn reset(&self) {
        let discarded = self.stack.clear();
        self.registry.reset();
        *self.override_sink.write() = None;
        *self.config.write() = Config::default();
        debug!("Deck reset ({} cassettes discarded)", discarded);
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Deck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deck")
            .field("config", &*self.config.read())
            .field("stack", &self.stack)
            .field("registry", &self.registry)
            .field("override_active", &self.override_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{RecordedRequest, RecordedResponse};
    use parking_lot::Mutex;

    fn interaction(uri: &str) -> Interaction {
        Interaction::new(RecordedRequest::get(uri), RecordedResponse::new(200))
    }

    fn offline_deck(factory: &Arc<MemoryCassetteFactory>) -> Deck {
        let deck = Deck::with_factory(Arc::clone(factory) as Arc<dyn CassetteFactory>);
        deck.configure(|config| config.stubbing_library = Some("offline".to_string()))
            .unwrap();
        deck
    }

    #[derive(Debug, Default)]
    struct CollectingSink {
        seen: Mutex<Vec<Interaction>>,
    }

    impl InteractionSink for CollectingSink {
        fn log(&self, interaction: Interaction) -> Result<()> {
            self.seen.lock().push(interaction);
            Ok(())
        }
    }

    #[test]
    fn test_insert_merges_default_options() {
        let factory = Arc::new(MemoryCassetteFactory::new());
        let deck = offline_deck(&factory);
        deck.configure(|config| {
            config.default_cassette_options =
                CassetteOptions::with_record(crate::cassette::RecordMode::NewEpisodes);
        })
        .unwrap();

        deck.insert_cassette("a", CassetteOptions::default()).unwrap();

        let cassette = factory.last_named("a").unwrap();
        assert_eq!(
            cassette.options().record,
            Some(crate::cassette::RecordMode::NewEpisodes)
        );
    }

    #[test]
    fn test_configure_runs_on_a_copy() {
        let deck = Deck::new();
        deck.configure(|config| {
            config.stubbing_library = Some("offline".to_string());
            config.ignore_localhost = true;
        })
        .unwrap();

        let adapter = deck.adapter().unwrap();
        assert!(adapter.ignore_localhost());
        assert!(!adapter.connections_allowed());
        assert!(deck.config().ignore_localhost);
    }

    #[test]
    fn test_configure_without_library_fails_at_resolution() {
        let deck = Deck::new();
        let err = deck.configure(|config| config.ignore_localhost = true).unwrap_err();

        assert!(err.to_string().contains("is not configured correctly"));
        // The configuration itself was still stored
        assert!(deck.config().ignore_localhost);
    }

    #[test]
    fn test_gatekeeper_records_into_current() {
        let factory = Arc::new(MemoryCassetteFactory::new());
        let deck = offline_deck(&factory);

        deck.insert_cassette("outer", CassetteOptions::default()).unwrap();
        deck.insert_cassette("inner", CassetteOptions::default()).unwrap();
        deck.record_interaction(interaction("http://example.com/")).unwrap();

        assert_eq!(factory.last_named("inner").unwrap().interaction_count(), 1);
        assert_eq!(factory.last_named("outer").unwrap().interaction_count(), 0);
    }

    #[test]
    fn test_gatekeeper_without_cassette_skips_resolution() {
        let deck = Deck::new();
        // No library configured: resolution would fail, but is never reached
        assert!(deck.record_interaction(interaction("http://example.com/")).is_ok());
    }

    #[test]
    fn test_gatekeeper_needs_adapter_with_cassette() {
        let deck = Deck::new();
        deck.insert_cassette("a", CassetteOptions::default()).unwrap();

        let err = deck
            .record_interaction(interaction("http://example.com/"))
            .unwrap_err();
        assert!(matches!(err, DeckError::ConfigError(_)));
    }

    #[test]
    fn test_override_sink_preempts_stack() {
        let factory = Arc::new(MemoryCassetteFactory::new());
        let deck = offline_deck(&factory);
        let sink = Arc::new(CollectingSink::default());

        deck.insert_cassette("a", CassetteOptions::default()).unwrap();
        deck.install_override_sink(Arc::clone(&sink) as Arc<dyn InteractionSink>);
        assert!(deck.override_active());

        deck.record_interaction(interaction("http://example.com/")).unwrap();
        deck.record_interaction(interaction("http://localhost/")).unwrap();

        assert_eq!(sink.seen.lock().len(), 2);
        assert_eq!(factory.last_named("a").unwrap().interaction_count(), 0);

        assert!(deck.disable_override_logging().is_some());
        deck.record_interaction(interaction("http://example.com/")).unwrap();
        assert_eq!(factory.last_named("a").unwrap().interaction_count(), 1);
    }

    #[test]
    fn test_override_sink_without_cassette_or_adapter() {
        let deck = Deck::new();
        let sink = Arc::new(CollectingSink::default());
        deck.install_override_sink(Arc::clone(&sink) as Arc<dyn InteractionSink>);

        deck.record_interaction(interaction("http://example.com/")).unwrap();
        assert_eq!(sink.seen.lock().len(), 1);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let factory = Arc::new(MemoryCassetteFactory::new());
        let deck = offline_deck(&factory);
        deck.insert_cassette("a", CassetteOptions::default()).unwrap();
        deck.install_override_sink(Arc::new(CollectingSink::default()));

        deck.reset();

        assert!(deck.current_cassette().is_none());
        assert!(!deck.override_active());
        assert!(deck.registry().selected().is_none());
        assert_eq!(deck.config(), Config::default());
        // Discarded, not ejected
        assert!(!factory.last_named("a").unwrap().is_ejected());
    }
}
