//! Adapter for clients built on `hyper`

use tracing::debug;

use crate::interaction::Interaction;
use crate::{Deck, Result};

use super::{AdapterState, StubbingAdapter, VersionRequirement};

/// Registry identifier
pub const LIBRARY: &str = "hyper";

/// `hyper` version resolved for this build
///
/// Read from the lockfile by the build script. Falls back to the manifest
/// requirement when no lockfile is found.
pub const HYPER_VERSION: &str = env!("TAPEDECK_HYPER_VERSION");

const SUPPORTED: VersionRequirement = VersionRequirement {
    minimum: "1.0.0",
    maximum_tested: "1.5",
};

/// Interception backend for `hyper` based HTTP clients
///
/// The client-side hook calls [`HyperAdapter::ensure_real_request_permitted`]
/// before dialing and [`HyperAdapter::observe`] once the response is complete.
#[derive(Debug)]
pub struct HyperAdapter {
    state: AdapterState,
    version: String,
}

impl HyperAdapter {
    /// Create an adapter for the `hyper` version compiled into this build
    #[must_use]
    pub fn new() -> Self {
        Self::with_version(HYPER_VERSION)
    }

    /// Create an adapter reporting a specific `hyper` version
    #[must_use]
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            state: AdapterState::new(),
            version: version.into(),
        }
    }

    /// Version reported by [`StubbingAdapter::check_version`]
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Report a completed exchange to `deck`
    ///
    /// # Errors
    ///
    /// Returns whatever [`Deck::record_interaction`] returns
    pub fn observe(
        &self,
        deck: &Deck,
        request: &hyper::Request<Vec<u8>>,
        response: &hyper::Response<Vec<u8>>,
    ) -> Result<()> {
        debug!(
            "Observed {} {} -> {}",
            request.method(),
            request.uri(),
            response.status()
        );
        deck.record_interaction(Interaction::from_http(request, response))
    }
}

impl Default for HyperAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl StubbingAdapter for HyperAdapter {
    fn library(&self) -> &str {
        LIBRARY
    }

    fn check_version(&self) -> Result<()> {
        SUPPORTED.check(LIBRARY, &self.version).map(|_| ())
    }

    fn set_connections_allowed(&self, allowed: bool) {
        self.state.set_connections_allowed(allowed);
    }

    fn connections_allowed(&self) -> bool {
        self.state.connections_allowed()
    }

    fn set_ignore_localhost(&self, ignore: bool) {
        self.state.set_ignore_localhost(ignore);
    }

    fn ignore_localhost(&self) -> bool {
        self.state.ignore_localhost()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::VersionSupport;
    use crate::DeckError;

    #[test]
    fn test_reports_compiled_version() {
        let adapter = HyperAdapter::new();
        assert_eq!(adapter.library(), "hyper");
        assert_eq!(adapter.version(), HYPER_VERSION);
        assert!(HYPER_VERSION.starts_with("1."));
        assert!(adapter.check_version().is_ok());
    }

    #[test]
    fn test_newer_than_tested_warns_but_passes() {
        let adapter = HyperAdapter::with_version("1.12.0");
        assert!(adapter.check_version().is_ok());
        assert!(matches!(
            SUPPORTED.check(LIBRARY, adapter.version()),
            Ok(VersionSupport::Untested)
        ));
        assert!(matches!(
            SUPPORTED.check(LIBRARY, "1.5.3"),
            Ok(VersionSupport::Tested)
        ));
    }

    #[test]
    fn test_old_version_rejected() {
        let adapter = HyperAdapter::with_version("0.14.28");
        assert!(matches!(
            adapter.check_version(),
            Err(DeckError::IncompatibleAdapterVersion { library, version, .. })
                if library == "hyper" && version == "0.14.28"
        ));
    }

    #[test]
    fn test_flags() {
        let adapter = HyperAdapter::new();
        assert!(adapter.connections_allowed());
        assert!(!adapter.ignore_localhost());

        adapter.set_connections_allowed(false);
        adapter.set_ignore_localhost(true);
        assert!(!adapter.connections_allowed());
        assert!(adapter.ignore_localhost());
    }
}
