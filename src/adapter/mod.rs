//! Pluggable network interception backends
//!
//! An adapter hooks the HTTP stack, blocks or allows real connections and
//! reports every observed interaction to a [`crate::Deck`]. The deck only
//! talks to adapters through [`StubbingAdapter`]; concrete backends are
//! picked by identifier through the [`AdapterRegistry`].

mod http;
mod offline;
mod registry;

pub use http::HyperAdapter;
pub use http::HYPER_VERSION;
pub use offline::OfflineAdapter;
pub use registry::{AdapterConstructor, AdapterRegistry};

use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

use crate::interaction::{host_of, is_localhost_alias};
use crate::{DeckError, Result};

/// Interface every interception backend implements
pub trait StubbingAdapter: Send + Sync + fmt::Debug {
    /// Identifier of the backing library
    fn library(&self) -> &str;

    /// Fail if the backing library version is unsupported
    ///
    /// # Errors
    ///
    /// Returns [`DeckError::IncompatibleAdapterVersion`] for unsupported versions
    fn check_version(&self) -> Result<()>;

    /// Allow or block real outbound connections
    fn set_connections_allowed(&self, allowed: bool);

    /// Whether real outbound connections are allowed
    fn connections_allowed(&self) -> bool;

    /// Exempt localhost from blocking and recording
    fn set_ignore_localhost(&self, ignore: bool);

    /// Whether localhost is exempt
    fn ignore_localhost(&self) -> bool;

    /// Whether a real request to `uri` may reach the network
    fn permits_real_request(&self, uri: &str) -> bool {
        if self.connections_allowed() {
            return true;
        }
        self.ignore_localhost() && host_of(uri).is_some_and(|host| is_localhost_alias(&host))
    }

    /// Fail unless a real request to `uri` may reach the network
    ///
    /// # Errors
    ///
    /// Returns [`DeckError::RealConnectionDisabled`] if the request is blocked
    fn ensure_real_request_permitted(&self, uri: &str) -> Result<()> {
        if self.permits_real_request(uri) {
            Ok(())
        } else {
            Err(DeckError::RealConnectionDisabled(uri.to_string()))
        }
    }
}

/// Connection flags shared by the bundled adapters
#[derive(Debug)]
pub struct AdapterState {
    connections_allowed: AtomicBool,
    ignore_localhost: AtomicBool,
}

impl AdapterState {
    /// Connections allowed, localhost not ignored
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections_allowed: AtomicBool::new(true),
            ignore_localhost: AtomicBool::new(false),
        }
    }

    /// Set the connections flag
    pub fn set_connections_allowed(&self, allowed: bool) {
        self.connections_allowed.store(allowed, Ordering::Release);
    }

    /// Get the connections flag
    #[must_use]
    pub fn connections_allowed(&self) -> bool {
        self.connections_allowed.load(Ordering::Acquire)
    }

    /// Set the localhost flag
    pub fn set_ignore_localhost(&self, ignore: bool) {
        self.ignore_localhost.store(ignore, Ordering::Release);
    }

    /// Get the localhost flag
    #[must_use]
    pub fn ignore_localhost(&self) -> bool {
        self.ignore_localhost.load(Ordering::Acquire)
    }
}

impl Default for AdapterState {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a successful [`VersionRequirement::check`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSupport {
    /// Within the tested range
    Tested,
    /// Newer than the highest tested `major.minor`; a warning was logged
    Untested,
}

/// Supported version range of a backing library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRequirement {
    /// Lowest supported version
    pub minimum: &'static str,
    /// Highest `major.minor` known to work
    pub maximum_tested: &'static str,
}

impl VersionRequirement {
    /// Check `version` of `library` against this requirement
    ///
    /// Versions newer than the tested range log a warning and report
    /// [`VersionSupport::Untested`].
    ///
    /// # Errors
    ///
    /// Returns [`DeckError::IncompatibleAdapterVersion`] if `version` is below
    /// the minimum or cannot be parsed
    pub fn check(&self, library: &str, version: &str) -> Result<VersionSupport> {
        let incompatible = || DeckError::IncompatibleAdapterVersion {
            library: library.to_string(),
            version: version.to_string(),
            requirement: self.to_string(),
        };

        let found = parse_version(version).ok_or_else(incompatible)?;
        let minimum = parse_version(self.minimum).ok_or_else(incompatible)?;
        let tested = parse_version(self.maximum_tested).ok_or_else(incompatible)?;

        if found.cmp(&minimum) == CmpOrdering::Less {
            return Err(incompatible());
        }

        if found[..2] > tested[..2] {
            warn!(
                "You are using {} {}. Tapedeck is only known to work with {}. It may not work with this version.",
                library, version, self
            );
            return Ok(VersionSupport::Untested);
        }

        Ok(VersionSupport::Tested)
    }
}

impl fmt::Display for VersionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ">= {}, <= {}.x", self.minimum, self.maximum_tested)
    }
}

/// Parse `major[.minor[.patch]]`, ignoring any `-pre` or `+build` suffix
fn parse_version(version: &str) -> Option<[u64; 3]> {
    let core = version
        .trim()
        .split(|c| c == '-' || c == '+')
        .next()
        .unwrap_or_default();

    let mut parts = [0u64; 3];
    let mut count = 0;
    for (slot, piece) in parts.iter_mut().zip(core.split('.')) {
        *slot = piece.parse().ok()?;
        count += 1;
    }

    if count == 0 || core.split('.').count() > 3 {
        return None;
    }

    Some(parts)
}
