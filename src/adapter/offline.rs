//! Adapter that intercepts nothing

use crate::Result;

use super::{AdapterState, StubbingAdapter};

/// Registry identifier
pub const LIBRARY: &str = "offline";

/// Backend for code paths with no HTTP client hook installed
///
/// Tracks the connection flags so callers can consult them, and accepts any
/// environment as compatible.
#[derive(Debug, Default)]
pub struct OfflineAdapter {
    state: AdapterState,
}

impl OfflineAdapter {
    /// Create a new offline adapter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StubbingAdapter for OfflineAdapter {
    fn library(&self) -> &str {
        LIBRARY
    }

    fn check_version(&self) -> Result<()> {
        Ok(())
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
