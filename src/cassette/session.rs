//! Guaranteed eject for scoped cassette sessions

use std::sync::Arc;

use tracing::{error, warn};

use crate::{DeckError, Result};

use super::{Cassette, CassetteStack};

/// Ejects the top cassette exactly once when the session ends
///
/// [`EjectGuard::finish`] ejects on the normal path. If the guard is dropped
/// without finishing (panic, cancelled future) the eject runs in `Drop`.
pub(crate) struct EjectGuard<'a> {
    stack: &'a CassetteStack,
    inserted: Arc<dyn Cassette>,
    armed: bool,
}

impl<'a> EjectGuard<'a> {
    pub(crate) fn new(stack: &'a CassetteStack, inserted: Arc<dyn Cassette>) -> Self {
        Self {
            stack,
            inserted,
            armed: true,
        }
    }

    /// Eject now and combine the outcome with the body's result
    ///
    /// A body error is returned as-is; an eject failure is only surfaced when
    /// the body succeeded.
    pub(crate) fn finish<T, E>(
        mut self,
        outcome: std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<DeckError>,
    {
        self.armed = false;
        match (outcome, self.eject()) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(eject_err)) => Err(E::from(eject_err)),
            (Err(body_err), Ok(())) => Err(body_err),
            (Err(body_err), Err(eject_err)) => {
                error!(
                    "Eject of cassette '{}' failed after session error: {}",
                    self.inserted.name(),
                    eject_err
                );
                Err(body_err)
            }
        }
    }

    fn eject(&self) -> Result<()> {
        if let Some(ejected) = self.stack.eject()? {
            if !Arc::ptr_eq(&ejected, &self.inserted) {
                warn!(
                    "Session for cassette '{}' ejected '{}' instead; the stack was left unbalanced",
                    self.inserted.name(),
                    ejected.name()
                );
            }
        }
        Ok(())
    }
}

impl Drop for EjectGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.armed = false;
            if let Err(e) = self.eject() {
                error!(
                    "Eject of cassette '{}' failed during unwind: {}",
                    self.inserted.name(),
                    e
                );
            }
        }
    }
}
