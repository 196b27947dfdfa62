//! Owned hold on a shared shim.

use std::sync::Arc;

use pinshim_rt::{Resource, Result, Shim};

use crate::blocking;

/// Units of interest in an `Arc<Shim>`, `Send + 'static`.
///
/// Dropping the guard releases synchronously. A release only ever waits
/// for the shim's lock, never for teardown, so dropping inside a task is
/// fine; use [`OwnedShimGuard::release`] to get the error back.
#[must_use = "dropping the guard releases the hold immediately"]
pub struct OwnedShimGuard<R: Resource> {
    /// `None` once released or disarmed.
    shim: Option<Arc<Shim<R>>>,
    units: i64,
}

impl<R: Resource> OwnedShimGuard<R> {
    pub(crate) fn new(shim: Arc<Shim<R>>) -> Self {
        Self::with_units(shim, 1)
    }

    pub(crate) fn with_units(shim: Arc<Shim<R>>, units: i64) -> Self {
        OwnedShimGuard {
            shim: Some(shim),
            units,
        }
    }

    /// Hand the units over to the caller without releasing them.
    pub(crate) fn disarm(mut self) {
        self.shim = None;
    }

    /// Release on the blocking pool and report the result.
    pub async fn release(mut self) -> Result<()> {
        let units = self.units;
        match self.shim.take() {
            Some(shim) => blocking(move || shim.acquire(-units)).await,
            None => Ok(()),
        }
    }
}

impl<R: Resource> Drop for OwnedShimGuard<R> {
    fn drop(&mut self) {
        if let Some(shim) = self.shim.take() {
            if let Err(err) = shim.acquire(-self.units) {
                tracing::error!(%err, units = self.units, "failed to release pinshim hold");
            }
        }
    }
}
