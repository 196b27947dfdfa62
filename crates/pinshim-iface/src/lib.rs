//! pinshim-iface: async wrappers around the blocking pinshim protocol.
//!
//! `Shim::acquire` can park the caller until a worker thread finishes
//! initializing its resource. Doing that on a tokio worker thread stalls
//! every task scheduled there, so [`AsyncShim`] moves each call onto the
//! blocking pool and hands back owned guards that can cross `.await` points
//! and task boundaries.
//!
//! # Quick Start
//!
//! ```ignore
//! use pinshim_iface::AsyncShim;
//! use pinshim_rt::Shim;
//!
//! let shim = AsyncShim::new(Shim::new(Apartment::new()));
//!
//! tokio::spawn(async move {
//!     let hold = shim.hold().await?;
//!     // use the apartment
//!     hold.release().await
//! });
//! ```

pub mod guard;

pub use guard::OwnedShimGuard;

use std::sync::Arc;

use pinshim_rt::{Error, Resource, Result, Shim};
use tokio::task;

/// Cloneable async handle to a shared [`Shim`].
pub struct AsyncShim<R: Resource> {
    shim: Arc<Shim<R>>,
}

impl<R: Resource> Clone for AsyncShim<R> {
    fn clone(&self) -> Self {
        AsyncShim {
            shim: Arc::clone(&self.shim),
        }
    }
}

impl<R: Resource> AsyncShim<R> {
    pub fn new(shim: Shim<R>) -> Self {
        Self::from_arc(Arc::new(shim))
    }

    pub fn from_arc(shim: Arc<Shim<R>>) -> Self {
        AsyncShim { shim }
    }

    /// The wrapped shim, for synchronous use and introspection.
    pub fn shim(&self) -> &Arc<Shim<R>> {
        &self.shim
    }

    /// Async [`Shim::acquire`].
    ///
    /// Cancel-safe for positive deltas: if this future is dropped while the
    /// blocking call is still running, the units it adds are released again
    /// once it finishes. Non-positive deltas never start a worker and run to
    /// completion whether or not the caller is still waiting.
    pub async fn acquire(&self, delta: i64) -> Result<()> {
        let shim = Arc::clone(&self.shim);
        if delta <= 0 {
            return blocking(move || shim.acquire(delta)).await;
        }
        let guard = blocking(move || {
            shim.acquire(delta)?;
            Ok(OwnedShimGuard::with_units(shim, delta))
        })
        .await?;
        guard.disarm();
        Ok(())
    }

    /// Async [`Shim::release`].
    pub async fn release(&self) -> Result<()> {
        self.acquire(-1).await
    }

    /// Acquire one unit and return a guard that owns its release.
    ///
    /// The guard is built on the blocking pool, so a hold whose caller gave
    /// up waiting is dropped (and released) there instead of leaking.
    pub async fn hold(&self) -> Result<OwnedShimGuard<R>> {
        let shim = Arc::clone(&self.shim);
        blocking(move || {
            shim.acquire(1)?;
            Ok(OwnedShimGuard::new(shim))
        })
        .await
    }
}

/// Run a shim call on the blocking pool.
///
/// If the awaiting future is dropped the call still runs to the end and its
/// output is dropped with the task.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    match task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(err) => {
            tracing::error!(%err, "pinshim blocking call did not complete");
            Err(Error::CallerLost)
        }
    }
}
