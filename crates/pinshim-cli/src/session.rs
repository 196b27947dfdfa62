//! Application object that keeps the apartment alive while it is open.

use std::sync::{Mutex, PoisonError};

use anyhow::{bail, Result};
use pinshim_rt::{Resource, Shim};
use tracing::{error, info};

/// Holds one unit of interest in a shim from `open` until `close` (or drop).
/// Safe to share between threads.
pub struct Session<'a, R: Resource> {
    shim: &'a Shim<R>,
    name: String,
    /// Uses so far; `None` once closed.
    state: Mutex<Option<u64>>,
}

impl<'a, R: Resource> Session<'a, R> {
    pub fn open(shim: &'a Shim<R>, name: impl Into<String>) -> pinshim_rt::Result<Self> {
        shim.acquire(1)?;
        let name = name.into();
        info!(session = %name, "session opened");
        Ok(Session {
            shim,
            name,
            state: Mutex::new(Some(0)),
        })
    }

    /// Do some work with the resource. Returns how many times this session
    /// has been used.
    pub fn touch(&self) -> Result<u64> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(uses) = state.as_mut() else {
            bail!("session {} is closed", self.name);
        };
        if !self.shim.is_running() {
            bail!("session {} has no live resource", self.name);
        }
        *uses += 1;
        Ok(*uses)
    }

    /// Release the hold. Closing twice is a no-op.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(uses) = state.take() else {
            return;
        };
        if let Err(err) = self.shim.release() {
            error!(session = %self.name, %err, "release failed on close");
            return;
        }
        info!(session = %self.name, uses, "session closed");
    }
}

impl<R: Resource> Drop for Session<'_, R> {
    fn drop(&mut self) {
        self.close();
    }
}
