use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::{Error, Result};

/// Lock-free reference counter.
///
/// Mutations never need the shim's locks. [`Counter::checked_add`] is the
/// one the keep-alive protocol uses: it never publishes a negative value.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicI64,
}

impl Counter {
    pub const fn new() -> Self {
        Counter {
            value: AtomicI64::new(0),
        }
    }

    /// Add `delta` unconditionally and return the new value.
    pub fn add(&self, delta: i64) -> i64 {
        self.value
            .fetch_add(delta, Ordering::SeqCst)
            .wrapping_add(delta)
    }

    /// Add `delta` unless the result would be negative or overflow.
    ///
    /// On rejection the stored value is left untouched.
    pub fn checked_add(&self, delta: i64) -> Result<i64> {
        let mut rejected = None;
        let result = self
            .value
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                match current.checked_add(delta) {
                    Some(next) if next >= 0 => Some(next),
                    Some(_) => {
                        rejected = Some(Error::NegativeCounter { current, delta });
                        None
                    }
                    None => {
                        rejected = Some(Error::CounterOverflow { current, delta });
                        None
                    }
                }
            });
        match result {
            Ok(previous) => Ok(previous + delta),
            Err(_) => Err(rejected.unwrap_or(Error::NegativeCounter { current: 0, delta })),
        }
    }

    /// Current value. Diagnostic only; the protocol never branches on a
    /// value read outside its locks.
    pub fn value(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }
}
