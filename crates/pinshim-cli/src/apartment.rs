//! A simulated thread-affine resource.
//!
//! Behaves like a COM apartment: every thread keeps its own init depth,
//! initializing an already-initialized thread reports a conflict but still
//! needs a matching teardown.

use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

use pinshim_rt::{Outcome, Resource};
use thiserror::Error;

thread_local! {
    static DEPTH: Cell<u32> = const { Cell::new(0) };
}

#[derive(Debug, Error)]
pub enum ApartmentError {
    #[error("apartment subsystem unavailable")]
    Unavailable,
}

#[derive(Debug, Default)]
pub struct Apartment {
    inits: AtomicUsize,
    teardowns: AtomicUsize,
    unavailable: bool,
}

impl Apartment {
    pub fn new() -> Self {
        Self::default()
    }

    /// An apartment whose initialize always fails.
    pub fn unavailable() -> Self {
        Apartment {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }

    /// Init depth of the calling thread.
    pub fn depth_here() -> u32 {
        DEPTH.with(Cell::get)
    }

    /// Initialize the calling thread directly, outside any shim.
    pub fn enter_here() {
        DEPTH.with(|depth| depth.set(depth.get() + 1));
    }

    pub fn leave_here() {
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

impl Resource for Apartment {
    type Error = ApartmentError;

    fn initialize(&self) -> Outcome<ApartmentError> {
        if self.unavailable {
            return Outcome::Failure(ApartmentError::Unavailable);
        }
        self.inits.fetch_add(1, Ordering::SeqCst);
        let previous = Self::depth_here();
        Self::enter_here();
        if previous > 0 {
            Outcome::AlreadyInitialized
        } else {
            Outcome::Success
        }
    }

    fn teardown(&self) {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        Self::leave_here();
    }
}
