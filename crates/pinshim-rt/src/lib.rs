//! pinshim-rt: keep a thread-affine resource alive while anyone needs it.
//!
//! A [`Shim`] owns one resource slot. Callers register interest with
//! [`Shim::acquire`] and drop it with [`Shim::release`]. While the count is
//! above zero a dedicated worker thread holds the resource initialized;
//! when the count returns to zero the worker tears it down on the same
//! thread it was initialized on, and the shim goes back to idle.
//!
//! ```text
//!  acquire(+1) ──► fast path (running) ──► counter += 1
//!        │
//!        └──────► slow path ──► spawn worker ──► initialize() ──► running
//!                                                      │
//!  release()   ──► counter -= 1 ──► 0? wake worker ────┘──► teardown()
//! ```
//!
//! The resource itself is opaque and reached only through the [`Resource`]
//! trait. A process-wide convenience lives in [`GlobalShim`], separate from
//! the core type.

mod config;
mod counter;
mod error;
mod global;
mod guard;
pub mod resource;
mod shim;
mod worker;

pub use config::ShimConfig;
pub use counter::Counter;
pub use error::{BoxError, Error, Result};
pub use global::GlobalShim;
pub use guard::ShimGuard;
pub use resource::{Outcome, Resource};
pub use shim::Shim;
