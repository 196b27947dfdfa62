use thiserror::Error;

/// Boxed failure reported by a resource's initialize step.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    /// An acquire/release sequence would drive the counter below zero.
    /// Unbalanced pairing on the caller's side.
    #[error("counter would go negative ({current} {delta:+})")]
    NegativeCounter { current: i64, delta: i64 },

    #[error("counter would overflow ({current} {delta:+})")]
    CounterOverflow { current: i64, delta: i64 },

    /// The worker thread was already initialized by someone outside the
    /// shim. The compensating teardown has run and the shim is idle.
    #[error("resource already initialized on the worker thread")]
    AlreadyInitialized,

    #[error("resource failed to initialize: {0}")]
    Initialize(#[source] BoxError),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The worker exited without reporting an initialization outcome.
    #[error("worker exited before reporting")]
    WorkerLost,

    /// The caller-side task driving a shim call panicked or was cancelled
    /// before it finished. The worker itself is unaffected.
    #[error("caller task running the shim call did not complete")]
    CallerLost,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
