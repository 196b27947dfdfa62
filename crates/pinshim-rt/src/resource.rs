//! The seam between the shim and the thread-affine resource it keeps alive.

/// Result of a resource's initialize step.
#[derive(Debug)]
pub enum Outcome<E> {
    Success,
    /// Something else initialized the resource on this thread first. The
    /// resource still expects a matching teardown.
    AlreadyInitialized,
    Failure(E),
}

/// A resource that must be initialized and torn down on the same thread.
///
/// Both methods are only ever called on the shim's worker thread, and
/// `teardown` runs exactly once per `Success` or `AlreadyInitialized`.
pub trait Resource: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn initialize(&self) -> Outcome<Self::Error>;

    fn teardown(&self);
}

/// A [`Resource`] built from two closures.
pub struct FnResource<I, T> {
    init: I,
    teardown: T,
}

/// Build a resource from an initialize closure and a teardown closure.
///
/// ```
/// use pinshim_rt::resource::{self, Outcome};
///
/// let res = resource::from_fn(
///     || Outcome::<std::io::Error>::Success,
///     || {},
/// );
/// let shim = pinshim_rt::Shim::new(res);
/// shim.acquire(1).unwrap();
/// shim.release().unwrap();
/// ```
pub fn from_fn<I, T, E>(init: I, teardown: T) -> FnResource<I, T>
where
    I: Fn() -> Outcome<E> + Send + Sync + 'static,
    T: Fn() + Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    FnResource { init, teardown }
}

impl<I, T, E> Resource for FnResource<I, T>
where
    I: Fn() -> Outcome<E> + Send + Sync + 'static,
    T: Fn() + Send + Sync + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    type Error = E;

    fn initialize(&self) -> Outcome<E> {
        (self.init)()
    }

    fn teardown(&self) {
        (self.teardown)()
    }
}
