use std::sync::OnceLock;

use crate::config::ShimConfig;
use crate::error::Result;
use crate::guard::ShimGuard;
use crate::resource::Resource;
use crate::shim::Shim;

/// A lazily constructed, process-wide [`Shim`] that can live in a `static`.
///
/// ```ignore
/// static APARTMENT: GlobalShim<Apartment> = GlobalShim::new(Apartment::new);
///
/// fn open() -> pinshim_rt::Result<()> {
///     APARTMENT.acquire(1)
/// }
/// ```
pub struct GlobalShim<R: Resource> {
    shim: OnceLock<Shim<R>>,
    resource: fn() -> R,
    config: fn() -> ShimConfig,
}

impl<R: Resource> GlobalShim<R> {
    pub const fn new(resource: fn() -> R) -> Self {
        Self::with_config(resource, ShimConfig::default)
    }

    pub const fn with_config(resource: fn() -> R, config: fn() -> ShimConfig) -> Self {
        GlobalShim {
            shim: OnceLock::new(),
            resource,
            config,
        }
    }

    /// The underlying shim, built on first use.
    pub fn get(&self) -> &Shim<R> {
        self.shim
            .get_or_init(|| Shim::with_config((self.resource)(), (self.config)()))
    }

    pub fn acquire(&self, delta: i64) -> Result<()> {
        self.get().acquire(delta)
    }

    pub fn release(&self) -> Result<()> {
        self.get().release()
    }

    pub fn hold(&self) -> Result<ShimGuard<'_, R>> {
        self.get().hold()
    }

    pub fn count(&self) -> i64 {
        self.get().count()
    }

    pub fn is_running(&self) -> bool {
        self.get().is_running()
    }
}
