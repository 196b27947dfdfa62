use std::mem;

use tracing::error;

use crate::error::Result;
use crate::resource::Resource;
use crate::shim::Shim;

/// One unit of interest in a [`Shim`], released on drop.
#[must_use = "dropping the guard releases the hold immediately"]
pub struct ShimGuard<'a, R: Resource> {
    shim: &'a Shim<R>,
}

impl<'a, R: Resource> ShimGuard<'a, R> {
    pub(crate) fn new(shim: &'a Shim<R>) -> Self {
        ShimGuard { shim }
    }

    /// Release now and report the result instead of logging it.
    pub fn release(self) -> Result<()> {
        let shim = self.shim;
        mem::forget(self);
        shim.release()
    }
}

impl<R: Resource> Drop for ShimGuard<'_, R> {
    fn drop(&mut self) {
        if let Err(err) = self.shim.release() {
            error!(%err, "failed to release pinshim hold");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::resource::{self, Outcome};
    use crate::Shim;
    use std::io;

    fn noop_shim() -> Shim<impl crate::Resource> {
        Shim::new(resource::from_fn(|| Outcome::<io::Error>::Success, || {}))
    }

    #[test]
    fn drop_releases() {
        let shim = noop_shim();
        {
            let _a = shim.hold().unwrap();
            let _b = shim.hold().unwrap();
            assert_eq!(shim.count(), 2);
        }
        assert_eq!(shim.count(), 0);
    }

    #[test]
    fn explicit_release_releases_once() {
        let shim = noop_shim();
        let guard = shim.hold().unwrap();
        guard.release().unwrap();
        assert_eq!(shim.count(), 0);
    }
}
