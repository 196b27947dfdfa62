//! The worker thread: owns every initialize/teardown call.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::Sender;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::resource::{Outcome, Resource};
use crate::shim::Inner;

/// Spawn a worker. Its first message on `report` is the initialization
/// outcome; after a successful report it stays parked until the count
/// drains.
pub(crate) fn spawn<R: Resource>(
    inner: Arc<Inner<R>>,
    report: Sender<Result<()>>,
) -> Result<JoinHandle<()>> {
    let mut builder = thread::Builder::new().name(inner.config.thread_name.clone());
    if let Some(bytes) = inner.config.stack_size {
        builder = builder.stack_size(bytes);
    }
    builder
        .spawn(move || run(&inner, report))
        .map_err(Error::Spawn)
}

fn run<R: Resource>(inner: &Inner<R>, report: Sender<Result<()>>) {
    match inner.resource.initialize() {
        Outcome::Success => {}
        Outcome::AlreadyInitialized => {
            // The resource counts this call too; balance it before bailing.
            warn!("resource already initialized on worker thread");
            inner.resource.teardown();
            let _ = report.send(Err(Error::AlreadyInitialized));
            return;
        }
        Outcome::Failure(err) => {
            let _ = report.send(Err(Error::Initialize(Box::new(err))));
            return;
        }
    }

    if report.send(Ok(())).is_err() {
        // Nobody is waiting to mark us running.
        inner.resource.teardown();
        return;
    }
    debug!("resource initialized");

    hold(inner);
}

/// Keep the resource alive until the count drains, then tear it down.
fn hold<R: Resource>(inner: &Inner<R>) {
    loop {
        inner.wait_drained();

        // Confirm under the exclusive lock: an acquire may have slipped in
        // on the fast path between the wake-up and here.
        let mut state = inner.write_state();
        if !inner.is_drained() {
            continue;
        }
        state.running = false;
        inner.resource.teardown();
        drop(state);

        debug!("resource torn down, worker exiting");
        return;
    }
}
