use std::sync::{
    Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::thread::JoinHandle;

use crossbeam::channel;
use tracing::{debug, warn};

use crate::config::ShimConfig;
use crate::counter::Counter;
use crate::error::{Error, Result};
use crate::guard::ShimGuard;
use crate::resource::Resource;
use crate::worker;

/// Keeps one thread-affine resource initialized while its count is above
/// zero.
///
/// The count works like a wait group: every successful `acquire(n)` must be
/// balanced by releases totalling `n`. The first acquire from idle starts a
/// worker thread and blocks until the resource's initialize step has run on
/// it; the release that brings the count back to zero lets the worker tear
/// the resource down on that same thread.
pub struct Shim<R: Resource> {
    inner: Arc<Inner<R>>,
}

/// State shared between the shim handle and its worker thread.
pub(crate) struct Inner<R> {
    pub(crate) resource: R,
    pub(crate) config: ShimConfig,
    counter: Counter,
    /// Guards `running` and the start/stop protocol.
    state: RwLock<State>,
    /// Monitor the worker parks on while the count is positive.
    drained: Mutex<()>,
    wake: Condvar,
}

pub(crate) struct State {
    pub(crate) running: bool,
    /// Last worker spawned. Joined before the next one starts so that at
    /// most one worker thread exists at a time.
    worker: Option<JoinHandle<()>>,
}

impl<R: Resource> Shim<R> {
    pub fn new(resource: R) -> Self {
        Self::with_config(resource, ShimConfig::default())
    }

    pub fn with_config(resource: R, config: ShimConfig) -> Self {
        Shim {
            inner: Arc::new(Inner {
                resource,
                config,
                counter: Counter::new(),
                state: RwLock::new(State {
                    running: false,
                    worker: None,
                }),
                drained: Mutex::new(()),
                wake: Condvar::new(),
            }),
        }
    }

    /// Add `delta` (which may be negative) to the count. If the resource is
    /// not live and the count ends up positive, start a worker and wait for
    /// the resource to initialize before returning.
    pub fn acquire(&self, delta: i64) -> Result<()> {
        {
            let state = self.inner.read_state();
            if state.running {
                self.inner.add(delta)?;
                return Ok(());
            }
        }

        // Not running: start/stop decisions need the exclusive lock.
        let mut state = self.inner.write_state();
        let value = self.inner.add(delta)?;
        if state.running {
            // Started by someone else between the two locks.
            return Ok(());
        }
        if value == 0 {
            return Ok(());
        }

        match self.start(&mut state) {
            Ok(()) => {
                state.running = true;
                Ok(())
            }
            Err(err) => {
                // The count never backed a live resource; undo it so the
                // shim stays idle.
                self.inner.counter.add(-delta);
                Err(err)
            }
        }
    }

    /// Drop one unit of interest. Never waits for teardown.
    pub fn release(&self) -> Result<()> {
        self.acquire(-1)
    }

    /// Acquire one unit and return a guard that releases it on drop.
    pub fn hold(&self) -> Result<ShimGuard<'_, R>> {
        self.acquire(1)?;
        Ok(ShimGuard::new(self))
    }

    /// Current count.
    pub fn count(&self) -> i64 {
        self.inner.counter.value()
    }

    /// Whether a worker currently holds the resource initialized.
    pub fn is_running(&self) -> bool {
        self.inner.read_state().running
    }

    pub fn resource(&self) -> &R {
        &self.inner.resource
    }

    pub fn config(&self) -> &ShimConfig {
        &self.inner.config
    }

    /// Spawn a worker and block until it reports. Caller holds the write lock.
    fn start(&self, state: &mut State) -> Result<()> {
        if let Some(previous) = state.worker.take() {
            // A previous worker gives up the lock as its last act, so this
            // never waits on anything but thread exit.
            if previous.join().is_err() {
                warn!("previous pinshim worker panicked");
            }
        }

        let (report_tx, report_rx) = channel::bounded(1);
        let handle = worker::spawn(Arc::clone(&self.inner), report_tx)?;
        state.worker = Some(handle);
        debug!(thread = %self.inner.config.thread_name, "pinshim worker started");

        match report_rx.recv() {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::WorkerLost),
        }
    }
}

impl<R: Resource> Drop for Shim<R> {
    fn drop(&mut self) {
        let count = self.inner.counter.value();
        if count > 0 {
            warn!(count, "pinshim dropped with outstanding holds; worker stays parked");
        }
    }
}

impl<R> Inner<R> {
    pub(crate) fn read_state(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_state(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn drained(&self) -> MutexGuard<'_, ()> {
        self.drained.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `delta` to the count, waking the worker when it reaches zero.
    fn add(&self, delta: i64) -> Result<i64> {
        let value = match self.counter.checked_add(delta) {
            Ok(value) => value,
            Err(err) => {
                warn!(%err, "rejected pinshim count change");
                return Err(err);
            }
        };
        if value == 0 {
            let _drained = self.drained();
            self.wake.notify_all();
        }
        Ok(value)
    }

    /// Whether no one holds interest any more.
    pub(crate) fn is_drained(&self) -> bool {
        self.counter.value() <= 0
    }

    /// Park the calling worker until the count drops to zero.
    pub(crate) fn wait_drained(&self) {
        let mut drained = self.drained();
        while !self.is_drained() {
            drained = self
                .wake
                .wait(drained)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{self, Outcome};
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread::{self, ThreadId};
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Calls {
        inits: AtomicUsize,
        teardowns: AtomicUsize,
        threads: Mutex<Vec<ThreadId>>,
    }

    fn tracked(
        calls: &Arc<Calls>,
        outcome: fn() -> Outcome<io::Error>,
    ) -> Shim<impl Resource<Error = io::Error>> {
        let on_init = Arc::clone(calls);
        let on_teardown = Arc::clone(calls);
        Shim::new(resource::from_fn(
            move || {
                on_init.inits.fetch_add(1, Ordering::SeqCst);
                on_init.threads.lock().unwrap().push(thread::current().id());
                outcome()
            },
            move || {
                on_teardown.teardowns.fetch_add(1, Ordering::SeqCst);
                on_teardown
                    .threads
                    .lock()
                    .unwrap()
                    .push(thread::current().id());
            },
        ))
    }

    fn wait_idle<R: Resource>(shim: &Shim<R>) {
        let start = Instant::now();
        while shim.is_running() {
            assert!(
                start.elapsed() < Duration::from_secs(5),
                "shim never went idle"
            );
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn worker_finished<R: Resource>(shim: &Shim<R>) -> bool {
        let start = Instant::now();
        loop {
            let done = shim
                .inner
                .read_state()
                .worker
                .as_ref()
                .map_or(true, |handle| handle.is_finished());
            if done || start.elapsed() > Duration::from_secs(5) {
                return done;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn nested_holds_initialize_and_teardown_once() {
        let calls = Arc::new(Calls::default());
        let shim = tracked(&calls, || Outcome::Success);

        shim.acquire(1).unwrap();
        shim.acquire(1).unwrap();
        shim.release().unwrap();
        shim.release().unwrap();
        wait_idle(&shim);

        assert_eq!(calls.inits.load(Ordering::SeqCst), 1);
        assert_eq!(calls.teardowns.load(Ordering::SeqCst), 1);
        assert_eq!(shim.count(), 0);
        assert!(worker_finished(&shim));
    }

    #[test]
    fn initialize_and_teardown_share_a_dedicated_thread() {
        let calls = Arc::new(Calls::default());
        let shim = tracked(&calls, || Outcome::Success);

        shim.acquire(1).unwrap();
        shim.release().unwrap();
        wait_idle(&shim);

        let threads = calls.threads.lock().unwrap();
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0], threads[1]);
        assert_ne!(threads[0], thread::current().id());
    }

    #[test]
    fn release_at_zero_is_rejected_without_starting() {
        let calls = Arc::new(Calls::default());
        let shim = tracked(&calls, || Outcome::Success);

        let err = shim.release().unwrap_err();
        assert!(matches!(err, Error::NegativeCounter { current: 0, delta: -1 }));
        assert_eq!(shim.count(), 0);
        assert!(!shim.is_running());
        assert_eq!(calls.inits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn overshooting_release_is_rejected_while_running() {
        let calls = Arc::new(Calls::default());
        let shim = tracked(&calls, || Outcome::Success);

        shim.acquire(2).unwrap();
        assert!(shim.acquire(-3).is_err());
        assert_eq!(shim.count(), 2);
        assert!(shim.is_running());

        shim.acquire(-2).unwrap();
        wait_idle(&shim);
        assert_eq!(calls.teardowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_delta_on_idle_shim_starts_nothing() {
        let calls = Arc::new(Calls::default());
        let shim = tracked(&calls, || Outcome::Success);

        shim.acquire(0).unwrap();
        assert!(!shim.is_running());
        assert_eq!(calls.inits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn already_initialized_runs_compensating_teardown() {
        let calls = Arc::new(Calls::default());
        let shim = tracked(&calls, || Outcome::AlreadyInitialized);

        let err = shim.acquire(1).unwrap_err();
        assert!(matches!(err, Error::AlreadyInitialized));
        assert_eq!(calls.inits.load(Ordering::SeqCst), 1);
        assert_eq!(calls.teardowns.load(Ordering::SeqCst), 1);
        assert_eq!(shim.count(), 0);
        assert!(!shim.is_running());
    }

    #[test]
    fn initialize_failure_is_surfaced_and_rolled_back() {
        let calls = Arc::new(Calls::default());
        let shim = tracked(&calls, || Outcome::Failure(io::Error::other("no apartment")));

        let err = shim.acquire(1).unwrap_err();
        match err {
            Error::Initialize(source) => assert_eq!(source.to_string(), "no apartment"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(calls.teardowns.load(Ordering::SeqCst), 0);
        assert_eq!(shim.count(), 0);
        assert!(!shim.is_running());
        assert!(worker_finished(&shim));
    }

    #[test]
    fn panicking_initialize_reports_worker_lost() {
        let shim = Shim::new(resource::from_fn(
            || -> Outcome<io::Error> { panic!("initialize blew up") },
            || {},
        ));

        let err = shim.acquire(1).unwrap_err();
        assert!(matches!(err, Error::WorkerLost));
        assert_eq!(shim.count(), 0);
        assert!(!shim.is_running());
    }

    #[test]
    fn spawn_failure_is_surfaced_and_rolled_back() {
        let inits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&inits);
        let shim = Shim::with_config(
            resource::from_fn(
                move || -> Outcome<io::Error> {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Outcome::Success
                },
                || {},
            ),
            ShimConfig::default().stack_size(usize::MAX),
        );

        for _ in 0..2 {
            let err = shim.acquire(2).unwrap_err();
            assert!(matches!(err, Error::Spawn(_)), "unexpected error: {err:?}");
            assert_eq!(shim.count(), 0);
            assert!(!shim.is_running());
        }
        assert!(shim.inner.read_state().worker.is_none());
        assert_eq!(inits.load(Ordering::SeqCst), 0);
        assert!(matches!(
            shim.release(),
            Err(Error::NegativeCounter { current: 0, delta: -1 })
        ));
    }

    #[test]
    fn restarts_after_drain() {
        let calls = Arc::new(Calls::default());
        let shim = tracked(&calls, || Outcome::Success);

        for _ in 0..3 {
            shim.acquire(1).unwrap();
            shim.release().unwrap();
            wait_idle(&shim);
        }
        assert_eq!(calls.inits.load(Ordering::SeqCst), 3);
        assert_eq!(calls.teardowns.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn worker_thread_uses_configured_name() {
        let names = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&names);
        let shim = Shim::with_config(
            resource::from_fn(
                move || -> Outcome<io::Error> {
                    seen.lock()
                        .unwrap()
                        .push(thread::current().name().map(str::to_string));
                    Outcome::Success
                },
                || {},
            ),
            ShimConfig::default().thread_name("apartment"),
        );

        shim.acquire(1).unwrap();
        shim.release().unwrap();
        wait_idle(&shim);
        assert_eq!(*names.lock().unwrap(), vec![Some("apartment".to_string())]);
    }
}
