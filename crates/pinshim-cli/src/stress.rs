//! Hammer one shim from many tasks across runtimes of different widths.

use std::time::{Duration, Instant};

use anyhow::{ensure, Context, Result};
use futures::future::join_all;
use pinshim_iface::AsyncShim;
use pinshim_rt::{Shim, ShimConfig};
use serde::Serialize;
use tracing::{debug, info};

use crate::apartment::Apartment;

#[derive(Clone, Copy, Debug)]
pub struct StressPlan {
    /// Runtime widths 1..=max_threads.
    pub max_threads: usize,
    /// Task counts 1, 2, 4, .. up to max_rounds.
    pub max_rounds: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct StressReport {
    pub batches: usize,
    pub tasks: usize,
    pub failures: usize,
    pub initializations: usize,
    pub teardowns: usize,
    pub final_count: i64,
    pub elapsed_ms: u128,
}

impl StressReport {
    pub fn is_balanced(&self) -> bool {
        self.failures == 0 && self.final_count == 0 && self.initializations == self.teardowns
    }
}

pub fn run(plan: StressPlan, config: ShimConfig) -> Result<StressReport> {
    let shim = AsyncShim::new(Shim::with_config(Apartment::new(), config));
    let started = Instant::now();
    let mut report = StressReport::default();

    for threads in 1..=plan.max_threads.max(1) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(threads)
            .enable_all()
            .build()
            .context("building tokio runtime")?;

        for rounds in round_sizes(plan.max_rounds) {
            let failures = runtime.block_on(batch(&shim, rounds));
            debug!(threads, rounds, failures, "batch finished");
            report.batches += 1;
            report.tasks += rounds;
            report.failures += failures;
        }
    }

    wait_idle(shim.shim(), Duration::from_secs(5))?;

    let apartment = shim.shim().resource();
    report.initializations = apartment.inits();
    report.teardowns = apartment.teardowns();
    report.final_count = shim.shim().count();
    report.elapsed_ms = started.elapsed().as_millis();
    info!(?report, "stress finished");
    Ok(report)
}

/// Powers of two from 1 up to `max` (at least one round). Stops instead of
/// wrapping when doubling would overflow.
fn round_sizes(max: usize) -> impl Iterator<Item = usize> {
    let max = max.max(1);
    std::iter::successors(Some(1usize), |rounds| rounds.checked_mul(2))
        .take_while(move |rounds| *rounds <= max)
}

/// Spawn `rounds` hold/use/release tasks; returns how many failed.
async fn batch(shim: &AsyncShim<Apartment>, rounds: usize) -> usize {
    let tasks: Vec<_> = (0..rounds)
        .map(|_| {
            let shim = shim.clone();
            tokio::spawn(async move {
                let hold = shim.hold().await?;
                tokio::task::yield_now().await;
                hold.release().await
            })
        })
        .collect();

    join_all(tasks)
        .await
        .into_iter()
        .filter(|joined| !matches!(joined, Ok(Ok(()))))
        .count()
}

/// Poll until the worker has finished tearing down.
pub fn wait_idle<R: pinshim_rt::Resource>(shim: &Shim<R>, limit: Duration) -> Result<()> {
    let start = Instant::now();
    while shim.is_running() {
        ensure!(start.elapsed() < limit, "shim still running after {limit:?}");
        std::thread::sleep(Duration::from_millis(1));
    }
    Ok(())
}
