//! pinshim: demo and stress harness for the keep-alive shim.

mod apartment;
mod session;
mod stress;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pinshim_rt::{GlobalShim, Shim, ShimConfig};
use tracing::info;

use apartment::Apartment;
use session::Session;
use stress::StressPlan;

static APARTMENT: GlobalShim<Apartment> = GlobalShim::new(Apartment::new);

#[derive(Parser, Debug)]
#[command(name = "pinshim")]
#[command(about = "Keep a thread-affine resource alive while it is in use")]
struct Args {
    /// Log at debug level regardless of RUST_LOG
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open two sessions on the process-wide apartment, use them, close them
    Demo {
        /// Run against an apartment that refuses to initialize
        #[arg(long)]
        unavailable: bool,
    },

    /// Acquire and release from many tasks at once and check the books balance
    Stress {
        /// Largest runtime width to try
        #[arg(long, default_value = "10")]
        max_threads: usize,

        /// Largest number of concurrent tasks per batch
        #[arg(long, default_value = "64")]
        max_rounds: usize,

        /// JSON file with worker settings
        #[arg(long)]
        config: Option<PathBuf>,

        /// Worker thread name, overrides the config file
        #[arg(long)]
        thread_name: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into())
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match args.command {
        Command::Demo { unavailable: false } => demo(APARTMENT.get()),
        Command::Demo { unavailable: true } => demo(&Shim::new(Apartment::unavailable())),
        Command::Stress {
            max_threads,
            max_rounds,
            config,
            thread_name,
            json,
        } => {
            let mut config = load_config(config)?;
            if let Some(name) = thread_name {
                config = config.thread_name(name);
            }
            let plan = StressPlan {
                max_threads,
                max_rounds,
            };
            let report = stress::run(plan, config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{} tasks in {} batches: {} failures, {} initializations, {} teardowns ({} ms)",
                    report.tasks,
                    report.batches,
                    report.failures,
                    report.initializations,
                    report.teardowns,
                    report.elapsed_ms,
                );
            }
            if !report.is_balanced() {
                bail!("stress run did not balance: {report:?}");
            }
            Ok(())
        }
    }
}

fn demo(shim: &Shim<Apartment>) -> Result<()> {
    let first = Session::open(shim, "first").context("opening first session")?;
    let second = Session::open(shim, "second").context("opening second session")?;

    first.touch()?;
    second.touch()?;
    second.touch()?;
    info!(count = shim.count(), "sessions in use");

    first.close();
    second.close();
    stress::wait_idle(shim, Duration::from_secs(5))?;

    let apartment = shim.resource();
    println!(
        "initializations: {}, teardowns: {}",
        apartment.inits(),
        apartment.teardowns()
    );
    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<ShimConfig> {
    let Some(path) = path else {
        return Ok(ShimConfig::default());
    };
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}
