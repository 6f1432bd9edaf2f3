//! pile-pump: runs a synthetic workload through the queue scheduler.
//!
//! Submits `--tasks` countdown coroutines that each yield `--yields` times,
//! pumps them on a thread pool, then prints the final metrics as JSON.
//! With `--bridge`, one extra computation is driven through
//! `exec_on_queue` and every status record is printed as it arrives.

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use pile_scheduler::{
    Coroutine, PumpPool, QueueExecutor, Scheduler, SchedulerConfig, Signal, Step,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Cooperative queue scheduler demo pump.
#[derive(Parser, Debug)]
#[command(name = "pile-pump", version, about)]
struct Cli {
    /// Path to a scheduler TOML config. Without it, defaults plus PILE_* env vars.
    #[arg(long, env = "PILE_CONFIG")]
    config: Option<String>,

    /// Pump threads (overrides the config; 0 = available parallelism).
    #[arg(long)]
    threads: Option<usize>,

    /// Queue capacity (overrides the config; 0 = unbounded).
    #[arg(long)]
    capacity: Option<usize>,

    /// Number of tasks to submit.
    #[arg(long, default_value_t = 8)]
    tasks: usize,

    /// Yields per task before it completes.
    #[arg(long, default_value_t = 3)]
    yields: usize,

    /// Also drive one computation through the bridging executor.
    #[arg(long)]
    bridge: bool,

    /// Shut down with cancellation instead of draining.
    #[arg(long)]
    cancel: bool,
}

// ── Workload ────────────────────────────────────────────────────────

/// Yields `remaining` times, then completes with its index.
struct Countdown {
    index: usize,
    remaining: usize,
}

impl Coroutine for Countdown {
    type Output = usize;

    fn resume(&mut self, signal: Signal) -> Step<usize> {
        if signal == Signal::Cancel {
            return Step::Cancelled;
        }
        if self.remaining == 0 {
            return Step::Complete(self.index);
        }
        self.remaining -= 1;
        Step::Yield
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<SchedulerConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let config = SchedulerConfig::from_file(path)?;
            info!(path = %path, "loaded scheduler config");
            config
        }
        None => SchedulerConfig::from_env()?,
    };

    if let Some(threads) = cli.threads {
        config.pump_threads = threads;
    }
    if let Some(capacity) = cli.capacity {
        config.capacity = capacity;
    }
    config.validate()?;
    Ok(config)
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    info!(?config, "pile-pump starting");

    let scheduler = Arc::new(Scheduler::new(config));
    let mut handles = Vec::with_capacity(cli.tasks);
    for index in 0..cli.tasks {
        handles.push(scheduler.submit(Countdown {
            index,
            remaining: cli.yields,
        })?);
    }

    let pool = PumpPool::from_config(Arc::clone(&scheduler))?;
    info!(threads = pool.len(), tasks = cli.tasks, "pump pool running");

    if cli.bridge {
        let executor = QueueExecutor::with_scheduler(Arc::clone(&scheduler));
        let mut reports = executor.exec_on_queue(
            &tokio::runtime::Handle::current(),
            Countdown {
                index: cli.tasks,
                remaining: cli.yields,
            },
        );
        while let Some(report) = reports.recv().await {
            println!("{}", serde_json::to_string(&report)?);
        }
    }

    scheduler.shutdown(true, cli.cancel);
    let joined = tokio::task::spawn_blocking(move || pool.join()).await?;
    if let Err(e) = joined {
        warn!(error = %e, "pump pool stopped with an error");
    }

    let finished = handles.iter().filter(|h| h.is_done()).count();
    info!(finished, submitted = handles.len(), "workload finished");

    println!("{}", serde_json::to_string_pretty(&scheduler.metrics())?);
    Ok(())
}
