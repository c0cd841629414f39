use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;
use tempo_native::EventLoopHost;
use tempo_scheduler::{Host, Scheduler, SchedulerConfig, VirtualHost};
use tracing_subscriber::EnvFilter;
use workload::{Burn, Report, Workload};

mod settings;
mod workload;

#[derive(Parser)]
#[command(name = "tempo")]
#[command(about = "Run cooperative scheduling workloads", long_about = None)]
struct Cli {
    /// Scheduler config file (TOML). Defaults to ./tempo.toml when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workload against a virtual clock
    Simulate {
        #[command(flatten)]
        workload: Workload,
        #[command(flatten)]
        output: Output,
    },
    /// Run a workload in real time on the native event loop
    Run {
        #[command(flatten)]
        workload: Workload,
        #[command(flatten)]
        output: Output,
        /// Give up after this many seconds
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
    /// Print the effective scheduler configuration
    Config,
}

#[derive(Args)]
struct Output {
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
    /// Record profiling events and include them in the report
    #[arg(long)]
    profile: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();
    let cli = Cli::parse();
    let config = settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Simulate { workload, output } => {
            let host = VirtualHost::new();
            let scheduler = Scheduler::with_config(host.clone(), profiled(config, &output))?;
            let clock = host.clone();
            let burn: Burn = Rc::new(move |ms| clock.advance_time(ms));
            let report = execute(&scheduler, &workload, &output, "virtual", burn, || {
                host.run_all();
                Ok(host.deferred_runs())
            })?;
            print_report(&report, &output)?;
        }
        Commands::Run {
            workload,
            output,
            timeout_secs,
        } => {
            let host = EventLoopHost::new();
            let scheduler = Scheduler::with_config(host.clone(), profiled(config, &output))?;
            let burn: Burn =
                Rc::new(|ms: f64| std::thread::sleep(Duration::from_secs_f64(ms / 1000.0)));
            let report = execute(&scheduler, &workload, &output, "native", burn, || {
                host.run_for(Duration::from_secs(timeout_secs))
                    .context("workload did not finish")?;
                for error in host.take_errors() {
                    tracing::warn!("{}", error);
                }
                Ok(host.turns())
            })?;
            print_report(&report, &output)?;
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn profiled(config: SchedulerConfig, output: &Output) -> SchedulerConfig {
    if output.profile {
        config.with_profiling(true)
    } else {
        config
    }
}

/// Submits `workload`, pumps the host with `drive` until it is done and
/// collects a report. `drive` returns the number of host activations.
fn execute<H, D>(
    scheduler: &Scheduler<H>,
    workload: &Workload,
    output: &Output,
    name: &'static str,
    burn: Burn,
    drive: D,
) -> Result<Report>
where
    H: Host,
    D: FnOnce() -> Result<u64>,
{
    if output.profile {
        scheduler.start_logging_profiling_events();
    }
    let started = scheduler.now();
    let counters = workload.submit(scheduler, burn);
    let slices = drive()?;
    let elapsed_ms = scheduler.now() - started;

    let counters = counters.borrow().clone();
    Ok(Report {
        host: name,
        tasks: workload.tasks,
        counters,
        slices,
        elapsed_ms,
        events: scheduler.stop_logging_profiling_events(),
    })
}

fn print_report(report: &Report, output: &Output) -> Result<()> {
    if output.json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("host:        {}", report.host);
    println!("tasks:       {}", report.tasks);
    println!("completed:   {}", report.counters.completed);
    println!("cancelled:   {}", report.counters.cancelled);
    println!("invocations: {}", report.counters.invocations);
    println!("timed out:   {}", report.counters.timed_out);
    println!("slices:      {}", report.slices);
    println!("elapsed:     {:.1}ms", report.elapsed_ms);
    if let Some(events) = &report.events {
        println!("events:      {}", events.len());
    }
    Ok(())
}
