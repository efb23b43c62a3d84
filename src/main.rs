//! backend-pilot
//!
//! Answers one question at invocation time: is this inference backend usable,
//! and if not, what does it take to make it usable?
//!
//! # Architecture Overview
//!
//! ```text
//!   health ──────────────┐                 select
//!                        ▼                   │
//!              ┌──────────────────┐          ▼
//!              │  report          │   ┌──────────────────┐
//!              │  (rows, render)  │   │  selection       │
//!              └────────┬─────────┘   │  reuse | restart │
//!                       │             └───┬──────────┬───┘
//!                       ▼                 │          ▼
//!              ┌──────────────────┐       │   ┌──────────────────┐
//!              │  discovery       │◀──────┘   │  plan            │
//!              │  ports × hosts   │           │  local | ssh     │
//!              └────────┬─────────┘           └────────┬─────────┘
//!                       ▼                              │
//!              ┌──────────────────┐                    │
//!              │  probe           │◀───────────────────┘
//!              │  /v1/models      │
//!              │  /health         │
//!              └──────────────────┘
//!
//!   cross-cutting: config · observability · resilience · lifecycle
//! ```
//!
//! # Exit Codes
//! - 0: report produced, or the selected backend is ready
//! - 1: selection finished without a ready backend
//! - 2: configuration, port spec or usage error

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use clap::{ArgAction, Args, Parser, Subcommand};

use backend_pilot::config::watcher::ConfigWatcher;
use backend_pilot::config::{load_config, PilotConfig};
use backend_pilot::discovery::{PortSpec, Scanner};
use backend_pilot::lifecycle::{spawn_signal_handler, Shutdown};
use backend_pilot::observability::{logging, metrics};
use backend_pilot::probe::ProbeExecutor;
use backend_pilot::report::{self, HealthReport, HealthReporter, HealthRequest};
use backend_pilot::selection::{Intent, SelectRequest, SelectionPlanner};

const DEFAULT_CONFIG: &str = "backend-pilot.toml";

#[derive(Parser)]
#[command(name = "backend-pilot", version)]
#[command(about = "Health checks and reuse-or-restart selection for inference backends", long_about = None)]
struct Cli {
    /// Configuration file [default: backend-pilot.toml if present]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Raise log verbosity (repeatable)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe configured backends, optionally sweeping ports for others
    Health(HealthArgs),
    /// Reuse a backend if it is healthy, otherwise restart it
    Select(SelectArgs),
}

#[derive(Args)]
struct HealthArgs {
    /// Ports to sweep: 8080, 8080,8081 or 8000-8010
    #[arg(long, value_name = "SPEC")]
    scan: Option<PortSpec>,

    /// Host to sweep (repeatable) [default: configured hosts, else localhost]
    #[arg(long = "host", value_name = "HOST")]
    hosts: Vec<String>,

    /// Include discovered targets that are down
    #[arg(long)]
    all: bool,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Repeat every SECS seconds until interrupted
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    watch: Option<u64>,
}

#[derive(Args)]
struct SelectArgs {
    /// Backend name [default: default_backend, else the first backend]
    name: Option<String>,

    /// Restart even if the backend is healthy
    #[arg(long, visible_alias = "restart", conflicts_with = "reuse")]
    force: bool,

    /// Never restart; fail if the running backend is unusable
    #[arg(long)]
    reuse: bool,

    /// Ports on the backend's host to search for a running instance
    #[arg(long, value_name = "SPEC")]
    scan: Option<PortSpec>,

    /// Print the decision as JSON
    #[arg(long)]
    json: bool,
}

impl SelectArgs {
    fn intent(&self) -> Intent {
        if self.force {
            Intent::ForceRestart
        } else if self.reuse {
            Intent::ForceReuse
        } else {
            Intent::Auto
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (config, config_path) = match resolve_config(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };
    logging::init_logging(&config.observability, cli.verbose);
    tracing::debug!(
        path = ?config_path,
        backends = config.backends.len(),
        "configuration loaded"
    );

    let result = match cli.command {
        Commands::Health(args) => health(config, config_path, args).await,
        Commands::Select(args) => select(config, args).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(2)
        }
    }
}

/// An explicit path must load; the default path is optional.
fn resolve_config(explicit: Option<&Path>) -> Result<(PilotConfig, Option<PathBuf>), Box<dyn Error>> {
    match explicit {
        Some(path) => Ok((load_config(path)?, Some(path.to_path_buf()))),
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG);
            if path.exists() {
                Ok((load_config(&path)?, Some(path)))
            } else {
                Ok((PilotConfig::default(), None))
            }
        }
    }
}

async fn health(
    config: PilotConfig,
    config_path: Option<PathBuf>,
    args: HealthArgs,
) -> Result<ExitCode, Box<dyn Error>> {
    let request = HealthRequest {
        scan: args.scan.as_ref(),
        hosts: &args.hosts,
        show_all: args.all,
    };

    let Some(secs) = args.watch else {
        let reporter = reporter_for(&config)?;
        let report = reporter.report(&config, request).await;
        print_report(&report, args.json)?;
        return Ok(ExitCode::SUCCESS);
    };

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "failed to parse metrics address"
            ),
        }
    }

    let live = Arc::new(ArcSwap::from_pointee(config));
    let _watcher = match &config_path {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let handle = watcher.run()?;
            let live = live.clone();
            tokio::spawn(async move {
                while let Some(next) = updates.recv().await {
                    tracing::info!(backends = next.backends.len(), "configuration reloaded");
                    live.store(Arc::new(next));
                }
            });
            Some(handle)
        }
        None => None,
    };

    let shutdown = Shutdown::new();
    let mut stop = shutdown.subscribe();
    spawn_signal_handler(shutdown);

    let mut ticker = tokio::time::interval(Duration::from_secs(secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = stop.recv() => break,
        }

        // Rebuilt each round so reloaded probe and scan settings apply.
        let current = live.load_full();
        let reporter = reporter_for(&current)?;
        let report = tokio::select! {
            report = reporter.report(&current, request) => report,
            _ = stop.recv() => break,
        };
        print_report(&report, args.json)?;
    }

    tracing::info!("watch stopped");
    Ok(ExitCode::SUCCESS)
}

fn reporter_for(config: &PilotConfig) -> Result<HealthReporter, reqwest::Error> {
    let probe = ProbeExecutor::new(&config.probe)?;
    Ok(HealthReporter::new(Scanner::new(probe, &config.scan)))
}

fn print_report(health: &HealthReport, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", report::to_json(health)?);
    } else {
        print!("{}", report::health_table(health));
    }
    Ok(())
}

async fn select(config: PilotConfig, args: SelectArgs) -> Result<ExitCode, Box<dyn Error>> {
    let backend = SelectionPlanner::resolve(&config, args.name.as_deref())?;
    let planner = SelectionPlanner::new(&config, ProbeExecutor::new(&config.probe)?);

    let decision = planner
        .select(
            backend,
            SelectRequest {
                intent: args.intent(),
                scan: args.scan.as_ref(),
                deadline: None,
            },
        )
        .await?;

    if args.json {
        println!("{}", report::to_json(&decision)?);
        if let Some(failed) = decision.failure() {
            eprintln!("error: {}", failed.detail().trim());
        }
    } else {
        print!("{}", report::decision_text(&decision));
    }

    if decision.is_ready() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}
