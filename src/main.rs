//! Planner CLI.
//!
//! `plan` computes a baseline plan from the three CSV inputs, `disrupt`
//! additionally applies a JSON event list and re-optimizes, `serve` exposes
//! the HTTP surface. Exit codes: 0 on success, 2 on data validation
//! failure, 1 on unexpected errors.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use aircargo_planner::{disruption, io, CancelFlag, PlannerConfig, PlannerError, Planner};

#[derive(Parser, Debug)]
#[command(name = "aircargo-planner")]
#[command(about = "Air-cargo route and load planning engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Path to flights.csv
    #[arg(long)]
    flights: PathBuf,

    /// Path to cargo.csv
    #[arg(long)]
    cargo: PathBuf,

    /// Path to connections.csv
    #[arg(long)]
    connections: PathBuf,

    /// Output directory for the four result files
    #[arg(long, default_value = "out")]
    out: PathBuf,

    /// Optional TOML config file (merged with PLANNER_* env vars)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured GA seed
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute a baseline plan
    Plan {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Apply disruption events to a baseline plan and re-optimize
    Disrupt {
        #[command(flatten)]
        input: InputArgs,

        /// JSON file with the disruption event list
        #[arg(long)]
        events: PathBuf,
    },
    /// Serve the HTTP surface
    Serve {
        /// Bind address
        #[arg(long, default_value = "0.0.0.0:8080")]
        addr: SocketAddr,

        /// Optional TOML config file (merged with PLANNER_* env vars)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        error!("{err:#}");
        let code = err
            .downcast_ref::<PlannerError>()
            .map(PlannerError::exit_code)
            .unwrap_or(1);
        process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Plan { input } => run_plan(&input)?,
        Command::Disrupt { input, events } => run_disrupt(&input, &events)?,
        Command::Serve { addr, config } => {
            let config = PlannerConfig::load(config.as_deref())?;
            aircargo_planner::server::serve(addr, config).await?;
        }
    }
    Ok(())
}

fn build_planner(input: &InputArgs) -> Result<Planner, PlannerError> {
    let config = PlannerConfig::load(input.config.as_deref())?;
    let flights = io::load_flights(&input.flights)?;
    let cargo = io::load_cargo(&input.cargo)?;
    let rules = io::load_connections(&input.connections)?;
    info!(
        flights = flights.len(),
        cargo = cargo.len(),
        rules = rules.len(),
        "inputs loaded"
    );
    Ok(Planner::new(flights, cargo, rules, config))
}

fn run_plan(input: &InputArgs) -> Result<(), PlannerError> {
    let planner = build_planner(input)?;
    let cancel = CancelFlag::new();
    let outcome = match input.seed {
        Some(seed) => planner.plan_with_seed(seed, &cancel),
        None => planner.plan(&cancel),
    };
    io::write_outputs(
        planner.cargo(),
        planner.graph().flight_map(),
        &outcome,
        &outcome.alerts,
        &input.out,
    )?;
    info!(out = %input.out.display(), "plan written");
    Ok(())
}

fn run_disrupt(input: &InputArgs, events_path: &Path) -> Result<(), PlannerError> {
    let planner = build_planner(input)?;
    let events = io::load_events(events_path)?;
    let cancel = CancelFlag::new();
    let baseline = match input.seed {
        Some(seed) => planner.plan_with_seed(seed, &cancel),
        None => planner.plan(&cancel),
    };

    let result = disruption::run(&planner, &baseline, &events);
    let alerts = result.combined_alerts();
    let mut plan = result.plan;
    plan.summary.recount_alerts(&alerts);
    io::write_outputs(planner.cargo(), &result.flights, &plan, &alerts, &input.out)?;
    info!(
        out = %input.out.display(),
        events = events.len(),
        "disruption analysis written"
    );
    Ok(())
}
