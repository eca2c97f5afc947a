//! aeroparcel command line
//!
//! Runs a parcel scenario described in TOML and writes the activation
//! summary as JSON.
//!
//! # Usage
//!
//! ```bash
//! aeroparcel run demos/marine.toml --pretty
//! aeroparcel check demos/marine.toml
//! ```

use aeroparcel::{initialize, ParcelError, ParcelRunner, PyrcelBackend, Scenario};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Adiabatic cloud-parcel runner
#[derive(Parser, Debug)]
#[command(name = "aeroparcel")]
#[command(about = "Run a cloud-parcel scenario and summarise aerosol activation")]
struct Args {
    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the parcel model for a scenario
    Run {
        /// Scenario TOML file
        scenario: PathBuf,

        /// Write the JSON result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print the JSON result
        #[arg(long)]
        pretty: bool,
    },
    /// Validate a scenario without running the model
    Check {
        /// Scenario TOML file
        scenario: PathBuf,
    },
}

#[derive(Debug)]
enum CliError {
    Parcel(ParcelError),
    Output(String),
}

impl From<ParcelError> for CliError {
    fn from(err: ParcelError) -> Self {
        CliError::Parcel(err)
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Parcel(err) => write!(f, "{}", err),
            CliError::Output(msg) => f.write_str(msg),
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: &Path) -> Result<Scenario, CliError> {
    let scenario = Scenario::from_path(path)?;
    scenario.validate()?;
    Ok(scenario)
}

fn run(scenario_path: &Path, output: Option<&Path>, pretty: bool) -> Result<(), CliError> {
    let scenario = load(scenario_path)?;

    initialize();
    let runner = ParcelRunner::new(PyrcelBackend::new()?, scenario.solver);
    let result = runner.run(&scenario.modes, &scenario.initial)?;

    let json = if pretty {
        serde_json::to_string_pretty(&result)
    } else {
        serde_json::to_string(&result)
    }
    .map_err(|e| CliError::Output(format!("Failed to serialise result: {}", e)))?;

    match output {
        Some(path) => {
            fs::write(path, json).map_err(|e| {
                CliError::Output(format!("Failed to write {}: {}", path.display(), e))
            })?;
            info!(path = %path.display(), "Wrote run result");
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn check(scenario_path: &Path) -> Result<(), CliError> {
    let scenario = load(scenario_path)?;
    let (end_time, output_interval) = scenario
        .solver
        .schedule(scenario.initial.updraft_velocity)?;
    println!(
        "{}: {} mode(s), {:.1} s ascent with output every {:.2} s ({})",
        scenario_path.display(),
        scenario.modes.len(),
        end_time,
        output_interval,
        scenario.solver.integrator
    );
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let outcome = match &args.command {
        Command::Run {
            scenario,
            output,
            pretty,
        } => run(scenario, output.as_deref(), *pretty),
        Command::Check { scenario } => check(scenario),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
