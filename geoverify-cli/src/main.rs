//! geoverify CLI - Command-line interface
//!
//! Runs scripted verification attempts and inspects configuration.
//!
//! Exit codes: 0 when the attempt verified, 2 when it settled on any other
//! outcome, 1 on errors.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use geoverify::logging::{init_logging, LoggingConfig};

use commands::config::ConfigCommands;
use commands::simulate::SimulateArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "geoverify")]
#[command(version, about = "On-site location verification from AR geospatial tracking")]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one verification attempt against a scenario file
    Simulate(SimulateArgs),

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => e.exit(),
    }
}

fn run(cli: Cli) -> Result<i32, CliError> {
    let _guard = init_logging(LoggingConfig {
        directive: log_directive(cli.verbose).to_string(),
        file: cli.log_file.clone(),
        ..LoggingConfig::default()
    })?;

    match cli.command {
        Commands::Simulate(args) => {
            let config = commands::config::load(cli.config.as_deref())?;
            commands::simulate::run(args, config)
        }
        Commands::Config(command) => {
            commands::config::run(command, cli.config.as_deref())?;
            Ok(0)
        }
    }
}

/// Log filter for the given `-v` count. Quiet by default so the progress
/// display stays readable.
fn log_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "geoverify=warn",
        1 => "geoverify=info",
        2 => "geoverify=debug",
        _ => "geoverify=trace",
    }
}
