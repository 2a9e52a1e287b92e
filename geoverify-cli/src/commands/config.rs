//! Configuration CLI commands.
//!
//! Provides `config list` and `config path` for inspecting the settings a
//! simulation would run with.

use std::path::Path;

use clap::Subcommand;
use geoverify::config::default_config_path;
use geoverify::VerifierConfig;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// List all effective configuration settings
    List,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, config_path: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::List => run_list(config_path),
        ConfigCommands::Path => run_path(config_path),
    }
}

/// Load the configuration the CLI runs with.
///
/// An explicit path must exist; the default path may be absent.
pub fn load(config_path: Option<&Path>) -> Result<VerifierConfig, CliError> {
    match config_path {
        Some(path) => Ok(VerifierConfig::load(path)?),
        None => match default_config_path() {
            Some(path) => Ok(VerifierConfig::load_or_default(&path)?),
            None => Ok(VerifierConfig::default()),
        },
    }
}

/// List all configuration settings.
fn run_list(config_path: Option<&Path>) -> Result<(), CliError> {
    let config = load(config_path)?;
    print!("{}", render_list(&config));
    Ok(())
}

fn render_list(config: &VerifierConfig) -> String {
    let mut out = String::new();
    out.push_str("Configuration Settings\n");
    out.push_str("======================\n\n");

    let mut current_section = "";
    for (section, key, value) in config.entries() {
        // Print section header when section changes
        if section != current_section {
            if !current_section.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("[{}]\n", section));
            current_section = section;
        }
        out.push_str(&format!("  {} = {}\n", key, value));
    }
    out
}

/// Show the configuration file path.
fn run_path(config_path: Option<&Path>) -> Result<(), CliError> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => default_config_path().ok_or_else(|| {
            CliError::Config("No configuration directory on this platform".to_string())
        })?,
    };
    println!("{}", path.display());
    Ok(())
}
