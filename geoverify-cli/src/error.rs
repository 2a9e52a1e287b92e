//! CLI error type.

use std::fmt;

use geoverify::logging::LoggingError;
use geoverify::scenario::ScenarioError;
use geoverify::ConfigError;

/// Errors surfaced by CLI commands. All map to exit code 1.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded or located.
    Config(String),
    /// Scenario file could not be read or parsed.
    Scenario(ScenarioError),
    /// Logging could not be initialized.
    Logging(LoggingError),
    /// Runtime setup failed.
    Runtime(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Scenario(e) => write!(f, "Scenario error: {}", e),
            CliError::Logging(e) => write!(f, "Logging error: {}", e),
            CliError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Scenario(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Config(_) | CliError::Runtime(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<ScenarioError> for CliError {
    fn from(e: ScenarioError) -> Self {
        CliError::Scenario(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl CliError {
    /// Print the error and exit with status 1.
    pub fn exit(&self) -> ! {
        eprintln!("{} {}", console::style("Error:").red().bold(), self);
        std::process::exit(1);
    }
}
