//! Miette diagnostic conversion for CLI errors.

use crate::error::{CliError, ConfigError};
use miette::Report;

/// Convert CliError to miette Report
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        // Library errors carry their own code and help text.
        CliError::Supervisor(e) => Report::new(e),
        CliError::Proxy(e) => Report::new(e),
        CliError::Config(e) => config_error_to_miette(e),
        _ => miette::miette!("{}", err),
    }
}

/// Convert ConfigError to miette Report
pub fn config_error_to_miette(err: ConfigError) -> Report {
    match err {
        ConfigError::InvalidValue { field, value, hint } => {
            miette::miette!(
                code = "respawn::config::invalid_value",
                help = hint,
                "Invalid value for '{}': {}",
                field,
                value
            )
        }
        ConfigError::MissingField { field, hint } => {
            miette::miette!(
                code = "respawn::config::missing_field",
                help = hint,
                "Missing required field: {}",
                field
            )
        }
        _ => miette::miette!("Configuration error: {}", err),
    }
}
