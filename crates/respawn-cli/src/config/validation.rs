use crate::config::RespawnConfig;
use crate::error::{ConfigError, Result};
use respawn::proxy::{Upstream, normalize_listen_addr};

fn invalid(
    field: &str,
    value: impl Into<String>,
    hint: impl Into<String>,
) -> crate::error::CliError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.into(),
        hint: hint.into(),
    }
    .into()
}

/// Validate a listen address of the form `host:port` or `:port`.
pub fn validate_listen_addr(addr: &str) -> Result<()> {
    let normalized = normalize_listen_addr(addr);
    let port = normalized
        .rsplit_once(':')
        .filter(|(host, _)| !host.is_empty())
        .map(|(_, port)| port);
    match port {
        Some(port) if port.parse::<u16>().is_ok() => Ok(()),
        _ => Err(invalid(
            "addr",
            addr,
            "Use host:port or :port, for example :8080 or 127.0.0.1:8080",
        )),
    }
}

impl RespawnConfig {
    /// Validate configuration for logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.build.is_empty() {
            return Err(ConfigError::MissingField {
                field: "build".to_string(),
                hint: "Provide the command that builds the target, e.g. go build -o {outpath} ./"
                    .to_string(),
            }
            .into());
        }

        if self.exec.is_empty() {
            return Err(ConfigError::MissingField {
                field: "exec".to_string(),
                hint: "Provide the command that runs the target, e.g. {outpath}".to_string(),
            }
            .into());
        }

        if self.dirs.is_empty() {
            return Err(ConfigError::MissingField {
                field: "dirs".to_string(),
                hint: "Watch at least one directory, e.g. ./...".to_string(),
            }
            .into());
        }

        for ext in self.exts.iter().chain(std::iter::once(&self.generator_ext)) {
            if !ext.starts_with('.') || ext.len() < 2 {
                return Err(invalid(
                    "exts",
                    ext.as_str(),
                    format!(
                        "Extensions include the leading dot (e.g. '.{}')",
                        ext.trim_start_matches('.')
                    ),
                ));
            }
        }

        if !self.base_dir.is_dir() {
            return Err(invalid(
                "base-dir",
                self.base_dir.display().to_string(),
                "The base directory must exist",
            ));
        }

        if let Some(addr) = &self.addr {
            validate_listen_addr(addr)?;

            if self.routes_command.is_empty() {
                return Err(ConfigError::MissingField {
                    field: "routes-command".to_string(),
                    hint: "Proxy mode needs a command that prints the target's routes".to_string(),
                }
                .into());
            }

            if self.socket_env.is_empty() {
                return Err(invalid(
                    "socket-env",
                    "",
                    "Name the environment variable that carries the socket path",
                ));
            }
        }

        if let Some(target) = &self.catch_all_target {
            if let Err(e) = Upstream::parse(target) {
                return Err(invalid("catch-all-target", target.as_str(), e.to_string()));
            }
            if self.addr.is_none() {
                tracing::warn!("catch-all-target has no effect without addr");
            }
        }

        Ok(())
    }
}
