//! Configuration system for respawn with multi-source loading.
//!
//! Merges settings from CLI args, environment variables, and config files.
//! Priority: CLI > Environment > File > Defaults

mod conversions;
mod defaults;
mod loading;
mod tests;
mod validation;

use crate::cli::LogLevel;
use respawn::{CommandTemplate, DirectiveOptions, ProxyOptions, SupervisorOptions};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use conversions::Overrides;
pub use defaults::*;
pub use loading::{CONFIG_FILE, ENV_KEYS, ENV_PREFIX};

/// respawn configuration - loaded from respawn.toml, RESPAWN_* and CLI args.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RespawnConfig {
    /// Extensions (with leading dot) whose changes trigger a restart
    #[serde(default = "default_exts")]
    pub exts: Vec<String>,

    /// Directories to watch; a trailing `...` watches the whole tree
    #[serde(default = "default_dirs")]
    pub dirs: Vec<String>,

    /// Directories never watched
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,

    /// Build command argv, `{outpath}` is the generation's output path
    #[serde(default = "default_build")]
    pub build: Vec<String>,

    /// Exec command argv
    #[serde(default = "default_exec")]
    pub exec: Vec<String>,

    /// External listen address; setting it enables proxy mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,

    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Upstream for requests matching no discovered route
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catch_all_target: Option<String>,

    /// Explicit log level; `None` defers to RUST_LOG
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,

    /// Extension of files scanned for generator directives
    #[serde(default = "default_generator_ext")]
    pub generator_ext: String,

    /// Generators allowed to run automatically
    #[serde(default = "default_generator_allow")]
    pub generator_allow: Vec<String>,

    #[serde(default = "default_directive_prefix")]
    pub directive_prefix: String,

    /// Route discovery argv; the base directory is appended
    #[serde(default = "default_routes_command")]
    pub routes_command: Vec<String>,

    /// Environment variable carrying the private socket path
    #[serde(default = "default_socket_env")]
    pub socket_env: String,

    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl Default for RespawnConfig {
    fn default() -> Self {
        Self {
            exts: default_exts(),
            dirs: default_dirs(),
            ignore_dirs: default_ignore_dirs(),
            build: default_build(),
            exec: default_exec(),
            addr: None,
            base_dir: default_base_dir(),
            temp_dir: default_temp_dir(),
            catch_all_target: None,
            log_level: None,
            generator_ext: default_generator_ext(),
            generator_allow: default_generator_allow(),
            directive_prefix: default_directive_prefix(),
            routes_command: default_routes_command(),
            socket_env: default_socket_env(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl RespawnConfig {
    /// Proxy settings, present only when a listen address is configured.
    pub fn proxy_options(&self) -> Option<ProxyOptions> {
        let addr = self.addr.clone()?;
        Some(ProxyOptions {
            addr,
            catch_all: self.catch_all_target.clone(),
            routes_command: self.routes_command.clone(),
            socket_env: self.socket_env.clone(),
            shutdown_timeout: Duration::from_millis(self.shutdown_timeout_ms),
        })
    }

    /// Convert into the supervisor's options.
    pub fn into_options(self) -> SupervisorOptions {
        let proxy = self.proxy_options();
        SupervisorOptions {
            exts: self.exts,
            dirs: self.dirs,
            ignore_dirs: self.ignore_dirs,
            build: CommandTemplate::new(self.build),
            exec: CommandTemplate::new(self.exec),
            base_dir: self.base_dir,
            temp_dir: self.temp_dir,
            directives: DirectiveOptions {
                file_ext: self.generator_ext,
                prefix: self.directive_prefix,
                allow: self.generator_allow.into_iter().collect(),
            },
            proxy,
        }
    }
}
