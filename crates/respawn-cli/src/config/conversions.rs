use crate::cli::{LogLevel, RoutesArgs, RunArgs};
use respawn::CommandTemplate;
use serde::Serialize;
use std::path::PathBuf;

/// Configuration keys supplied on the command line.
///
/// Only flags that were actually given are serialized, so merging this
/// layer never resets a value from the file or the environment.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exts: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dirs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_dirs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catch_all_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator_allow: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directive_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routes_command: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutdown_timeout_ms: Option<u64>,
}

/// Repeatable flags count as given once they occur at least once.
fn non_empty(values: &[String]) -> Option<Vec<String>> {
    (!values.is_empty()).then(|| values.to_vec())
}

/// Command lines from flags are split on whitespace.
fn split_command(line: Option<&str>) -> Option<Vec<String>> {
    line.map(|line| CommandTemplate::parse(line).args().to_vec())
}

impl From<&RunArgs> for Overrides {
    fn from(args: &RunArgs) -> Self {
        Self {
            exts: non_empty(&args.exts),
            dirs: non_empty(&args.dirs),
            ignore_dirs: non_empty(&args.ignore_dirs),
            build: split_command(args.build.as_deref()),
            exec: split_command(args.exec.as_deref()),
            addr: args.addr.clone(),
            base_dir: args.base_dir.clone(),
            temp_dir: args.temp_dir.clone(),
            catch_all_target: args.catch_all_target.clone(),
            log_level: args.log_level,
            generator_allow: non_empty(&args.generator_allow),
            directive_prefix: args.directive_prefix.clone(),
            routes_command: split_command(args.routes_command.as_deref()),
            socket_env: args.socket_env.clone(),
            shutdown_timeout_ms: args.shutdown_timeout_ms,
        }
    }
}

impl From<&RoutesArgs> for Overrides {
    fn from(args: &RoutesArgs) -> Self {
        Self {
            base_dir: args.base_dir.clone(),
            routes_command: split_command(args.routes_command.as_deref()),
            ..Self::default()
        }
    }
}
