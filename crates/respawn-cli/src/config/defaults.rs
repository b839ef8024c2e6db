use respawn::options::{
    DEFAULT_DIRECTIVE_PREFIX, DEFAULT_GENERATOR_ALLOW, DEFAULT_GENERATOR_EXT,
    DEFAULT_ROUTES_COMMAND, DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_SOCKET_ENV,
};
use std::path::PathBuf;

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn default_exts() -> Vec<String> {
    owned(&[".go"])
}

pub fn default_dirs() -> Vec<String> {
    owned(&["./"])
}

pub fn default_ignore_dirs() -> Vec<String> {
    owned(&[".git"])
}

pub fn default_build() -> Vec<String> {
    owned(&["go", "build", "-o", "{outpath}", "./"])
}

pub fn default_exec() -> Vec<String> {
    owned(&["{outpath}"])
}

pub fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

pub fn default_temp_dir() -> PathBuf {
    std::env::temp_dir()
}

pub fn default_generator_ext() -> String {
    DEFAULT_GENERATOR_EXT.to_string()
}

pub fn default_generator_allow() -> Vec<String> {
    owned(DEFAULT_GENERATOR_ALLOW)
}

pub fn default_directive_prefix() -> String {
    DEFAULT_DIRECTIVE_PREFIX.to_string()
}

pub fn default_routes_command() -> Vec<String> {
    owned(DEFAULT_ROUTES_COMMAND)
}

pub fn default_socket_env() -> String {
    DEFAULT_SOCKET_ENV.to_string()
}

pub fn default_shutdown_timeout_ms() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT.as_millis() as u64
}
