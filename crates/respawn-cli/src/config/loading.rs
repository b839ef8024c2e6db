use crate::config::{Overrides, RespawnConfig};
use crate::error::{ConfigError, Result};
use figment::{
    Figment,
    providers::{Env, Format as _, Serialized, Toml},
};
use std::path::Path;

/// Config file picked up from the current directory.
pub const CONFIG_FILE: &str = "respawn.toml";

/// Prefix of environment variables read as configuration.
pub const ENV_PREFIX: &str = "RESPAWN_";

/// Keys that may be set through the environment (`RESPAWN_BASE_DIR` -> `base-dir`).
///
/// The child's socket variable shares the prefix, so unknown keys are
/// filtered instead of rejected.
pub const ENV_KEYS: &[&str] = &[
    "exts",
    "dirs",
    "ignore-dirs",
    "build",
    "exec",
    "addr",
    "base-dir",
    "temp-dir",
    "catch-all-target",
    "log-level",
    "generator-ext",
    "generator-allow",
    "directive-prefix",
    "routes-command",
    "socket-env",
    "shutdown-timeout-ms",
];

impl RespawnConfig {
    /// Load configuration from multiple sources.
    /// Priority: CLI args > environment variables > config file > defaults
    pub fn load(overrides: &Overrides, config_path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        let config_file = match config_path {
            Some(path) if !path.is_file() => {
                return Err(ConfigError::NotFound(path.to_path_buf()).into());
            }
            Some(path) => Some(path.to_path_buf()),
            None => {
                let default_path = Path::new(CONFIG_FILE);
                default_path.is_file().then(|| default_path.to_path_buf())
            }
        };

        if let Some(path) = config_file {
            tracing::debug!(path = %path.display(), "loading config file");
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(
            Env::prefixed(ENV_PREFIX)
                .map(|key| key.as_str().replace('_', "-").into())
                .only(ENV_KEYS),
        );

        // Unset flags are skipped during serialization.
        figment = figment.merge(Serialized::defaults(overrides));

        figment
            .extract()
            .map_err(|e| ConfigError::Extract(e).into())
    }
}
