#[cfg(test)]
mod tests {
    use crate::cli::{LogLevel, RunArgs};
    use crate::config::*;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = RespawnConfig::default();
        assert_eq!(config.exts, vec![".go"]);
        assert_eq!(config.dirs, vec!["./"]);
        assert_eq!(config.ignore_dirs, vec![".git"]);
        assert_eq!(config.build, vec!["go", "build", "-o", "{outpath}", "./"]);
        assert_eq!(config.exec, vec!["{outpath}"]);
        assert_eq!(config.socket_env, "RESPAWN_UDS_PATH");
        assert_eq!(config.shutdown_timeout_ms, 5000);
        assert!(config.addr.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serialization_uses_kebab_case() {
        let config = RespawnConfig {
            addr: Some(":8080".to_string()),
            catch_all_target: Some("http://localhost:5173".to_string()),
            log_level: Some(LogLevel::Debug),
            ..RespawnConfig::default()
        };
        let value = serde_json::to_value(&config).unwrap();
        assert!(value.get("ignore-dirs").is_some());
        assert!(value.get("catch-all-target").is_some());
        assert!(value.get("shutdown-timeout-ms").is_some());
        assert!(value.get("ignore_dirs").is_none());
        assert_eq!(value["log-level"], "debug");

        // skip_serializing_if
        let value = serde_json::to_value(RespawnConfig::default()).unwrap();
        assert!(value.get("addr").is_none());
        assert!(value.get("log-level").is_none());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result: Result<RespawnConfig, _> = serde_json::from_str(r#"{"extensions": [".go"]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validation() {
        // Empty build fails
        assert!(RespawnConfig {
            build: vec![],
            ..RespawnConfig::default()
        }
        .validate()
        .is_err());

        // Empty exec fails
        assert!(RespawnConfig {
            exec: vec![],
            ..RespawnConfig::default()
        }
        .validate()
        .is_err());

        // Extensions need the leading dot
        assert!(RespawnConfig {
            exts: vec!["go".to_string()],
            ..RespawnConfig::default()
        }
        .validate()
        .is_err());

        // Missing base dir fails
        assert!(RespawnConfig {
            base_dir: PathBuf::from("definitely/not/here"),
            ..RespawnConfig::default()
        }
        .validate()
        .is_err());

        // Catch-all target must be an http URL
        for target in ["https://localhost:5173", "localhost:5173", "not a url"] {
            assert!(RespawnConfig {
                addr: Some(":8080".to_string()),
                catch_all_target: Some(target.to_string()),
                ..RespawnConfig::default()
            }
            .validate()
            .is_err(), "{target} should be rejected");
        }

        // Proxy mode with a valid target succeeds
        assert!(RespawnConfig {
            addr: Some(":8080".to_string()),
            catch_all_target: Some("http://localhost:5173/app".to_string()),
            ..RespawnConfig::default()
        }
        .validate()
        .is_ok());
    }

    #[test]
    fn test_listen_addr_validation() {
        for addr in [":8080", "127.0.0.1:8080", "localhost:3000", "[::1]:8080"] {
            assert!(validation_ok(addr), "{addr} should be accepted");
        }
        for addr in ["8080", "localhost", ":http", ":99999", ""] {
            assert!(!validation_ok(addr), "{addr} should be rejected");
        }
    }

    fn validation_ok(addr: &str) -> bool {
        RespawnConfig {
            addr: Some(addr.to_string()),
            ..RespawnConfig::default()
        }
        .validate()
        .is_ok()
    }

    #[test]
    fn test_into_options_without_addr() {
        let options = RespawnConfig {
            base_dir: PathBuf::from("/project"),
            ..RespawnConfig::default()
        }
        .into_options();
        assert!(options.proxy.is_none());
        assert_eq!(options.base_dir, Path::new("/project"));
        assert_eq!(options.build.args(), ["go", "build", "-o", "{outpath}", "./"]);
        assert!(options.directives.allow.contains("github.com/mackee/tanukirpc/cmd/gentypescript"));
        assert_eq!(options.directives.file_ext, ".go");
    }

    #[test]
    fn test_into_options_with_proxy() {
        let options = RespawnConfig {
            addr: Some(":8080".to_string()),
            catch_all_target: Some("http://localhost:5173".to_string()),
            shutdown_timeout_ms: 250,
            ..RespawnConfig::default()
        }
        .into_options();
        let proxy = options.proxy.unwrap();
        assert_eq!(proxy.addr, ":8080");
        assert_eq!(proxy.catch_all.as_deref(), Some("http://localhost:5173"));
        assert_eq!(proxy.shutdown_timeout, Duration::from_millis(250));
        assert_eq!(proxy.socket_env, "RESPAWN_UDS_PATH");
    }

    #[test]
    fn test_overrides_skip_unset_flags() {
        let args = RunArgs {
            build: Some("make build OUT={outpath}".to_string()),
            exts: vec![".rs".to_string(), ".toml".to_string()],
            ..RunArgs::default()
        };
        let overrides = Overrides::from(&args);
        assert_eq!(
            overrides.build,
            Some(vec!["make".to_string(), "build".to_string(), "OUT={outpath}".to_string()])
        );

        let value = serde_json::to_value(&overrides).unwrap();
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, vec!["build", "exts"]);
    }
}
