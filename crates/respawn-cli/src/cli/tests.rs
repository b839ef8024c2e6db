#[cfg(test)]
mod tests {
    use crate::cli::{Cli, Command, LogLevel};
    use clap::{CommandFactory, Parser, ValueEnum};
    use std::path::PathBuf;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_log_level_values() {
        let levels: Vec<_> = LogLevel::value_variants()
            .iter()
            .map(|v| v.to_possible_value().unwrap().get_name().to_string())
            .collect();
        assert_eq!(levels, vec!["error", "warn", "info", "debug", "trace"]);
    }

    #[test]
    fn test_run_without_flags() {
        let cli = Cli::try_parse_from(["respawn", "run"]).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.exts.is_empty());
        assert!(args.build.is_none());
        assert!(args.addr.is_none());
        assert!(!cli.verbose && !cli.quiet && !cli.no_color);
    }

    #[test]
    fn test_run_with_flags() {
        let cli = Cli::try_parse_from([
            "respawn",
            "run",
            "--ext",
            ".go,.tmpl",
            "--ext",
            ".sql",
            "--dir",
            "./...",
            "--ignore-dir",
            "node_modules",
            "--build",
            "go build -o {outpath} ./cmd/server",
            "--addr",
            ":8080",
            "--catch-all-target",
            "http://localhost:5173",
            "--log-level",
            "debug",
            "--shutdown-timeout-ms",
            "1000",
            "--base-dir",
            "backend",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.exts, vec![".go", ".tmpl", ".sql"]);
        assert_eq!(args.dirs, vec!["./..."]);
        assert_eq!(args.ignore_dirs, vec!["node_modules"]);
        assert_eq!(args.build.as_deref(), Some("go build -o {outpath} ./cmd/server"));
        assert_eq!(args.addr.as_deref(), Some(":8080"));
        assert_eq!(args.log_level, Some(LogLevel::Debug));
        assert_eq!(args.shutdown_timeout_ms, Some(1000));
        assert_eq!(args.base_dir, Some(PathBuf::from("backend")));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = ["respawn", "routes", "--verbose", "--no-color", "--json"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(cli.verbose);
        assert!(cli.no_color);
        let Command::Routes(args) = cli.command else {
            panic!("expected routes");
        };
        assert!(args.json);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["respawn", "-v", "-q", "run"]).is_err());
    }

    #[test]
    fn test_invalid_log_level_is_rejected() {
        assert!(Cli::try_parse_from(["respawn", "run", "--log-level", "loud"]).is_err());
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["respawn"]).is_err());
    }
}
