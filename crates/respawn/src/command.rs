//! Command templates and cancellation-aware process execution.

use crate::error::CommandError;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Token replaced by the generation's output path.
pub const OUTPUT_PLACEHOLDER: &str = "{outpath}";

/// An argument vector that may contain [`OUTPUT_PLACEHOLDER`].
///
/// The placeholder only matches as a standalone argument: `-o {outpath}`
/// is substituted, `--out={outpath}` is passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandTemplate(Vec<String>);

impl CommandTemplate {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(args.into_iter().map(Into::into).collect())
    }

    /// Split a command line on whitespace. No quoting is interpreted.
    pub fn parse(line: &str) -> Self {
        Self::new(line.split_whitespace())
    }

    pub fn args(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render the template with every placeholder token replaced by `output`.
    pub fn render(&self, output: &Path) -> Vec<String> {
        let output = output.to_string_lossy();
        self.0
            .iter()
            .map(|arg| {
                if arg == OUTPUT_PLACEHOLDER {
                    output.to_string()
                } else {
                    arg.clone()
                }
            })
            .collect()
    }
}

/// Build a command rooted at `dir` with inherited stdio.
fn command(argv: &[String], dir: &Path) -> Result<Command, CommandError> {
    let (program, args) = argv.split_first().ok_or(CommandError::Empty)?;
    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .kill_on_drop(true);
    Ok(cmd)
}

/// Run `argv` in `dir` to completion, killing it if `token` is cancelled.
///
/// On cancellation the child is killed and reaped before this returns, so
/// no process from a superseded generation outlives its pipeline.
pub async fn run(
    argv: &[String],
    dir: &Path,
    env: &[(String, OsString)],
    token: &CancellationToken,
) -> Result<(), CommandError> {
    let mut cmd = command(argv, dir)?;
    cmd.envs(env.iter().map(|(k, v)| (k, v)));
    let program = argv[0].clone();

    let mut child = cmd.spawn().map_err(|source| CommandError::Spawn {
        program: program.clone(),
        source,
    })?;

    tokio::select! {
        status = child.wait() => {
            let status = status.map_err(|source| CommandError::Wait {
                program: program.clone(),
                source,
            })?;
            if status.success() {
                Ok(())
            } else {
                Err(CommandError::Exit { program, status })
            }
        }
        _ = token.cancelled() => {
            if let Err(e) = child.start_kill() {
                tracing::debug!(program = %program, error = %e, "kill after cancellation failed");
            }
            let _ = child.wait().await;
            Err(CommandError::Cancelled)
        }
    }
}

/// Run `argv` in `dir` and capture its stdout. Stderr stays inherited.
pub async fn output(
    argv: &[String],
    dir: &Path,
    token: &CancellationToken,
) -> Result<Vec<u8>, CommandError> {
    let mut cmd = command(argv, dir)?;
    cmd.stdout(Stdio::piped()).stderr(Stdio::inherit());
    let program = argv[0].clone();

    let output = tokio::select! {
        output = cmd.output() => output.map_err(|source| CommandError::Spawn {
            program: program.clone(),
            source,
        })?,
        _ = token.cancelled() => return Err(CommandError::Cancelled),
    };

    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(CommandError::Exit {
            program,
            status: output.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_render_replaces_standalone_placeholder() {
        let template = CommandTemplate::new(["build", "-o", "{outpath}", "."]);
        let rendered = template.render(Path::new("/tmp/abc"));
        assert_eq!(rendered, ["build", "-o", "/tmp/abc", "."]);
    }

    #[test]
    fn test_render_ignores_embedded_placeholder() {
        let template = CommandTemplate::new(["build", "--out={outpath}"]);
        let rendered = template.render(Path::new("/tmp/abc"));
        assert_eq!(rendered, ["build", "--out={outpath}"]);
    }

    #[test]
    fn test_render_replaces_every_occurrence() {
        let template = CommandTemplate::new(["{outpath}", "--self", "{outpath}"]);
        let rendered = template.render(&PathBuf::from("out/bin"));
        assert_eq!(rendered, ["out/bin", "--self", "out/bin"]);
    }

    #[test]
    fn test_parse_splits_on_whitespace() {
        let template = CommandTemplate::parse("  go build   -o {outpath}\t./ ");
        assert_eq!(template.args(), ["go", "build", "-o", "{outpath}", "./"]);
        assert!(CommandTemplate::parse("   ").is_empty());
    }

    #[tokio::test]
    async fn test_run_empty_command() {
        let token = CancellationToken::new();
        let err = run(&[], Path::new("."), &[], &token).await.unwrap_err();
        assert!(matches!(err, CommandError::Empty));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_reports_exit_status() {
        let token = CancellationToken::new();
        let argv = vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()];
        let err = run(&argv, Path::new("."), &[], &token).await.unwrap_err();
        match err {
            CommandError::Exit { status, .. } => assert_eq!(status.code(), Some(3)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_cancellation_kills_child() {
        let token = CancellationToken::new();
        let argv = vec!["sleep".to_string(), "30".to_string()];
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            cancel.cancel();
        });
        let started = std::time::Instant::now();
        let err = run(&argv, Path::new("."), &[], &token).await.unwrap_err();
        assert!(err.is_cancellation());
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_captures_stdout() {
        let token = CancellationToken::new();
        let argv = vec!["echo".to_string(), "hello".to_string()];
        let stdout = output(&argv, Path::new("."), &token).await.unwrap();
        assert_eq!(stdout, b"hello\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_passes_environment() {
        let token = CancellationToken::new();
        let argv = vec![
            "sh".to_string(),
            "-c".to_string(),
            "test \"$RESPAWN_TEST_VAR\" = expected".to_string(),
        ];
        let env = vec![("RESPAWN_TEST_VAR".to_string(), OsString::from("expected"))];
        run(&argv, Path::new("."), &env, &token).await.unwrap();
    }
}
