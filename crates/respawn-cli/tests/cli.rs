//! End-to-end tests of the respawn binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const ROUTES_JSON: &str = concat!(
    r#"{"paths":[{"method":"GET","path":"/ping"},"#,
    r#"{"method":"POST","path":"/users/{id}"}]}"#,
);

fn respawn(dir: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_respawn"));
    cmd.current_dir(dir.path())
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let temp = TempDir::new().unwrap();
    respawn(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("routes"));
}

#[test]
fn test_routes_prints_table() {
    let temp = TempDir::new().unwrap();
    respawn(&temp)
        .args(["--no-color", "routes", "--routes-command"])
        .arg(format!("echo {ROUTES_JSON}"))
        .assert()
        .success()
        .stdout(predicate::str::contains("/ping"))
        .stdout(predicate::str::contains("/users/{id}"))
        .stdout(predicate::str::contains("POST"));
}

#[test]
fn test_routes_json_output() {
    let temp = TempDir::new().unwrap();
    let output = respawn(&temp)
        .args(["routes", "--json", "--routes-command"])
        .arg(format!("echo {ROUTES_JSON}"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let document: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(document["paths"][0]["method"], "GET");
    assert_eq!(document["paths"][1]["path"], "/users/{id}");
}

#[test]
fn test_routes_reads_config_file() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("respawn.toml"),
        format!("routes-command = [\"echo\", '{ROUTES_JSON}']\n"),
    )
    .unwrap();

    respawn(&temp)
        .args(["routes", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/ping"));
}

#[test]
fn test_routes_discovery_failure() {
    let temp = TempDir::new().unwrap();
    respawn(&temp)
        .args(["routes", "--routes-command", "false"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("route discovery"));
}

#[test]
fn test_missing_config_file() {
    let temp = TempDir::new().unwrap();
    respawn(&temp)
        .args(["run", "--config", "nope.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn test_invalid_extension_is_rejected() {
    let temp = TempDir::new().unwrap();
    respawn(&temp)
        .args(["run", "--ext", "go"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid value for 'exts'"));
}

#[test]
fn test_unknown_config_key_is_rejected() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("respawn.toml"), "extensions = [\".go\"]\n").unwrap();
    respawn(&temp)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_missing_watch_root_fails_startup() {
    let temp = TempDir::new().unwrap();
    respawn(&temp)
        .args(["run", "--dir", "missing/...", "--build", "true", "--exec", "true"])
        .arg("--temp-dir")
        .arg(temp.path().join("tmp"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing"));
}

#[cfg(unix)]
#[test]
fn test_run_stops_on_sigterm() {
    use std::process::{Command as StdCommand, Stdio};
    use std::time::{Duration, Instant};

    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("tmp")).unwrap();
    fs::write(temp.path().join("main.src"), "v1\n").unwrap();

    let mut child = StdCommand::new(env!("CARGO_BIN_EXE_respawn"))
        .current_dir(temp.path())
        .env("NO_COLOR", "1")
        .args([
            "run",
            "--ext",
            ".src",
            "--dir",
            "./",
            "--ignore-dir",
            "tmp",
            "--temp-dir",
            "tmp",
            "--build",
            "touch {outpath}",
            "--exec",
            "sleep 30",
        ])
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    // Let the first generation start.
    std::thread::sleep(Duration::from_millis(1000));
    let status = StdCommand::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        assert!(Instant::now() < deadline, "respawn did not stop after SIGTERM");
        std::thread::sleep(Duration::from_millis(50));
    };
    let output = child.wait_with_output().unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(status.success(), "exit status {status}, stderr:\n{stderr}");
    assert!(stderr.contains("Starting generation"), "stderr:\n{stderr}");
    assert!(stderr.contains("Stopped"), "stderr:\n{stderr}");
    // The retired generation's binary is removed.
    assert_eq!(fs::read_dir(temp.path().join("tmp")).unwrap().count(), 0);
}
