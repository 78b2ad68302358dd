//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary with HOME pointed at a temp directory so
//! config writes never touch the real user config.

use std::process::Command;

use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &TempDir, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_timelock-cli"))
        .args(args)
        .env("HOME", home.path())
        .env_remove("TIMELOCK_ENV")
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).expect("stdout is not JSON")
}

#[test]
fn test_config_get_default() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(&home, &["config", "get", "timer.default_minutes"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "50");
}

#[test]
fn test_config_set_persists() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(&home, &["config", "set", "notifications.preset", "urgent"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "ok");

    let (stdout, _, _) = run_cli(&home, &["config", "get", "notifications.preset"]);
    assert_eq!(stdout.trim(), "urgent");
    assert!(home.path().join(".config/timelock/config.toml").exists());
}

#[test]
fn test_config_unknown_key_fails() {
    let home = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(&home, &["config", "get", "timer.nope"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));

    let (_, _, code) = run_cli(&home, &["config", "set", "timer.default_minutes", "soon"]);
    assert_eq!(code, 1);
}

#[test]
fn test_config_list_json() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(&home, &["config", "list", "--json"]);
    assert_eq!(code, 0);
    let config = json(&stdout);
    assert_eq!(config["notifications"]["channels"][0], "visual");
}

#[test]
fn test_presets_listed() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(&home, &["notify", "presets"]);
    assert_eq!(code, 0);
    let presets = json(&stdout);
    assert_eq!(presets.as_array().unwrap().len(), 4);
    assert_eq!(presets[0]["name"], "short");
    assert_eq!(presets[0]["total_ms"], 550);
}

#[test]
fn test_probe_simulated() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(&home, &["probe", "--simulate"]);
    assert_eq!(code, 0);
    let caps = json(&stdout);
    assert_eq!(caps["visual"], true);
    assert_eq!(caps["haptic"], true);
    assert_eq!(caps["torch"], true);
}

#[test]
fn test_notify_fire_simulated() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(
        &home,
        &["notify", "fire", "--simulate", "-c", "haptic,torch", "--pattern", "40,20,40"],
    );
    assert_eq!(code, 0);
    let summary = json(&stdout);
    assert_eq!(summary["reports"].as_array().unwrap().len(), 2);
    assert_eq!(summary["reports"][0]["outcome"], "completed");
    assert_eq!(summary["devices"]["vibrations"], serde_json::json!([40, 40]));
    assert_eq!(summary["devices"]["streams_released"], 1);
}

#[test]
fn test_notify_rejects_bad_pattern() {
    let home = TempDir::new().unwrap();
    let (_, _, code) = run_cli(&home, &["notify", "fire", "--simulate", "--pattern", "fast"]);
    assert_ne!(code, 0);
}

#[test]
fn test_timer_run_simulated() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(
        &home,
        &["timer", "run", "--seconds", "2", "--simulate", "-c", "visual", "-p", "short"],
    );
    assert_eq!(code, 0);
    let summary = json(&stdout);
    assert_eq!(summary["status"]["state"], "completed");
    assert_eq!(summary["status"]["elapsed_secs"], 2);
    assert_eq!(summary["reports"][0]["channel"], "visual");
    assert_eq!(summary["sessions"][0]["status"], "completed");
}

#[test]
fn test_timer_run_rejects_zero_length() {
    let home = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(&home, &["timer", "run", "--seconds", "0", "--simulate"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("at least one second"));
}

#[cfg(unix)]
#[test]
fn test_timer_run_interrupt_resets() {
    use std::io::{BufRead, BufReader, Read};
    use std::process::Stdio;

    let home = TempDir::new().unwrap();
    let mut child = Command::new(env!("CARGO_BIN_EXE_timelock-cli"))
        .args(["timer", "run", "--seconds", "60", "--simulate", "--events"])
        .env("HOME", home.path())
        .env_remove("TIMELOCK_ENV")
        .env("RUST_LOG", "off")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn CLI");

    let mut stdout = BufReader::new(child.stdout.take().unwrap());
    let mut started = String::new();
    stdout.read_line(&mut started).unwrap();
    assert_eq!(json(&started)["type"], "TimerStarted");

    std::thread::sleep(std::time::Duration::from_millis(200));
    let killed = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(killed.success());

    let mut rest = String::new();
    stdout.read_to_string(&mut rest).unwrap();
    let status = child.wait().unwrap();
    assert_eq!(status.code(), Some(0));

    let summary = json(&rest);
    assert_eq!(summary["status"]["state"], "idle");
    assert_eq!(summary["sessions"][0]["status"], "cancelled");
}

#[test]
fn test_completions_generated() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(&home, &["completions", "bash"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("timelock-cli"));
}
