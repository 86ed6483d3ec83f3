use assert_cmd::Command;
use predicates::str::contains;

const SMALL_SCENARIO: &str = r#"
[timing]
quantum_secs = 0.001

[observer]
delay_quanta = 0.0

[[lanes]]
tasks = [{ actor = "Bob", feature = "F1", commits = 2 }]
"#;

fn mergeplay() -> Command {
    let mut cmd = Command::cargo_bin("mergeplay").expect("binary");
    cmd.env_remove("MERGEPLAY_CONFIG")
        .env_remove("MERGEPLAY_EVENTS")
        .env_remove("MERGEPLAY_PLAY_DIR");
    cmd
}

#[test]
fn mergeplay_help_works() {
    mergeplay()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("Concurrent developer workflow simulator"));
}

#[test]
fn subcommand_help_works() {
    for cmd in ["run", "scenario"] {
        mergeplay().arg(cmd).arg("--help").assert().success();
    }
}

#[test]
fn scenario_prints_builtin_lanes_as_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = mergeplay()
        .current_dir(dir.path())
        .args(["scenario", "--json"])
        .output()
        .expect("run scenario");
    assert!(output.status.success());

    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(payload["schema_version"], "mergeplay.v1");
    assert_eq!(payload["command"], "scenario");
    assert_eq!(payload["status"], "success");
    let lanes = payload["data"]["lanes"].as_array().expect("lanes");
    assert_eq!(lanes.len(), 4);
    assert_eq!(lanes[3]["tasks"][1]["feature"], "F3");
}

#[test]
fn run_small_scenario_reports_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("mergeplay.toml");
    std::fs::write(&config, SMALL_SCENARIO).expect("write config");
    let play_dir = dir.path().join("play");

    let output = mergeplay()
        .arg("--config")
        .arg(&config)
        .args(["--json", "run", "--play-dir"])
        .arg(&play_dir)
        .output()
        .expect("run mergeplay");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(payload["command"], "run");
    assert_eq!(payload["status"], "success");
    let history = payload["data"]["remote_summary"]["history"]["master"]
        .as_array()
        .expect("master history");
    assert_eq!(history[0]["summary"], "add F1");
    assert!(play_dir.join("repo").exists());
    assert!(play_dir.join("repo-admin").exists());
}

#[test]
fn run_writes_events_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("mergeplay.toml");
    std::fs::write(&config, SMALL_SCENARIO).expect("write config");
    let events = dir.path().join("events.jsonl");

    mergeplay()
        .arg("--config")
        .arg(&config)
        .arg("--events")
        .arg(&events)
        .args(["--quiet", "run", "--no-rebase", "--play-dir"])
        .arg(dir.path().join("play"))
        .assert()
        .success();

    let contents = std::fs::read_to_string(&events).expect("events file");
    let kinds: Vec<String> = contents
        .lines()
        .map(|line| {
            let event: serde_json::Value = serde_json::from_str(line).expect("event json");
            assert_eq!(event["schema_version"], "mergeplay.event.v1");
            event["event"].as_str().expect("event name").to_string()
        })
        .collect();
    assert_eq!(kinds.first().map(String::as_str), Some("scenario_started"));
    assert_eq!(kinds.last().map(String::as_str), Some("scenario_finished"));
    assert!(kinds.iter().any(|kind| kind == "view_refreshed"));
}

#[test]
fn run_into_existing_target_exits_with_user_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("mergeplay.toml");
    std::fs::write(&config, SMALL_SCENARIO).expect("write config");
    let play_dir = dir.path().join("play");
    std::fs::create_dir_all(play_dir.join("repo")).expect("create target");

    let output = mergeplay()
        .arg("--config")
        .arg(&config)
        .args(["--json", "run", "--play-dir"])
        .arg(&play_dir)
        .output()
        .expect("run mergeplay");
    assert_eq!(output.status.code(), Some(2));

    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["error"]["code"], 2);
}

#[test]
fn invalid_feature_makes_run_fail_with_partial_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("mergeplay.toml");
    std::fs::write(
        &config,
        r#"
[timing]
quantum_secs = 0.0

[[lanes]]
tasks = [{ actor = "Bob", feature = "bad name", commits = 1 }]
"#,
    )
    .expect("write config");

    mergeplay()
        .arg("--config")
        .arg(&config)
        .args(["run", "--play-dir"])
        .arg(dir.path().join("play"))
        .assert()
        .code(4)
        .stdout(contains("bad name"));
}

#[test]
fn manual_interaction_keeps_json_stdout_clean() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("mergeplay.toml");
    std::fs::write(&config, SMALL_SCENARIO).expect("write config");

    let output = mergeplay()
        .arg("--config")
        .arg(&config)
        .args(["--json", "run", "--interaction", "manual", "--play-dir"])
        .arg(dir.path().join("play"))
        .write_stdin("\n\n\n")
        .output()
        .expect("run mergeplay");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(payload["status"], "success");
    assert!(String::from_utf8_lossy(&output.stderr).contains("press enter to continue"));
}

#[test]
fn oversized_delay_quanta_is_a_user_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    mergeplay()
        .current_dir(dir.path())
        .args(["run", "--delay-quanta", "1e30", "--play-dir"])
        .arg(dir.path().join("play"))
        .assert()
        .code(2)
        .stderr(contains("delay_quanta"));
    assert!(!dir.path().join("play").exists());
}

#[test]
fn unknown_strategy_is_a_user_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    mergeplay()
        .current_dir(dir.path())
        .args(["run", "--strategy", "squash", "--play-dir"])
        .arg(dir.path().join("play"))
        .assert()
        .code(2);
}
