//! Integration tests for the `fieldmon` CLI binary.
//!
//! The offline tests cover argument parsing, help, completions and config
//! handling. The gateway tests run a scripted tokio-tungstenite server on
//! an ephemeral port and drive the real binary against it.
#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;

use assert_cmd::cargo::cargo_bin_cmd;
use futures_util::{SinkExt, StreamExt};
use predicates::prelude::*;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio_tungstenite::tungstenite::Message;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `fieldmon` binary with env isolation.
///
/// Clears all `FIELDMON_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn fieldmon_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("fieldmon");
    cmd.env("HOME", "/tmp/fieldmon-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/fieldmon-cli-test-nonexistent")
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("FIELDMON_PROFILE")
        .env_remove("FIELDMON_GATEWAY")
        .env_remove("FIELDMON_CONFIG")
        .env_remove("FIELDMON_OUTPUT")
        .env_remove("FIELDMON_HANDSHAKE_TIMEOUT");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

const SAMPLE_CONFIG: &str = r#"
default_profile = "plant"

[defaults]
interval = 2.0

[profiles.plant]
gateway = "https://gw.example.com:8443"
device_id = "pump-1"

[profiles.line]
gateway = "http://10.0.0.5:8000"
device_ids = ["a", "b"]
parameters = ["flow"]
"#;

fn write_config(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, SAMPLE_CONFIG).unwrap();
    path
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = fieldmon_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    fieldmon_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("watch")
            .and(predicate::str::contains("write"))
            .and(predicate::str::contains("ping"))
            .and(predicate::str::contains("--handshake-timeout")),
    );
}

#[test]
fn test_version_flag() {
    fieldmon_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fieldmon"));
}

#[test]
fn test_completions_zsh() {
    fieldmon_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_invalid_subcommand() {
    let output = fieldmon_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(text.contains("foobar"), "Expected error naming the subcommand:\n{text}");
}

// ── Offline target resolution ───────────────────────────────────────

#[test]
fn test_url_from_default_profile() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir);
    fieldmon_cmd()
        .arg("--config")
        .arg(&path)
        .arg("url")
        .assert()
        .success()
        .stdout("wss://gw.example.com:8443/api/monitoring/device/pump-1?interval=2\n");
}

#[test]
fn test_url_multi_profile_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir);
    let output = fieldmon_cmd()
        .arg("--config")
        .arg(&path)
        .args(["-p", "line", "-o", "json", "url"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let doc: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["profile"], "line");
    assert_eq!(doc["mode"], "multiple");
    assert_eq!(
        doc["url"],
        "ws://10.0.0.5:8000/api/monitoring/devices?device_ids=a,b&interval=2&parameters=flow"
    );
}

#[test]
fn test_url_from_flags_only() {
    fieldmon_cmd()
        .args(["-g", "http://gw:8000", "-d", "7", "-i", "0.5", "url"])
        .assert()
        .success()
        .stdout("ws://gw:8000/api/monitoring/device/7?interval=0.5\n");
}

#[test]
fn test_url_without_gateway() {
    fieldmon_cmd()
        .args(["-d", "7", "url"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No gateway configured"));
}

#[test]
fn test_url_unknown_profile() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir);
    let output = fieldmon_cmd()
        .arg("--config")
        .arg(&path)
        .args(["-p", "lab", "url"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    let text = combined_output(&output);
    assert!(text.contains("line, plant"), "Expected available profiles:\n{text}");
}

#[test]
fn test_url_rejects_bad_interval() {
    let output = fieldmon_cmd()
        .args(["-g", "http://gw", "-d", "7", "-i", "0", "url"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_config_path_honors_flag() {
    fieldmon_cmd()
        .args(["--config", "/tmp/somewhere/fieldmon.toml", "config", "path"])
        .assert()
        .success()
        .stdout("/tmp/somewhere/fieldmon.toml\n");
}

#[test]
fn test_config_show_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir);
    fieldmon_cmd()
        .arg("--config")
        .arg(&path)
        .args(["-o", "yaml", "config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("default_profile: plant")
                .and(predicate::str::contains("gateway: http://10.0.0.5:8000")),
        );
}

#[test]
fn test_config_show_without_file() {
    fieldmon_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default_profile = \"default\""));
}

#[test]
fn test_ping_help_notes_uncorrelated_pongs() {
    fieldmon_cmd()
        .args(["ping", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("heartbeat"));
}

#[test]
fn test_config_add_then_use() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    fieldmon_cmd()
        .arg("--config")
        .arg(&path)
        .args(["-g", "http://10.1.1.1:8000", "-d", "m1,m2", "config", "add", "mill"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Saved profile 'mill'"));

    fieldmon_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "use", "mill"])
        .assert()
        .success();

    let saved = std::fs::read_to_string(&path).unwrap();
    assert!(saved.contains("default_profile = \"mill\""), "{saved}");
    assert!(saved.contains("[profiles.mill]"), "{saved}");

    // The saved profile now drives commands without flags.
    fieldmon_cmd()
        .arg("--config")
        .arg(&path)
        .arg("url")
        .assert()
        .success()
        .stdout("ws://10.1.1.1:8000/api/monitoring/devices?device_ids=m1,m2&interval=1\n");

    let output = fieldmon_cmd()
        .arg("--config")
        .arg(&path)
        .args(["-o", "json", "config", "profiles"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let rows: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows[0]["name"], "mill");
    assert_eq!(rows[0]["devices"], "m1,m2");
    assert_eq!(rows[0]["default"], true);
}

#[test]
fn test_config_add_requires_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let output = fieldmon_cmd()
        .arg("--config")
        .arg(&path)
        .args(["-d", "x", "config", "add", "lab"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(!path.exists(), "nothing saved on a rejected profile");
}

#[test]
fn test_config_use_unknown_profile() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir);
    let output = fieldmon_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "use", "lab"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("line, plant"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), SAMPLE_CONFIG);
}

// ── Scripted gateway ────────────────────────────────────────────────

/// What the fake gateway does once a client connects.
#[derive(Clone, Copy)]
enum Script {
    /// Handshake, one data frame, then answer pings and writes.
    Normal,
    /// Handshake followed by a critical error frame.
    Unhealthy,
    /// Accept the socket but never send the handshake.
    Silent,
}

fn gateway(script: Script) -> (Runtime, SocketAddr) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();
    let listener = rt.block_on(TcpListener::bind("127.0.0.1:0")).unwrap();
    let addr = listener.local_addr().unwrap();
    rt.spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                run_script(ws, script).await;
            });
        }
    });
    (rt, addr)
}

async fn run_script(
    mut ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    script: Script,
) {
    let send = |v: Value| Message::text(v.to_string());
    if !matches!(script, Script::Silent) {
        let hello = json!({ "type": "connected", "device_ids": ["pump-1"] });
        if ws.send(send(hello)).await.is_err() {
            return;
        }
    }
    match script {
        Script::Normal => {
            let data = json!({
                "type": "data",
                "device_id": "pump-1",
                "timestamp": "2026-01-01T00:00:00Z",
                "data": { "flow": { "value": 12.5, "unit": "l/s", "quality": "good" } }
            });
            let _ = ws.send(send(data)).await;
        }
        Script::Unhealthy => {
            let err = json!({
                "type": "error",
                "code": "DEVICE_UNHEALTHY",
                "message": "pump-1 stopped responding"
            });
            let _ = ws.send(send(err)).await;
        }
        Script::Silent => {}
    }

    while let Some(Ok(msg)) = ws.next().await {
        let Message::Text(text) = msg else { continue };
        let Ok(cmd) = serde_json::from_str::<Value>(text.as_str()) else {
            continue;
        };
        let reply = match cmd["action"].as_str() {
            Some("ping") => json!({ "type": "pong", "data": { "sentAt": cmd["data"]["sentAt"] } }),
            Some("write") => {
                let value = cmd["data"]["value"].clone();
                let accepted = value.as_f64().is_some_and(|v| v <= 100.0);
                let (message, new_value) = if accepted {
                    ("applied", value.clone())
                } else {
                    ("out of range", Value::Null)
                };
                json!({
                    "type": "write_result",
                    "device_id": "pump-1",
                    "parameter": cmd["data"]["parameter"],
                    "value": value,
                    "success": accepted,
                    "message": message,
                    "new_value": new_value,
                })
            }
            _ => continue,
        };
        if ws.send(send(reply)).await.is_err() {
            return;
        }
    }
}

fn gateway_cmd(addr: SocketAddr) -> assert_cmd::Command {
    let mut cmd = fieldmon_cmd();
    cmd.args(["-g", &format!("http://{addr}"), "-d", "pump-1"])
        .env("FIELDMON_HANDSHAKE_TIMEOUT", "3");
    cmd
}

#[test]
fn test_watch_streams_json_lines() {
    let (_rt, addr) = gateway(Script::Normal);
    let output = gateway_cmd(addr)
        .args(["-o", "json-compact", "watch", "--count", "1"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let line = String::from_utf8_lossy(&output.stdout);
    let snap: Value = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(snap["device_id"], "pump-1");
    assert_eq!(snap["parameters"]["flow"]["value"], 12.5);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[success] Connected to device(s) pump-1"), "{stderr}");
}

#[test]
fn test_watch_table_output() {
    let (_rt, addr) = gateway(Script::Normal);
    gateway_cmd(addr)
        .args(["watch", "-n", "1"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Parameter")
                .and(predicate::str::contains("12.5 l/s"))
                .and(predicate::str::contains("good")),
        );
}

#[test]
fn test_watch_critical_error_ends_session() {
    let (_rt, addr) = gateway(Script::Unhealthy);
    let output = gateway_cmd(addr).arg("watch").output().unwrap();
    assert_eq!(output.status.code(), Some(7));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Device unhealthy"), "{stderr}");
    assert!(stderr.contains("pump-1 stopped responding"), "{stderr}");
}

#[test]
fn test_write_accepted() {
    let (_rt, addr) = gateway(Script::Normal);
    gateway_cmd(addr)
        .args(["write", "setpoint", "42"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Parameter:  setpoint")
                .and(predicate::str::contains("New value:  42"))
                .and(predicate::str::contains("Result:     ok")),
        );
}

#[test]
fn test_write_rejected() {
    let (_rt, addr) = gateway(Script::Normal);
    let output = gateway_cmd(addr)
        .args(["-o", "json", "write", "setpoint", "250"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(6));
    let doc: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["success"], false);
    assert_eq!(doc["message"], "out of range");
}

#[test]
fn test_ping_reports_round_trips() {
    let (_rt, addr) = gateway(Script::Normal);
    let output = gateway_cmd(addr)
        .args(["-o", "json", "ping", "-n", "2"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let replies: Vec<Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[1]["seq"], 2);
    assert!(replies[0]["rtt_ms"].as_i64().unwrap() >= 0);
}

#[test]
fn test_handshake_timeout() {
    let (_rt, addr) = gateway(Script::Silent);
    let output = gateway_cmd(addr)
        .args(["--handshake-timeout", "1", "ping"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(8));
    assert!(combined_output(&output).contains("handshake"));
}

#[test]
fn test_connection_refused() {
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let output = gateway_cmd(addr).arg("ping").output().unwrap();
    assert_eq!(output.status.code(), Some(7));
    assert!(combined_output(&output).contains("Connection failed"));
}
