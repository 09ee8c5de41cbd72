// netcheck/tests/cli_integration.rs

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::net::TcpListener;
use tempfile::TempDir;

/// A `netcheck` command that sees no user config files or NETCHECK_* vars.
fn netcheck(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("netcheck").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env_remove("NETCHECK_TIMEOUT")
        .env_remove("NETCHECK_METHOD")
        .env_remove("NETCHECK_CACHE_DIR")
        .env_remove("NETCHECK_CACHE_MAX_AGE")
        .env_remove("NETCHECK_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[test]
fn test_help_shows_flags() {
    let home = TempDir::new().unwrap();
    netcheck(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--remote"))
        .stdout(predicate::str::contains("--local"))
        .stdout(predicate::str::contains("--domain"))
        .stdout(predicate::str::contains("--rdap"))
        .stdout(predicate::str::contains("--whois"))
        .stdout(predicate::str::contains("--timeout"));
}

#[test]
fn test_no_mode_prints_usage() {
    let home = TempDir::new().unwrap();
    netcheck(&home)
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("netcheck -r <host:port>"));
}

#[test]
fn test_remote_invalid_address() {
    let home = TempDir::new().unwrap();
    netcheck(&home)
        .args(["-r", "localhost"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Invalid address format"));
}

#[test]
fn test_remote_open_port() {
    let home = TempDir::new().unwrap();
    // The kernel completes the handshake from the backlog without accept().
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();

    netcheck(&home)
        .args(["-r", &address])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Port {} is OPEN", address)));
}

#[test]
fn test_remote_closed_port() {
    let home = TempDir::new().unwrap();
    let address = format!("127.0.0.1:{}", closed_port());

    netcheck(&home)
        .args(["-r", &address])
        .assert()
        .success()
        .stdout(predicate::str::contains("CLOSED (connection refused)"));
}

#[test]
fn test_remote_json_output() {
    let home = TempDir::new().unwrap();
    let address = format!("127.0.0.1:{}", closed_port());

    let output = netcheck(&home).args(["-r", &address, "--json"]).output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["address"], address);
    assert_eq!(json["is_open"], false);
    assert_eq!(json["error_type"], "refused");
}

#[cfg(target_os = "linux")]
#[test]
fn test_local_json_lists_bound_listener() {
    let home = TempDir::new().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let output = netcheck(&home).args(["-l", "--json"]).output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let ports = json.as_array().unwrap();
    assert!(ports
        .iter()
        .any(|p| p["port"] == port && p["ip"] == "127.0.0.1" && p["protocol"] == "tcp"));
}

#[test]
fn test_modes_conflict() {
    let home = TempDir::new().unwrap();
    netcheck(&home)
        .args(["-l", "-d", "example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_domain_without_tld_fails() {
    let home = TempDir::new().unwrap();
    netcheck(&home)
        .args(["-d", "localhost"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid domain 'localhost'"));
}

#[test]
fn test_invalid_timeout_fails() {
    let home = TempDir::new().unwrap();
    netcheck(&home)
        .args(["-r", "127.0.0.1:80", "-t", "whenever"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid timeout 'whenever'"));
}

#[test]
fn test_explicit_missing_config_fails() {
    let home = TempDir::new().unwrap();
    netcheck(&home)
        .args(["--config", "does-not-exist.toml", "-r", "127.0.0.1:80"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
fn test_invalid_local_config_fails() {
    let home = TempDir::new().unwrap();
    fs::write(home.path().join("netcheck.toml"), "[defaults]\nmethod = \"dns\"\n").unwrap();

    netcheck(&home)
        .args(["-r", "localhost"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown lookup method 'dns'"));
}

#[test]
fn test_invalid_env_value_is_warned_and_ignored() {
    let home = TempDir::new().unwrap();
    netcheck(&home)
        .env("NETCHECK_TIMEOUT", "eventually")
        .args(["-r", "localhost"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Invalid address format"))
        .stderr(predicate::str::contains("Invalid NETCHECK_TIMEOUT='eventually'"));
}

#[test]
#[ignore] // Requires network access
fn test_domain_lookup_over_rdap() {
    let home = TempDir::new().unwrap();
    netcheck(&home)
        .env("NETCHECK_CACHE_DIR", home.path().join("cache"))
        .args(["-d", "example.com", "--rdap", "-t", "10s"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"ldhName\""));
}
