//! CLI integration tests.
//!
//! These tests verify the CLI argument parsing and configuration loading.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

use shell_channel::cli::{parse_args_from, Args};
use shell_channel::config::Config;
use shell_channel::ShellKind;

fn args(args: &[&str]) -> Vec<OsString> {
    std::iter::once("shell-channel")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect()
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_cli_defaults() {
    let result = parse_args_from(args(&[])).unwrap();

    assert!(result.shell.is_none());
    assert!(result.config.is_none());
    assert!(result.engine.is_none());
    assert!(!result.cleanup);
    assert!(!result.run);
    assert!(!result.follow);
    assert!(result.tokens.is_empty());
}

#[test]
fn test_cli_full_options() {
    let result = parse_args_from(args(&[
        "-s",
        "sh",
        "-e",
        "podman",
        "--cleanup",
        "--run",
        "-l",
        "debug",
        "podman",
        "run",
        "-d",
        "alpine",
    ]))
    .unwrap();

    assert_eq!(result.shell, Some(ShellKind::Sh));
    assert_eq!(result.engine, Some("podman".to_string()));
    assert!(result.cleanup);
    assert!(result.run);
    assert_eq!(result.log_level, Some("debug".to_string()));
    assert_eq!(result.tokens, vec!["podman", "run", "-d", "alpine"]);
}

#[test]
fn test_cli_command_flags_are_not_parsed() {
    let result = parse_args_from(args(&["docker", "logs", "-f", "--tail", "10", "db"])).unwrap();

    assert!(!result.follow);
    assert_eq!(result.tokens, vec!["docker", "logs", "-f", "--tail", "10", "db"]);
}

#[test]
fn test_cli_follow_with_timeout() {
    let result = parse_args_from(args(&[
        "--follow",
        "--look-for",
        "listening on",
        "--timeout",
        "2000",
        "docker",
        "logs",
        "-f",
        "web",
    ]))
    .unwrap();

    assert!(result.follow);
    assert_eq!(result.look_for, Some("listening on".to_string()));
    assert_eq!(result.timeout, Some(Duration::from_millis(2000)));
}

#[test]
fn test_cli_config_file() {
    let result = parse_args_from(args(&["-c", "/etc/shell-channel.json"])).unwrap();

    assert!(result.config.is_some());
    assert_eq!(
        result.config.unwrap().to_str().unwrap(),
        "/etc/shell-channel.json"
    );
}

#[test]
fn test_cli_invalid_shell() {
    let result = parse_args_from(args(&["--shell", "fish"]));
    assert!(result.is_err());
}

#[test]
fn test_cli_invalid_timeout() {
    let result = parse_args_from(args(&["--look-for", "x", "--timeout", "-5"]));
    assert!(result.is_err());
}

// ============================================================================
// Configuration Loading Tests
// ============================================================================

#[test]
fn test_config_from_json_file() {
    let json = r#"{
        "shell": {
            "kind": "bash",
            "path": "/opt/bash/bin/bash"
        },
        "channel": {
            "cleanup_on_close": true,
            "max_reads": 200,
            "engine": "podman",
            "exit_grace_ms": 1500
        },
        "logging": {
            "level": "debug"
        }
    }"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.shell.kind, ShellKind::Bash);
    assert_eq!(config.shell.path, Some(PathBuf::from("/opt/bash/bin/bash")));
    assert!(config.channel.cleanup_on_close);
    assert_eq!(config.channel.max_reads, 200);
    assert_eq!(config.channel.engine, "podman");
    assert_eq!(config.channel.exit_grace_ms, 1500);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_config_priority_cli_over_file() {
    let json = r#"{
        "shell": { "kind": "bash" },
        "channel": { "engine": "podman" }
    }"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let args = Args {
        shell: Some(ShellKind::Sh),
        engine: Some("nerdctl".to_string()),
        config: Some(file.path().to_path_buf()),
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();

    assert_eq!(config.shell.kind, ShellKind::Sh);
    assert_eq!(config.channel.engine, "nerdctl");
}

#[test]
fn test_config_cleanup_flag_enables() {
    let args = Args {
        cleanup: true,
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();

    assert!(config.channel.cleanup_on_close);
    assert!(config.to_channel_config().cleanup_on_close);
}

#[test]
fn test_config_missing_file_fails() {
    let args = Args {
        config: Some(PathBuf::from("/nonexistent/shell-channel.json")),
        ..Args::default()
    };

    assert!(Config::load(&args).is_err());
}

#[test]
fn test_config_to_channel_config() {
    let json = r#"{
        "shell": { "kind": "sh", "path": "/bin/sh" },
        "channel": { "max_reads": 64, "exit_grace_ms": 10 }
    }"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let config = Config::from_file(file.path()).unwrap();
    let channel = config.to_channel_config();

    assert_eq!(channel.shell.kind, ShellKind::Sh);
    assert_eq!(channel.shell.path, Some(PathBuf::from("/bin/sh")));
    assert_eq!(channel.max_reads, 64);
    assert_eq!(channel.exit_grace, Duration::from_millis(10));
}

// ============================================================================
// Configuration Serialization Tests
// ============================================================================

#[test]
fn test_config_roundtrip() {
    let original = Config::default();
    let json = serde_json::to_string(&original).unwrap();
    let loaded: Config = serde_json::from_str(&json).unwrap();

    assert_eq!(original.shell.kind, loaded.shell.kind);
    assert_eq!(original.channel.engine, loaded.channel.engine);
    assert_eq!(original.channel.max_reads, loaded.channel.max_reads);
}

#[test]
fn test_config_partial_deserialization() {
    let json = r#"{"channel": {"engine": "podman"}}"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.channel.engine, "podman");
    assert_eq!(config.channel.max_reads, 1000); // Default
    assert_eq!(config.shell.kind, ShellKind::Default); // Default
}
