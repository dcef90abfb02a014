// Integration tests for CLI commands
// These run the built binary and never reach the Bot API.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const OVERRIDES: [&str; 7] = [
    "BOT_TOKEN",
    "ADMINS",
    "PORT",
    "DATA_FILE",
    "CHANNEL_ID",
    "CHANNEL_LINK",
    "CHANNEL_NAME",
];

fn timegate(args: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_timegate"));
    for key in OVERRIDES {
        command.env_remove(key);
    }
    command
        .args(args)
        .output()
        .expect("Failed to execute command")
}

fn init_config(dir: &Path) -> String {
    let config_path = dir.join("config.toml");
    let data_file = dir.join("members.json");
    let config_path = config_path.to_string_lossy().to_string();

    let output = timegate(&["init-config", "--output", &config_path]);
    assert!(output.status.success());

    // Point the data file inside the temp dir
    let contents = std::fs::read_to_string(&config_path).unwrap();
    let contents = contents
        .lines()
        .map(|line| {
            if line.starts_with("data_file") {
                format!("data_file = \"{}\"", data_file.display())
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    std::fs::write(&config_path, contents).unwrap();
    config_path
}

#[test]
fn test_cli_help() {
    let output = timegate(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("time-limited private channel access"));
    assert!(stdout.contains("run"));
    assert!(stdout.contains("status"));
    assert!(stdout.contains("init-config"));
    assert!(stdout.contains("version"));
}

#[test]
fn test_cli_version() {
    let output = timegate(&["version"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&format!("timegate {}", env!("CARGO_PKG_VERSION"))));
}

#[test]
fn test_init_config_refuses_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = init_config(temp_dir.path());

    let output = timegate(&["init-config", "--output", &config_path]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("already exists"));

    let output = timegate(&["init-config", "--output", &config_path, "--force"]);
    assert!(output.status.success());
}

#[test]
fn test_status_on_fresh_install() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = init_config(temp_dir.path());

    let output = timegate(&["status", "--config", &config_path]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Channels: 0  Members: 0  Pending: 0"));
    assert!(!temp_dir.path().join("members.json").exists());
}

#[test]
fn test_status_reads_channel_from_environment() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = init_config(temp_dir.path());

    let output = Command::new(env!("CARGO_BIN_EXE_timegate"))
        .args(["status", "--config", &config_path])
        .env_remove("DATA_FILE")
        .env("CHANNEL_ID", "-1001234567890")
        .env("CHANNEL_LINK", "https://t.me/+abc")
        .env("CHANNEL_NAME", "VIP")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("VIP (-1001234567890)"));
}

#[test]
fn test_run_without_token_fails() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = init_config(temp_dir.path());

    let output = timegate(&["run", "--config", &config_path]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("BOT_TOKEN"));
}

#[test]
fn test_run_with_missing_config() {
    let output = timegate(&["run", "--config", "/nonexistent/timegate.toml"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_invalid_command() {
    let output = timegate(&["register"]);

    assert!(!output.status.success());
}
