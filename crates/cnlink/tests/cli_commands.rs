#![cfg(all(unix, feature = "cli"))]

use std::path::PathBuf;
use std::process::{Command, Output};

fn cnlink(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cnlink"))
        .arg("--log-level")
        .arg("error")
        .args(args)
        .env_remove("CNLINK_TTY")
        .env_remove("CNLINK_LOG")
        .output()
        .expect("cnlink should run")
}

fn missing_tty() -> PathBuf {
    PathBuf::from(format!(
        "/tmp/cnlink-missing-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ))
}

#[test]
fn version_prints_package_version() {
    let output = cnlink(&["version"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("cnlink {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn version_extended_lists_build_details() {
    let output = cnlink(&["version", "--extended"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("name: cnlink"));
    assert!(stdout.contains("default_baud: 500000"));
}

#[test]
fn unsupported_period_is_a_usage_error() {
    let tty = missing_tty();
    let output = cnlink(&[
        "consumption",
        tty.to_str().expect("utf-8 path"),
        "-p",
        "--period",
        "1000",
    ]);

    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsupported period 1000"));
}

#[test]
fn radio_period_out_of_range_is_a_usage_error() {
    let tty = missing_tty();
    let output = cnlink(&["radio", tty.to_str().expect("utf-8 path"), "--period", "600"]);

    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("radio period 600 ms"));
}

#[test]
fn monitor_rejects_zero_duration_before_opening() {
    let tty = missing_tty();
    let output = cnlink(&[
        "monitor",
        tty.to_str().expect("utf-8 path"),
        "-p",
        "--duration",
        "0s",
    ]);

    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn missing_device_is_a_transport_error() {
    let tty = missing_tty();
    let output = cnlink(&["start", tty.to_str().expect("utf-8 path")]);

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot open"));
}

#[test]
fn missing_tty_argument_is_rejected_by_clap() {
    let output = cnlink(&["reset-time"]);

    assert_eq!(output.status.code(), Some(2));
}
