#![cfg(unix)]

//! CLI end-to-end tests
//!
//! Tests for the deskgif command-line interface. Tools are replaced by
//! scripts referenced from a generated config file.

mod common;

use assert_cmd::prelude::*;
use common::{Harness, FAKE_GIFSICLE, WRITE_LAST};
use predicates::prelude::*;
use std::fs;
use std::process::Command;

/// Get a command for the deskgif binary
#[allow(deprecated)]
fn deskgif_cmd() -> Command {
    Command::cargo_bin("deskgif").unwrap()
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = deskgif_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_flag() {
    let mut cmd = deskgif_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("deskgif"));
}

#[test]
fn test_cli_ops_lists_operations() {
    let mut cmd = deskgif_cmd();
    cmd.arg("ops").assert().success().stdout(
        predicate::str::contains("convert")
            .and(predicate::str::contains("optimize"))
            .and(predicate::str::contains("frames")),
    );
}

#[test]
fn test_cli_check_tools_command() {
    let h = Harness::new();
    let config = h.config_file(WRITE_LAST, WRITE_LAST);
    let mut cmd = deskgif_cmd();
    cmd.arg("--config")
        .arg(&config)
        .arg("check-tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("ffmpeg").and(predicate::str::contains("gifsicle")));
}

#[test]
fn test_cli_unknown_operation_exit_code() {
    let h = Harness::new();
    let config = h.config_file(WRITE_LAST, WRITE_LAST);
    let source = h.source("a.gif");
    let mut cmd = deskgif_cmd();
    cmd.arg("--config")
        .arg(&config)
        .args(["run", "sharpen"])
        .arg(&source)
        .arg(h.work.path().join("b.gif"))
        .assert()
        .code(6)
        .stderr(predicate::str::contains("operation"));
}

#[test]
fn test_cli_missing_input_is_validation_error() {
    let h = Harness::new();
    let config = h.config_file(WRITE_LAST, WRITE_LAST);
    let mut cmd = deskgif_cmd();
    cmd.arg("--config")
        .arg(&config)
        .args(["run", "optimize"])
        .arg(h.work.path().join("missing.gif"))
        .arg(h.work.path().join("out.gif"))
        .assert()
        .code(2);
}

#[test]
fn test_cli_settings_must_be_object() {
    let h = Harness::new();
    let config = h.config_file(WRITE_LAST, WRITE_LAST);
    let source = h.source("a.gif");
    let mut cmd = deskgif_cmd();
    cmd.arg("--config")
        .arg(&config)
        .args(["run", "optimize"])
        .arg(&source)
        .arg(h.work.path().join("out.gif"))
        .args(["--settings", "[1,2,3]"])
        .assert()
        .code(2);
}

#[test]
fn test_cli_run_optimize_writes_output() {
    let h = Harness::new();
    let config = h.config_file(WRITE_LAST, WRITE_LAST);
    let source = h.source("a.gif");
    let dest = h.work.path().join("a_optimized.gif");
    let mut cmd = deskgif_cmd();
    cmd.arg("--config")
        .arg(&config)
        .args(["run", "optimize"])
        .arg(&source)
        .arg(&dest)
        .args(["--settings", r#"{"compressionLevel": 30}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("a_optimized.gif"))
        .stderr(predicate::str::contains("100%"));

    assert_eq!(fs::read_to_string(&dest).unwrap(), "fake output");
    assert!(h.scratch_entries().is_empty());
}

#[test]
fn test_cli_tool_failure_exit_code() {
    let h = Harness::new();
    let config = h.config_file(WRITE_LAST, &common::failing("gifsicle: corrupt"));
    let source = h.source("a.gif");
    let mut cmd = deskgif_cmd();
    cmd.arg("--config")
        .arg(&config)
        .args(["run", "optimize"])
        .arg(&source)
        .arg(h.work.path().join("out.gif"))
        .assert()
        .code(3)
        .stderr(predicate::str::contains("corrupt"));
}

#[test]
fn test_cli_timeout_exit_code() {
    let h = Harness::new();
    let config = h.config_file(WRITE_LAST, &common::sleeping(5.0));
    let source = h.source("a.gif");
    let mut cmd = deskgif_cmd();
    cmd.arg("--config")
        .arg(&config)
        .args(["run", "optimize"])
        .arg(&source)
        .arg(h.work.path().join("out.gif"))
        .args(["--timeout-ms", "100"])
        .assert()
        .code(5);
}

#[test]
fn test_cli_frames_json() {
    let h = Harness::new();
    let thumbnails = "for last; do :; done\n\
dir=$(dirname \"$last\")\n\
printf 'a' > \"$dir/frame_001.png\"\n";
    let config = h.config_file(thumbnails, FAKE_GIFSICLE);
    let gif = h.source("loop.gif");
    let output = deskgif_cmd()
        .arg("--config")
        .arg(&config)
        .arg("frames")
        .arg(&gif)
        .arg("--json")
        .output()
        .unwrap();

    assert!(output.status.success());
    let frames: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let frames = frames.as_array().unwrap();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0]["thumbnail"], "YQ==");
    assert_eq!(frames[2]["thumbnail"], "");
    assert_eq!(frames[1]["delay_ms"], 200);
}

#[test]
fn test_cli_info_reports_frames() {
    let h = Harness::new();
    let config = h.config_file(WRITE_LAST, FAKE_GIFSICLE);
    let gif = h.source("loop.gif");
    let mut cmd = deskgif_cmd();
    cmd.arg("--config")
        .arg(&config)
        .arg("info")
        .arg(&gif)
        .assert()
        .success()
        .stdout(predicate::str::contains("Size: 12 bytes").and(predicate::str::contains("Frames: 3")));
}

#[test]
fn test_cli_sweep_removes_prefixed_files() {
    let h = Harness::new();
    let config = h.config_file(WRITE_LAST, WRITE_LAST);
    fs::write(h.scratch.path().join("DeskGif_1_ab.png"), b"x").unwrap();
    fs::write(h.scratch.path().join("keep.png"), b"x").unwrap();
    let mut cmd = deskgif_cmd();
    cmd.arg("--config")
        .arg(&config)
        .arg("sweep")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1"));
    assert_eq!(h.scratch_entries().len(), 1);
}

#[test]
fn test_cli_validate_valid_config() {
    let h = Harness::new();
    let config_path = h.work.path().join("config.json");
    fs::write(&config_path, r#"{"processing": {"timeout_ms": 45000}}"#).unwrap();

    let mut cmd = deskgif_cmd();
    cmd.arg("validate")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("valid").and(predicate::str::contains("45000")));
}

#[test]
fn test_cli_validate_invalid_config() {
    let h = Harness::new();
    let config_path = h.work.path().join("config.json");
    fs::write(&config_path, "{ not json").unwrap();

    let mut cmd = deskgif_cmd();
    cmd.arg("validate").arg(&config_path).assert().code(7);
}

#[test]
fn test_cli_validate_no_config_uses_defaults() {
    let mut cmd = deskgif_cmd();
    cmd.arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("defaults"));
}
