//! Integration tests for configuration layering.
//!
//! Tests the full priority chain: hardcoded defaults < XDG config < project config < CLI args

#![allow(clippy::unwrap_used)] // Test code uses unwrap for brevity
#![allow(deprecated)] // cargo_bin deprecation warning

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use photo_cull_test_support::SyntheticImageBuilder;
use predicates::prelude::*;
use tempfile::TempDir;

/// Temp dir with a project config and one sharp PNG.
fn project(config: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(".photo-cull.toml"), config).unwrap();
    let image = SyntheticImageBuilder::checkerboard(400, 300, 8);
    let path = SyntheticImageBuilder::save(&image, dir.path(), "IMG_0001.png").unwrap();
    (dir, path)
}

fn photo_cull(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("photo-cull").unwrap();
    cmd.current_dir(dir.path()).arg("--quiet");
    cmd
}

#[test]
fn test_project_config_applies_format() {
    let (dir, path) = project(
        r"
[output]
format = 'json'

[backend]
enabled = false
",
    );

    let mut cmd = photo_cull(&dir);
    cmd.arg(&path);

    cmd.assert()
        .code(predicate::in_iter([0, 1]))
        .stdout(predicate::str::starts_with("{"));
}

#[test]
fn test_cli_overrides_project_config() {
    let (dir, path) = project(
        r"
[output]
format = 'json'
",
    );

    let mut cmd = photo_cull(&dir);
    cmd.arg("--format").arg("csv").arg("--no-ai").arg(&path);

    cmd.assert()
        .code(predicate::in_iter([0, 1]))
        .stdout(predicate::str::starts_with("Photo,Overall Score"));
}

#[test]
fn test_project_config_found_from_subdirectory() {
    let (dir, path) = project(
        r"
[scoring]
threshold = 0.0

[output]
format = 'json'
",
    );
    let nested = dir.path().join("exports").join("day-1");
    fs::create_dir_all(&nested).unwrap();

    let mut cmd = Command::cargo_bin("photo-cull").unwrap();
    cmd.current_dir(&nested).arg("--quiet").arg("--no-ai").arg(&path);

    cmd.assert()
        .code(0)
        .stdout(predicate::str::contains("\"passed\": true").or(predicate::str::contains("\"passed\":true")));
}

#[test]
fn test_config_threshold_is_overridden_by_flag() {
    let (dir, path) = project(
        r"
[scoring]
threshold = 1.0
",
    );

    // threshold 0.0 from the flag lets every scored photo pass
    let mut cmd = photo_cull(&dir);
    cmd.arg("--no-ai").arg("--threshold").arg("0.0").arg(&path);

    cmd.assert().code(0);
}

#[test]
fn test_invalid_config_value_warns_and_uses_default() {
    let (dir, path) = project(
        r"
[scoring]
threshold = 4.0

[batch]
batch_size = 0
",
    );

    let mut cmd = photo_cull(&dir);
    cmd.arg("--no-ai").arg(&path);

    cmd.assert()
        .code(predicate::in_iter([0, 1]))
        .stderr(predicate::str::contains("warning: scoring.threshold"))
        .stderr(predicate::str::contains("warning: batch.batch_size"));
}

#[test]
fn test_invalid_config_syntax_does_not_crash() {
    let (dir, path) = project("[scoring\nthreshold = ");

    let mut cmd = photo_cull(&dir);
    cmd.arg("--no-ai").arg(&path);

    cmd.assert().code(predicate::in_iter([0, 1]));
}

#[test]
fn test_config_output_file() {
    let (dir, path) = project(
        r"
[output]
format = 'json'
pretty = true
",
    );
    let report = dir.path().join("report.json");

    let mut cmd = photo_cull(&dir);
    cmd.arg("--no-ai").arg("--output").arg(&report).arg(&path);

    cmd.assert()
        .code(predicate::in_iter([0, 1]))
        .stdout(predicate::str::is_empty());

    let written = fs::read_to_string(&report).unwrap();
    assert!(written.contains("\n  \"summary\""));
}
