//! CLI integration tests for stampede
//!
//! These tests verify the CLI interface works correctly.

use assert_cmd::Command;
use predicates::prelude::*;

fn stampede() -> Command {
    Command::cargo_bin("stampede").unwrap()
}

mod help_and_version {
    use super::*;

    #[test]
    fn help_displays_usage() {
        stampede()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("load test"))
            .stdout(predicate::str::contains("run"))
            .stdout(predicate::str::contains("init"));
    }

    #[test]
    fn version_displays_version() {
        stampede()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn run_help_shows_options() {
        stampede()
            .args(["run", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--stage"))
            .stdout(predicate::str::contains("--threshold"))
            .stdout(predicate::str::contains("--think-time"))
            .stdout(predicate::str::contains("--fail-fast"));
    }

    #[test]
    fn init_help_shows_options() {
        stampede()
            .args(["init", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--output"))
            .stdout(predicate::str::contains("--url"));
    }
}

mod run_validation {
    use super::*;

    #[test]
    fn dry_run_shows_default_profile() {
        stampede()
            .args(["run", "--dry-run"])
            .assert()
            .success()
            .stderr(predicate::str::contains("Configuration validated"))
            .stderr(predicate::str::contains("http://localhost:8080"))
            .stderr(predicate::str::contains("Stages:      3 defined"))
            .stderr(predicate::str::contains("1. 10s -> 10 workers"))
            .stderr(predicate::str::contains("3. 5s -> 0 workers"))
            .stderr(predicate::str::contains("p95_latency_ms < 300"))
            .stderr(predicate::str::contains("error_rate < 0.001"))
            .stderr(predicate::str::contains("status is 201"))
            .stderr(predicate::str::contains("reviewers assigned"));
    }

    #[test]
    fn dry_run_uses_cli_stages_and_thresholds() {
        stampede()
            .args([
                "run",
                "http://127.0.0.1:9999",
                "--dry-run",
                "--stage",
                "30s:50",
                "--stage",
                "10s:0",
                "--threshold",
                "p99_latency_ms<800",
            ])
            .assert()
            .success()
            .stderr(predicate::str::contains("Stages:      2 defined"))
            .stderr(predicate::str::contains("max workers: 50"))
            .stderr(predicate::str::contains("p99_latency_ms < 800"))
            .stderr(predicate::str::contains("Thresholds:  1 defined"));
    }

    #[test]
    fn invalid_stage_fails() {
        stampede()
            .args(["run", "--dry-run", "--stage", "30s"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("DURATION:TARGET"));
    }

    #[test]
    fn invalid_think_time_fails() {
        stampede()
            .args(["run", "--dry-run", "--think-time", "soon"])
            .assert()
            .failure();
    }

    #[test]
    fn unknown_threshold_metric_fails() {
        stampede()
            .args(["run", "--dry-run", "--threshold", "p42_latency_ms<10"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown threshold metric"))
            .stderr(predicate::str::contains("p95_latency_ms"));
    }

    #[test]
    fn zero_tick_fails() {
        stampede()
            .args(["run", "--dry-run", "--tick", "0s"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("tick"));
    }

    #[test]
    fn bad_base_url_fails() {
        stampede()
            .args(["run", "localhost:8080", "--dry-run"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Invalid base URL"));
    }
}

mod init_command {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn init_creates_config_file() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("test.toml");

        stampede()
            .args(["init", "-o", output.to_str().unwrap()])
            .assert()
            .success();

        assert!(output.exists());
        let content = fs::read_to_string(&output).unwrap();
        assert!(content.contains("[target]"));
        assert!(content.contains("[[stages]]"));
        assert!(content.contains("[thresholds]"));
    }

    #[test]
    fn init_with_url_includes_url() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("test.toml");

        stampede()
            .args([
                "init",
                "-o",
                output.to_str().unwrap(),
                "-u",
                "http://pr-service.internal:8080",
            ])
            .assert()
            .success();

        let content = fs::read_to_string(&output).unwrap();
        assert!(content.contains("http://pr-service.internal:8080"));
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("test.toml");
        fs::write(&output, "# mine").unwrap();

        stampede()
            .args(["init", "-o", output.to_str().unwrap()])
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));

        stampede()
            .args(["init", "-o", output.to_str().unwrap(), "--force"])
            .assert()
            .success();
        assert!(fs::read_to_string(&output).unwrap().contains("[target]"));
    }

    #[test]
    fn generated_config_validates() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("stampede.toml");

        stampede()
            .args(["init", "-o", output.to_str().unwrap()])
            .assert()
            .success();

        stampede()
            .args(["run", "-f", output.to_str().unwrap(), "--dry-run"])
            .assert()
            .success()
            .stderr(predicate::str::contains("Stages:      3 defined"));
    }
}

mod generators {
    use super::*;

    #[test]
    fn completions_bash() {
        stampede()
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("stampede"));
    }

    #[test]
    fn man_page_renders() {
        stampede()
            .arg("man")
            .assert()
            .success()
            .stdout(predicate::str::contains("stampede"));
    }
}
