//! CLI binary smoke tests using assert_cmd.
//!
//! These exercise the compiled `easyvisa` binary: argument parsing, help
//! text, the default config dump and a small benchmark run.

use std::fmt::Write as _;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn cmd() -> Command {
    Command::cargo_bin("easyvisa").unwrap()
}

/// Writes a tiny separable EasyVisa file: graduates are certified.
fn write_csv(path: &Path, n: usize) {
    let mut text = String::from(
        "case_id,continent,education_of_employee,has_job_experience,requires_job_training,\
         no_of_employees,yr_of_estab,region_of_employment,prevailing_wage,unit_of_wage,\
         full_time_position,case_status\n",
    );
    for i in 0..n {
        let certified = i % 2 == 0;
        let education = if certified { "Master's" } else { "High School" };
        writeln!(
            text,
            "EZYV{:05},{},{},{},N,{},{},West,{:.2},Year,Y,{}",
            i + 1,
            if i % 3 == 0 { "Asia" } else { "Europe" },
            education,
            if i % 5 == 0 { "Y" } else { "N" },
            50 + (i * 31) % 400,
            1960 + (i * 7) % 60,
            30_000.0 + (i * 1237 % 50_000) as f64,
            if certified { "Certified" } else { "Denied" },
        )
        .unwrap();
    }
    std::fs::write(path, text).unwrap();
}

// ---------------------------------------------------------------------------
// Top-level
// ---------------------------------------------------------------------------

#[test]
fn no_args_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_lists_subcommands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("describe"))
        .stdout(predicate::str::contains("benchmark"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn config_prints_default_json() {
    let output = cmd().arg("config").assert().success().get_output().stdout.clone();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["cv_folds"], 5);
    assert_eq!(json["families"].as_array().unwrap().len(), 6);
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

#[test]
fn describe_prints_summary() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("EasyVisa.csv");
    write_csv(&csv, 40);
    cmd()
        .arg("describe")
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("40 rows, 0 duplicated"))
        .stdout(predicate::str::contains("education_of_employee"));
}

#[test]
fn describe_missing_file_fails() {
    cmd()
        .args(["describe", "does_not_exist.csv"])
        .assert()
        .failure();
}

#[test]
fn benchmark_writes_tables() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("EasyVisa.csv");
    write_csv(&csv, 60);
    let config = dir.path().join("config.json");
    std::fs::write(
        &config,
        r#"{
            "cv_folds": 3,
            "families": [
                {
                    "name": "Decision Tree",
                    "baseline": {"family": "decision_tree"},
                    "tuning": {
                        "spec": {"family": "decision_tree"},
                        "grid": [{"name": "max_depth", "values": [2, 4]}]
                    }
                }
            ],
            "stacking": null
        }"#,
    )
    .unwrap();
    let tables = dir.path().join("tables");
    let report = dir.path().join("report.html");

    cmd()
        .arg("benchmark")
        .arg(&csv)
        .arg(&config)
        .arg("--tables-dir")
        .arg(&tables)
        .arg("-o")
        .arg(&report)
        .args(["--n-jobs", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tuned Decision Tree"));

    assert!(tables.join("train_performance.csv").exists());
    assert!(tables.join("test_performance.csv").exists());
    assert!(report.exists());
}

#[test]
fn benchmark_with_bad_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("EasyVisa.csv");
    write_csv(&csv, 20);
    let config = dir.path().join("config.json");
    std::fs::write(&config, "{ not json").unwrap();
    cmd()
        .arg("benchmark")
        .arg(&csv)
        .arg(&config)
        .arg("--no-report")
        .assert()
        .failure();
}
