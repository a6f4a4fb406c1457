#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const VALID_REQUEST: &str = r#"
infra "demo" {
    region "ap-south-1"
    network "create-new" {
        public-subnets 1
        private-subnets 1
    }
    policies "edge" "compute"
    instance-size "small"
}
"#;

fn project(content: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("shipyard.kdl"), content).unwrap();
    dir
}

fn shipyard() -> Command {
    let mut cmd = Command::cargo_bin("shipyard").unwrap();
    cmd.env_remove("SHIPYARD_REQUEST_PATH")
        .env_remove("AWS_ACCESS_KEY_ID")
        .env_remove("AWS_SECRET_ACCESS_KEY")
        .env_remove("AWS_REGION");
    cmd
}

/// CLIヘルプが正しく表示されることを確認
#[test]
fn test_cli_help() {
    shipyard()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("provision"))
        .stdout(predicate::str::contains("checklist"));
}

#[test]
fn test_cli_version() {
    shipyard()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("shipyard"));
}

#[test]
fn test_provision_help() {
    shipyard()
        .args(["provision", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--access-key-id"))
        .stdout(predicate::str::contains("--checklist"))
        .stdout(predicate::str::contains("--json"));
}

/// カレントディレクトリの shipyard.kdl を検証できることを確認
#[test]
fn test_validate_discovers_request_file() {
    let dir = project(VALID_REQUEST);
    shipyard()
        .current_dir(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("demo"))
        .stdout(predicate::str::contains("public 2 / private 2"))
        .stdout(predicate::str::contains("t4g.small"));
}

#[test]
fn test_validate_rejects_existing_network_without_vpc() {
    let dir = project(
        r#"
infra "demo" {
    region "ap-south-1"
    network "use-existing"
    policies "compute"
}
"#,
    );
    shipyard()
        .arg("validate")
        .arg(dir.path().join("shipyard.kdl"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("VPC"));
}

#[test]
fn test_validate_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    shipyard()
        .arg("validate")
        .arg(dir.path().join("missing.kdl"))
        .assert()
        .failure();
}

#[test]
fn test_checklist_to_stdout() {
    let dir = project(VALID_REQUEST);
    shipyard()
        .current_dir(dir.path())
        .arg("checklist")
        .assert()
        .success()
        .stdout(predicate::str::contains("- ECR_REPOSITORY = demo-repo"))
        .stdout(predicate::str::contains("- ECS_SERVICE = demo-service"));
}

#[test]
fn test_checklist_to_file() {
    let dir = project(VALID_REQUEST);
    let output = dir.path().join("CHECKLIST.md");
    shipyard()
        .current_dir(dir.path())
        .arg("checklist")
        .arg("-o")
        .arg(&output)
        .assert()
        .success();
    let text = fs::read_to_string(output).unwrap();
    assert!(text.contains("- AWS_DEFAULT_REGION = ap-south-1"));
}

#[cfg(not(feature = "aws-cloud"))]
#[test]
fn test_provision_requires_cloud_feature() {
    let dir = project(VALID_REQUEST);
    shipyard()
        .current_dir(dir.path())
        .arg("provision")
        .assert()
        .failure()
        .stderr(predicate::str::contains("aws-cloud"));
}
