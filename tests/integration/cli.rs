use assert_cmd::Command;
use predicates::prelude::*;
use tplcache::models::{DeploymentJob, Instance};

use crate::common::TestProject;

fn tplcache(project: &TestProject) -> Command {
    let mut cmd = Command::cargo_bin("tplcache").unwrap();
    cmd.current_dir(project.path())
        .env("TPLCACHE_STATE_DIR", project.state_dir())
        .env_remove("TPLCACHE_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_precompile_compile_and_lookups() {
    let project = TestProject::new().unwrap();
    project.write_router_release().unwrap();
    project.write_yaml("router-job.yml", &DeploymentJob::new("router", ["router_conf"])).unwrap();
    project.write_yaml("router-0.yml", &Instance::new("router", 0)).unwrap();

    tplcache(&project)
        .args(["precompile", "release.yml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Precompiled release edge/1"));

    tplcache(&project)
        .args(["find-packages", "router_conf"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Expected to find rel-job -> rel-pkgs"));

    let output = tplcache(&project)
        .args(["compile", "router-job.yml", "router-0.yml", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let compiled: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();

    let output = tplcache(&project)
        .args(["find-rendered", "router-job.yml", "router-0.yml", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let found: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(compiled, found);

    tplcache(&project)
        .args(["find-packages", "router_conf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("router-pkg 2.1"))
        .stdout(predicate::str::contains("common-pkg").not());
}

#[test]
fn test_cli_reports_unknown_template() {
    let project = TestProject::new().unwrap();

    tplcache(&project)
        .args(["--quiet", "find-packages", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Expected to find dep-template -> rel-job nope"));
}

#[test]
fn test_cli_rejects_missing_release_file() {
    let project = TestProject::new().unwrap();

    tplcache(&project)
        .args(["precompile", "missing.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.yml"));
}
