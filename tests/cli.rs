//! Exit-code behaviour of the gg-provision binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn gg_provision(snap_root: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("gg-provision").unwrap();
    cmd.current_dir(snap_root.path())
        .env("SNAP", snap_root.path())
        .env("SNAP_COMMON", snap_root.path())
        .env_remove("AWS_REGION")
        .env_remove("AWS_ACCESS_KEY_ID")
        .env_remove("AWS_SECRET_ACCESS_KEY")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_both_flows() {
    let tmp = TempDir::new().unwrap();
    gg_provision(&tmp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("bootstrap"))
        .stdout(predicate::str::contains("setup"));
}

#[test]
fn bootstrap_without_config_exits_1() {
    let tmp = TempDir::new().unwrap();
    gg_provision(&tmp)
        .arg("bootstrap")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no bootstrap-config.yaml found"));
}

#[test]
fn bootstrap_with_missing_claims_exits_1_without_writing_config() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("bootstrap-config.yaml"),
        "deviceName: gateway-01\n\
         awsRegion: us-east-1\n\
         provisioningTemplate: GreengrassFleetTemplate\n\
         claimCertificatePath: /nonexistent/claim.pem.crt\n",
    )
    .unwrap();

    gg_provision(&tmp)
        .arg("bootstrap")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("claim certificate not found"))
        .stderr(predicate::str::contains("claimPrivateKeyPath not specified"));

    assert!(!tmp.path().join("greengrass/v2/config.yaml").exists());
}

#[test]
fn bootstrap_with_malformed_config_exits_1() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("bootstrap-config.yaml"),
        "deviceName: [unterminated\n",
    )
    .unwrap();

    gg_provision(&tmp)
        .arg("bootstrap")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to parse bootstrap config"));
}
