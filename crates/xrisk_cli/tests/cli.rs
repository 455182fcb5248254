//! Runs the built binary on small input files.

use std::fs;
use std::process::Command;

#[test]
fn test_simm_command_prints_netting_set_total() {
    let dir = tempfile::tempdir().unwrap();
    let crif = dir.path().join("crif.csv");
    let simm = dir.path().join("simm.toml");
    fs::write(&crif, "NettingSetId,RiskType,Qualifier,Amount\nNS1,Risk_FX,USD,1000\n").unwrap();
    fs::write(&simm, "[risk_types.Risk_FX]\nrisk_class = \"FX\"\ndefault_weight = 7.4\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_xrisk"))
        .arg("simm")
        .arg("--crif")
        .arg(&crif)
        .arg("--simm-config")
        .arg(&simm)
        .env("RUST_LOG", "off")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("NS1,All,All,7400.00"));
    assert!(stdout.contains("NS1,,Risk_FX,7400.00"));
}

#[test]
fn test_missing_crif_fails() {
    let dir = tempfile::tempdir().unwrap();
    let simm = dir.path().join("simm.toml");
    fs::write(&simm, "[risk_types.Risk_FX]\nrisk_class = \"FX\"\ndefault_weight = 7.4\n").unwrap();
    let status = Command::new(env!("CARGO_BIN_EXE_xrisk"))
        .args(["simm", "--crif", "/nonexistent/crif.csv", "--simm-config"])
        .arg(&simm)
        .env("RUST_LOG", "off")
        .output()
        .unwrap()
        .status;
    assert!(!status.success());
}
