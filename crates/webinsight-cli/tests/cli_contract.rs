use assert_cmd::Command;
use predicates::prelude::*;

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("webinsight").expect("binary under test");
    // Deterministic error paths: no provider keys from the host environment.
    for key in [
        "WEBINSIGHT_GOOGLE_API_KEY",
        "GOOGLE_API_KEY",
        "WEBINSIGHT_GOOGLE_CX",
        "GOOGLE_CSE_ID",
        "WEBINSIGHT_GEMINI_API_KEY",
        "GEMINI_API_KEY",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn version_prints_json() {
    let assert = bin().arg("version").assert().success();
    let out = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let v: serde_json::Value = serde_json::from_str(&out).expect("valid json");
    assert_eq!(v["name"], "webinsight");
    assert!(v["version"].is_string());
}

#[test]
fn doctor_reports_missing_config_without_secrets() {
    let assert = bin().arg("doctor").assert().success();
    let out = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let v: serde_json::Value = serde_json::from_str(&out).expect("valid json");
    assert_eq!(v["google_search"]["api_key"], false);
    assert_eq!(v["gemini"]["api_key"], false);
}

#[test]
fn doctor_never_echoes_secret_values() {
    let assert = bin()
        .env("WEBINSIGHT_GOOGLE_API_KEY", "super-secret-key-value")
        .arg("doctor")
        .assert()
        .success();
    let out = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(!out.contains("super-secret-key-value"));
    let v: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(v["google_search"]["api_key"], true);
}

#[test]
fn research_without_config_fails_with_guidance() {
    bin()
        .args(["research", "anything"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("WEBINSIGHT_GOOGLE_API_KEY"));
}
