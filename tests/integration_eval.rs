//! Integration tests for the `eval` command.

use predicates::prelude::*;

mod common;
use common::{FEATURES_YAML, TestProject};

#[test]
fn test_eval_resolves_all_keys() {
    let project = TestProject::new().unwrap();
    project.write_config("features.yaml", FEATURES_YAML).unwrap();

    project
        .featgroup()
        .args(["eval", "features.yaml", "--key", "upstream.proxy"])
        .args(["--var", "host=example.com", "--var", "port=8080"])
        .assert()
        .success()
        .stdout(predicate::str::contains("host = \"example.com\""))
        .stdout(predicate::str::contains("port = 8080"))
        .stdout(predicate::str::contains("url = \"http://example.com:8080/\""));
}

#[test]
fn test_eval_named_key_json() {
    let project = TestProject::new().unwrap();
    project.write_config("features.yaml", FEATURES_YAML).unwrap();

    let output = project
        .featgroup()
        .args(["eval", "features.yaml", "-k", "upstream.proxy", "--name", "port"])
        .args(["--var", "port=443", "--format", "json"])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&output.get_output().stdout);
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value, serde_json::json!({ "port": 443 }));
}

#[test]
fn test_eval_missing_variables_are_nil() {
    let project = TestProject::new().unwrap();
    project.write_config("features.yaml", FEATURES_YAML).unwrap();

    project
        .featgroup()
        .args(["eval", "features.yaml", "--key", "upstream.proxy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("host = (nil)"))
        .stdout(predicate::str::contains("url = \"http://:/\""));
}

#[test]
fn test_eval_tuple() {
    let project = TestProject::new().unwrap();
    project.write_config("features.yaml", FEATURES_YAML).unwrap();

    project
        .featgroup()
        .args(["eval", "features.yaml", "--key", "upstream.balance", "--tuple"])
        .args(["-d", "primary:required", "-d", "backup", "-d", "spare"])
        .args(["--var", "primary=10.0.0.1", "--var", "backup=10.0.0.2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("primary = \"10.0.0.1\""))
        .stdout(predicate::str::contains("backup = \"10.0.0.2\""))
        .stdout(predicate::str::contains("spare = (nil)"));
}

#[test]
fn test_eval_tuple_missing_required() {
    let project = TestProject::new().unwrap();
    project.write_config("features.yaml", FEATURES_YAML).unwrap();

    project
        .featgroup()
        .args(["eval", "features.yaml", "--key", "upstream.balance", "--tuple"])
        .args(["-d", "a", "-d", "b", "-d", "c:required"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Required key 'c' is missing"));
}

#[test]
fn test_eval_remote_addr_and_multi() {
    let project = TestProject::new().unwrap();
    project
        .write_config(
            "peer.yaml",
            "peer: \"{remote-addr}\"\nlabels: [\"from {remote-addr}\", static]\n",
        )
        .unwrap();

    project
        .featgroup()
        .args(["eval", "peer.yaml", "-d", "peer", "-d", "labels:multi"])
        .args(["--remote-addr", "192.0.2.9"])
        .assert()
        .success()
        .stdout(predicate::str::contains("peer = 192.0.2.9"))
        .stdout(predicate::str::contains("labels = [\"from 192.0.2.9\", \"static\"]"));
}

#[test]
fn test_eval_unknown_name() {
    let project = TestProject::new().unwrap();
    project.write_config("features.yaml", FEATURES_YAML).unwrap();

    project
        .featgroup()
        .args(["eval", "features.yaml", "--key", "plain", "--name", "greting"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Key 'greting' is not declared"))
        .stderr(predicate::str::contains("Did you mean 'greeting'?"));
}

#[test]
fn test_eval_rejects_bad_var() {
    let project = TestProject::new().unwrap();
    project.write_config("features.yaml", FEATURES_YAML).unwrap();

    project
        .featgroup()
        .args(["eval", "features.yaml", "--var", "novalue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected NAME=VALUE"));
}
