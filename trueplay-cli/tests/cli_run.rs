use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

#[allow(deprecated)]
fn trueplay() -> Command {
    Command::cargo_bin("trueplay").expect("binary built")
}

#[test]
fn run_file_json_reports_logs() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(
        dir.path().join("script.ts"),
        r#"
console.log("starting");
const api = await getTrueNetworkInstance();
return { network: api.network.name, hash: stringToBlakeTwo256Hash("hello") };
"#,
    )?;

    let assert = trueplay()
        .current_dir(dir.path())
        .args(["run", "script.ts", "--json"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    let report: Value = serde_json::from_str(&stdout)?;
    assert_eq!(report["status"], "success");
    assert_eq!(report["network"], "local");

    let logs = report["logs"].as_array().expect("logs array");
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0]["message"], "starting");
    assert_eq!(logs[1]["status"], "response");
    let response: Value = serde_json::from_str(logs[1]["message"].as_str().unwrap())?;
    assert_eq!(
        response["hash"],
        "0x324dcf027dd4a30a932c441f365a25e86b173defa4b8e58948253471b81b72cf"
    );
    Ok(())
}

#[test]
fn run_failing_script_exits_with_error() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    trueplay()
        .current_dir(dir.path())
        .args(["run", "-"])
        .write_stdin("throw new Error('boom')")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("boom"));
    Ok(())
}

#[test]
fn run_template_as_table() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    trueplay()
        .current_dir(dir.path())
        .args(["run", "--template", "attestation-basic", "--view", "table"])
        .assert()
        .success()
        .stdout(predicate::str::contains("key").and(predicate::str::contains("attestationIndex")));
    Ok(())
}

#[test]
fn configured_network_is_used() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("trueplay.yml"), "network: mainnet\n")?;

    trueplay()
        .current_dir(dir.path())
        .args(["run", "--template", "attestation-read"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Network 'mainnet' is not supported"));
    Ok(())
}

#[test]
fn templates_list_and_show() -> Result<(), Box<dyn std::error::Error>> {
    let assert = trueplay().args(["templates", "--json"]).assert().success();
    let listed: Value = serde_json::from_slice(&assert.get_output().stdout)?;
    let ids: Vec<_> = listed
        .as_array()
        .expect("template array")
        .iter()
        .map(|t| t["id"].as_str().unwrap_or_default().to_string())
        .collect();
    assert!(ids.contains(&"attestation-read".to_string()));
    assert_eq!(ids.len(), 6);

    trueplay()
        .args(["templates", "--category", "reputation"])
        .assert()
        .success()
        .stdout(predicate::str::contains("reputation-model").and(predicate::str::contains("trust-algorithm").not()));

    trueplay()
        .args(["show", "trust-algorithm"])
        .assert()
        .success()
        .stdout(predicate::str::contains("function trustAlgorithm"));

    trueplay().args(["show", "missing"]).assert().failure();
    Ok(())
}

#[test]
fn init_writes_config_once() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let target = dir.path().join("project");

    trueplay().arg("init").arg(&target).assert().success();
    let written = fs::read_to_string(target.join("trueplay.yml"))?;
    assert!(written.contains("network: local"));

    fs::write(target.join("trueplay.yml"), "network: testnet\n")?;
    trueplay()
        .arg("init")
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
    assert_eq!(fs::read_to_string(target.join("trueplay.yml"))?, "network: testnet\n");
    Ok(())
}
