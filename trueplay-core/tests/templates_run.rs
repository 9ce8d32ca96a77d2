//! Every shipped template runs to a response on a fresh local network

use trueplay_core::results::{self, RunStatus};
use trueplay_core::{templates, Config, Playground};
use trueplay_types::LogStatus;

fn playground() -> Playground {
    Playground::from_config(&Config::default()).unwrap()
}

fn response_json(logs: &[trueplay_types::LogEntry]) -> serde_json::Value {
    serde_json::from_str(results::response(logs).unwrap()).unwrap()
}

#[test]
fn test_every_template_succeeds() {
    for template in templates::all() {
        let mut playground = playground();
        let logs = playground.run_template(template.id).unwrap();
        assert_eq!(
            RunStatus::of(&logs),
            RunStatus::Success,
            "{} failed: {:?}",
            template.id,
            logs
        );
        assert!(logs.iter().all(|e| e.status != LogStatus::Error), "{}: {:?}", template.id, logs);
    }
}

#[test]
fn test_create_then_read_share_the_ledger() {
    let mut playground = playground();
    playground.run_template("attestation-basic").unwrap();
    let logs = playground.run_template("attestation-read").unwrap();

    let records = response_json(&logs);
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["values"]["name"], "Ram");
    assert_eq!(playground.network().unwrap().attestation_count(), 1);
}

#[test]
fn test_update_template_logs_then_updates() {
    let mut playground = playground();
    let logs = playground.run_template("attestation-update").unwrap();

    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].message, "Created attestation 0 in block 1");
    let receipt = response_json(&logs);
    assert_eq!(receipt["attestationIndex"], 0);
    assert_eq!(receipt["blockNumber"], 2);
}

#[test]
fn test_reputation_scores_are_ranked() {
    let mut playground = playground();
    let logs = playground.run_template("reputation-model").unwrap();

    let scores = response_json(&logs);
    let scores = scores.as_array().unwrap();
    assert_eq!(scores.len(), 2);
    // 85 * 0.6 + 100 * 0.3 + 40 * 0.1
    assert_eq!(scores[0]["score"], 85.0);
    assert_eq!(scores[0]["address"], "nJrsrH8dov9Z36kTDpabgCZT8CbK1FbmjJvfU6qbMTG4g4c");
    assert_eq!(scores[1]["score"], 45.5);

    let table = results::tabulate(results::response(&logs).unwrap());
    assert_eq!(table.headers, ["address", "score", "attestations"]);
}

#[test]
fn test_trust_algorithm_result() {
    let mut playground = playground();
    let logs = playground.run_template("trust-algorithm").unwrap();

    let result = response_json(&logs);
    assert_eq!(result["attestationCount"], 2);
    assert_eq!(result["score"], 72.5);
    assert_eq!(result["confidence"], 0.2);
}
