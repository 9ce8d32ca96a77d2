//! Scripts talking to the in-memory attestation network

use std::rc::Rc;
use trueplay_runtime::memory::UNIT;
use trueplay_runtime::{
    Account, CapabilityBundle, ExecutionLimits, Issuer, LogStatus, MemoryClientFactory, MemoryNetwork, ScriptRunner,
    SdkError, LOCAL_NETWORK,
};

const ISSUER_ADDRESS: &str = "hd73pQXLhrYFTYq8JrvfHWtQDCMxvvhFBrgdW8bY1zkJhiS";

const CREATE: &str = r#"
const trueApi = await getTrueNetworkInstance();
const userWalletAddress = 'nJrsrH8dov9Z36kTDpabgCZT8CbK1FbmjJvfU6qbMTG4g4c';

const userSignupSchema = Schema.create({
  name: Text,
  dateOfRegistry: U64,
  profileCid: Text
})

const response = await userSignupSchema.attest(trueApi, userWalletAddress, {
  name: "Ram",
  dateOfRegistry: 1700000000000,
  profileCid: 'baguqeerasords4njcts6vs7qvdjfcvgnume4hqohf65zsfguprqphs3icwea'
});

return response;
"#;

const READ: &str = r#"
const trueApi = await getTrueNetworkInstance();
const userWalletAddress = 'nJrsrH8dov9Z36kTDpabgCZT8CbK1FbmjJvfU6qbMTG4g4c';

const userSignupSchema = Schema.create({
  name: Text,
  dateOfRegistry: U64,
  profileCid: Text
})

const response = await userSignupSchema.getAttestations(trueApi, userWalletAddress);

return response;
"#;

fn setup() -> (MemoryNetwork, ScriptRunner) {
    let network = MemoryNetwork::new();
    network.endow(ISSUER_ADDRESS, 10 * UNIT);
    let factory = MemoryClientFactory::new(
        network.clone(),
        Account {
            address: ISSUER_ADDRESS.to_string(),
            secret: String::new(),
        },
        Some(Issuer {
            name: "Playground".to_string(),
            hash: "0x8e8dec429b2f4aa205ca3d3f009133b4ed41d4a898cce0b2f0e1eef71d963ee7".to_string(),
        }),
    );
    let runner = ScriptRunner::new(CapabilityBundle::standard(Rc::new(factory)), ExecutionLimits::default()).unwrap();
    (network, runner)
}

fn response_json(message: &str) -> serde_json::Value {
    serde_json::from_str(message).unwrap()
}

#[test]
fn test_create_then_read_attestations() {
    let (network, mut runner) = setup();

    let logs = runner.run_script(CREATE);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, LogStatus::Response);
    let receipt = response_json(&logs[0].message);
    assert_eq!(receipt["blockNumber"], 1);
    assert_eq!(receipt["attestationIndex"], 0);
    assert!(receipt["txHash"].as_str().unwrap().starts_with("0x"));
    assert_eq!(network.attestation_count(), 1);

    let logs = runner.run_script(READ);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, LogStatus::Response);
    let records = response_json(&logs[0].message);
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["values"]["name"], "Ram");
    assert_eq!(records[0]["values"]["dateOfRegistry"], 1700000000000u64);
    assert_eq!(
        records[0]["issuer"],
        "0x8e8dec429b2f4aa205ca3d3f009133b4ed41d4a898cce0b2f0e1eef71d963ee7"
    );
}

#[test]
fn test_read_attestations_rejected_when_offline() {
    let (network, mut runner) = setup();
    network.set_online(false);

    let logs = runner.run_script(READ);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, LogStatus::Error);
    let expected = SdkError::Disconnected {
        network: LOCAL_NETWORK.to_string(),
    };
    assert_eq!(logs[0].message, expected.to_string());
}

#[test]
fn test_update_attestation() {
    let (_network, mut runner) = setup();
    runner.run_script(CREATE);

    let logs = runner.run_script(
        r#"
        const trueApi = await getTrueNetworkInstance();
        const schema = Schema.create({ name: Text, dateOfRegistry: U64, profileCid: Text });
        const subject = 'nJrsrH8dov9Z36kTDpabgCZT8CbK1FbmjJvfU6qbMTG4g4c';
        await schema.updateAttestation(trueApi, subject, 0, { name: "Sita", dateOfRegistry: 5n, profileCid: "x" });
        const all = await schema.getAttestations(trueApi, subject);
        return all.map(a => a.values.name);
        "#,
    );
    assert_eq!(logs.len(), 1);
    assert_eq!(response_json(&logs[0].message), serde_json::json!(["Sita"]));
}

#[test]
fn test_invalid_field_value_is_reported() {
    let (network, mut runner) = setup();
    let logs = runner.run_script(
        r#"
        const trueApi = await getTrueNetworkInstance();
        const schema = Schema.create({ score: U8 });
        return await schema.attest(trueApi, 'bob', { score: 300 });
        "#,
    );
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, LogStatus::Error);
    assert_eq!(logs[0].message, "Invalid value for U8 field 'score': 300 is outside 0..=255");
    assert_eq!(network.attestation_count(), 0);
}

#[test]
fn test_free_balance_is_bigint() {
    let (_network, mut runner) = setup();
    let logs = runner.run_script(
        r#"
        const api = await getTrueNetworkInstance();
        const balance = await getFreeBalance(api, api.address);
        console.log(typeof balance);
        return { balance, network: api.network.name };
        "#,
    );
    assert_eq!(logs[0].message, "bigint");
    let response = response_json(&logs[1].message);
    assert_eq!(response["balance"], 10_000_000_000_000u64);
    assert_eq!(response["network"], "local");
}
