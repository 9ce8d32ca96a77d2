//! The attestation SDK seam
//!
//! Scripts reach the network only through an [`AttestationClient`] handed out
//! by the [`ClientFactory`] the runner was configured with. Connection
//! details (address, credential, issuer) are the factory's concern.

use crate::error::SdkError;
use crate::hash::TRUE_NETWORK_PREFIX;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::rc::Rc;
use trueplay_script::{HostObject, Interpreter, Result as ScriptResult, ScriptError, Span, Value};

pub type SdkResult<T> = Result<T, SdkError>;

/// Signing account of a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    #[serde(default)]
    pub secret: String,
}

/// Issuer on whose behalf attestations are made
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuer {
    pub name: String,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub name: String,
    pub ss58_prefix: u16,
    pub is_connected: bool,
}

/// A schema field value as stored on the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

/// Field values in schema order
pub type FieldValues = IndexMap<String, FieldValue>;

/// Inclusion receipt of an attestation transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub tx_hash: String,
    pub block_hash: String,
    pub block_number: u64,
    pub schema_hash: String,
    pub subject: String,
    pub attestation_index: usize,
}

/// An attestation as read back from the ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationRecord {
    pub index: usize,
    pub issuer_hash: String,
    pub schema_hash: String,
    pub subject: String,
    pub block_number: u64,
    pub values: FieldValues,
}

/// Client of an attestation network
pub trait AttestationClient {
    fn network(&self) -> NetworkInfo;

    fn account(&self) -> &Account;

    fn issuer(&self) -> Option<&Issuer>;

    fn attest(&self, schema_hash: &str, subject: &str, values: &FieldValues) -> SdkResult<Receipt>;

    fn update_attestation(
        &self,
        schema_hash: &str,
        subject: &str,
        index: usize,
        values: &FieldValues,
    ) -> SdkResult<Receipt>;

    /// Attestations made by this client's issuer for `subject` under a schema
    fn get_attestations(&self, schema_hash: &str, subject: &str) -> SdkResult<Vec<AttestationRecord>>;

    fn free_balance(&self, address: &str) -> SdkResult<u128>;
}

/// Produces configured clients for `getTrueNetworkInstance()`
pub trait ClientFactory {
    fn network_name(&self) -> &str;

    fn ss58_prefix(&self) -> u16 {
        TRUE_NETWORK_PREFIX
    }

    fn connect(&self) -> SdkResult<Rc<dyn AttestationClient>>;
}

/// Factory for a network this build cannot reach
#[derive(Debug, Clone)]
pub struct UnsupportedNetwork {
    network: String,
}

impl UnsupportedNetwork {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
        }
    }
}

impl ClientFactory for UnsupportedNetwork {
    fn network_name(&self) -> &str {
        &self.network
    }

    fn connect(&self) -> SdkResult<Rc<dyn AttestationClient>> {
        Err(SdkError::Unsupported(self.network.clone()))
    }
}

/// A connected client as scripts see it (`trueApi`)
#[derive(Clone)]
pub struct ClientHandle {
    client: Rc<dyn AttestationClient>,
}

impl ClientHandle {
    pub fn new(client: Rc<dyn AttestationClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &dyn AttestationClient {
        self.client.as_ref()
    }

    /// The client passed as argument `index`, or a TypeError
    pub fn from_arg(args: &[Value], index: usize) -> ScriptResult<ClientHandle> {
        args.get(index)
            .and_then(|value| value.as_host::<ClientHandle>())
            .cloned()
            .ok_or_else(|| {
                ScriptError::type_error(
                    Span::default(),
                    "Expected a True Network instance from getTrueNetworkInstance()",
                )
            })
    }
}

impl HostObject for ClientHandle {
    fn type_name(&self) -> &str {
        "TrueApi"
    }

    fn get(&self, name: &str) -> Option<Value> {
        match name {
            "network" => {
                let info = self.client.network();
                Some(Value::object_from([
                    ("name", Value::string(info.name)),
                    ("ss58Prefix", Value::Number(f64::from(info.ss58_prefix))),
                    ("isConnected", Value::Bool(info.is_connected)),
                ]))
            }
            "address" => Some(Value::string(self.client.account().address.clone())),
            "issuer" => Some(match self.client.issuer() {
                Some(issuer) => Value::object_from([
                    ("name", Value::string(issuer.name.clone())),
                    ("hash", Value::string(issuer.hash.clone())),
                ]),
                None => Value::Null,
            }),
            _ => None,
        }
    }

    fn call_method(&self, _interp: &mut Interpreter, name: &str, _args: &[Value]) -> Option<ScriptResult<Value>> {
        match name {
            "isConnected" => Some(Ok(Value::Bool(self.client.network().is_connected))),
            _ => None,
        }
    }

    fn to_json(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "network": self.client.network().name,
            "address": self.client.account().address,
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
