//! In-process attestation network
//!
//! [`MemoryNetwork`] keeps a small ledger (balances, attestations, a block
//! counter) behind a lock and hands out [`MemoryClient`]s through
//! [`MemoryClientFactory`]. Every transaction is sealed in its own block.
//! The network can be switched offline, after which every call rejects with
//! [`SdkError::Disconnected`].

use crate::error::SdkError;
use crate::hash::{blake2_256, ss58_decode, to_hex, TRUE_NETWORK_PREFIX};
use crate::sdk::{
    Account, AttestationClient, AttestationRecord, ClientFactory, FieldValues, Issuer, NetworkInfo, Receipt,
    SdkResult,
};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Name under which the in-memory network is configured
pub const LOCAL_NETWORK: &str = "local";

/// Smallest balance unit per TRUE
pub const UNIT: u128 = 1_000_000_000_000;

/// Fee charged to the signer for every attestation transaction
pub const TX_FEE: u128 = UNIT / 1_000;

#[derive(Debug, Clone)]
struct StoredAttestation {
    issuer_hash: String,
    block_number: u64,
    values: FieldValues,
}

#[derive(Debug)]
struct Ledger {
    block_number: u64,
    block_hash: [u8; 32],
    balances: HashMap<String, u128>,
    /// Keyed by (schema hash, subject)
    attestations: IndexMap<(String, String), Vec<StoredAttestation>>,
}

impl Ledger {
    fn new() -> Self {
        Self {
            block_number: 0,
            block_hash: blake2_256(b"trueplay-genesis"),
            balances: HashMap::new(),
            attestations: IndexMap::new(),
        }
    }

    /// Seal a transaction into a new block, returning `(tx hash, block hash)`
    fn seal(&mut self, payload: &[u8]) -> ([u8; 32], [u8; 32]) {
        self.block_number += 1;

        let mut tx = Vec::with_capacity(payload.len() + 8);
        tx.extend_from_slice(&self.block_number.to_le_bytes());
        tx.extend_from_slice(payload);
        let tx_hash = blake2_256(&tx);

        let mut header = self.block_hash.to_vec();
        header.extend_from_slice(&tx_hash);
        self.block_hash = blake2_256(&header);
        (tx_hash, self.block_hash)
    }

    fn charge(&mut self, address: &str, fee: u128) -> SdkResult<()> {
        let key = account_key(address);
        let available = self.balances.get(&key).copied().unwrap_or(0);
        if available < fee {
            return Err(SdkError::InsufficientBalance {
                address: address.to_string(),
                available,
                required: fee,
            });
        }
        self.balances.insert(key, available - fee);
        Ok(())
    }
}

/// Balances are keyed by account id so any SS58 form of an address matches
fn account_key(address: &str) -> String {
    match ss58_decode(address) {
        Ok((_, account)) => hex::encode(account),
        Err(_) => address.trim().to_string(),
    }
}

/// Handle to a shared in-memory ledger
#[derive(Debug, Clone)]
pub struct MemoryNetwork {
    ledger: Arc<Mutex<Ledger>>,
    online: Arc<AtomicBool>,
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger::new())),
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Credit `amount` to `address`
    pub fn endow(&self, address: &str, amount: u128) {
        let mut ledger = self.ledger.lock();
        let balance = ledger.balances.entry(account_key(address)).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    pub fn block_number(&self) -> u64 {
        self.ledger.lock().block_number
    }

    pub fn attestation_count(&self) -> usize {
        self.ledger.lock().attestations.values().map(Vec::len).sum()
    }

    pub fn client(&self, account: Account, issuer: Option<Issuer>) -> MemoryClient {
        MemoryClient {
            network: self.clone(),
            account,
            issuer,
        }
    }

    fn ensure_online(&self) -> SdkResult<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(SdkError::Disconnected {
                network: LOCAL_NETWORK.to_string(),
            })
        }
    }
}

/// A client signing with one account on a [`MemoryNetwork`]
#[derive(Debug, Clone)]
pub struct MemoryClient {
    network: MemoryNetwork,
    account: Account,
    issuer: Option<Issuer>,
}

impl MemoryClient {
    fn issuer_hash(&self) -> SdkResult<&str> {
        match &self.issuer {
            Some(issuer) if !issuer.hash.trim().is_empty() => Ok(&issuer.hash),
            _ => Err(SdkError::NoIssuer),
        }
    }

    fn tx_payload(&self, kind: &str, schema_hash: &str, subject: &str, values: &FieldValues) -> Vec<u8> {
        let mut payload = Vec::new();
        for part in [kind, self.account.address.as_str(), schema_hash, subject] {
            payload.extend_from_slice(part.as_bytes());
            payload.push(0);
        }
        payload.extend(serde_json::to_vec(values).unwrap_or_default());
        payload
    }
}

impl AttestationClient for MemoryClient {
    fn network(&self) -> NetworkInfo {
        NetworkInfo {
            name: LOCAL_NETWORK.to_string(),
            ss58_prefix: TRUE_NETWORK_PREFIX,
            is_connected: self.network.is_online(),
        }
    }

    fn account(&self) -> &Account {
        &self.account
    }

    fn issuer(&self) -> Option<&Issuer> {
        self.issuer.as_ref()
    }

    fn attest(&self, schema_hash: &str, subject: &str, values: &FieldValues) -> SdkResult<Receipt> {
        self.network.ensure_online()?;
        let issuer_hash = self.issuer_hash()?.to_string();
        let payload = self.tx_payload("attest", schema_hash, subject, values);

        let mut ledger = self.network.ledger.lock();
        ledger.charge(&self.account.address, TX_FEE)?;
        let (tx_hash, block_hash) = ledger.seal(&payload);
        let block_number = ledger.block_number;

        let list = ledger
            .attestations
            .entry((schema_hash.to_string(), subject.to_string()))
            .or_default();
        list.push(StoredAttestation {
            issuer_hash,
            block_number,
            values: values.clone(),
        });
        let attestation_index = list.len() - 1;
        debug!(block_number, schema = schema_hash, subject, "Sealed attestation");

        Ok(Receipt {
            tx_hash: to_hex(&tx_hash),
            block_hash: to_hex(&block_hash),
            block_number,
            schema_hash: schema_hash.to_string(),
            subject: subject.to_string(),
            attestation_index,
        })
    }

    fn update_attestation(
        &self,
        schema_hash: &str,
        subject: &str,
        index: usize,
        values: &FieldValues,
    ) -> SdkResult<Receipt> {
        self.network.ensure_online()?;
        let issuer_hash = self.issuer_hash()?.to_string();
        let payload = self.tx_payload("update", schema_hash, subject, values);

        let mut ledger = self.network.ledger.lock();
        let key = (schema_hash.to_string(), subject.to_string());
        let exists = ledger
            .attestations
            .get(&key)
            .and_then(|list| list.get(index))
            .is_some_and(|stored| stored.issuer_hash == issuer_hash);
        if !exists {
            return Err(SdkError::AttestationNotFound {
                subject: subject.to_string(),
                index,
            });
        }

        ledger.charge(&self.account.address, TX_FEE)?;
        let (tx_hash, block_hash) = ledger.seal(&payload);
        let block_number = ledger.block_number;
        if let Some(stored) = ledger.attestations.get_mut(&key).and_then(|list| list.get_mut(index)) {
            stored.values = values.clone();
            stored.block_number = block_number;
        }
        debug!(block_number, schema = schema_hash, subject, index, "Sealed attestation update");

        Ok(Receipt {
            tx_hash: to_hex(&tx_hash),
            block_hash: to_hex(&block_hash),
            block_number,
            schema_hash: schema_hash.to_string(),
            subject: subject.to_string(),
            attestation_index: index,
        })
    }

    fn get_attestations(&self, schema_hash: &str, subject: &str) -> SdkResult<Vec<AttestationRecord>> {
        self.network.ensure_online()?;
        let issuer_hash = self.issuer_hash()?;

        let ledger = self.network.ledger.lock();
        let records = ledger
            .attestations
            .get(&(schema_hash.to_string(), subject.to_string()))
            .map(|list| {
                list.iter()
                    .enumerate()
                    .filter(|(_, stored)| stored.issuer_hash == issuer_hash)
                    .map(|(index, stored)| AttestationRecord {
                        index,
                        issuer_hash: stored.issuer_hash.clone(),
                        schema_hash: schema_hash.to_string(),
                        subject: subject.to_string(),
                        block_number: stored.block_number,
                        values: stored.values.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(records)
    }

    fn free_balance(&self, address: &str) -> SdkResult<u128> {
        self.network.ensure_online()?;
        if address.trim().is_empty() {
            return Err(SdkError::invalid_address(address, "address is empty"));
        }
        let ledger = self.network.ledger.lock();
        Ok(ledger.balances.get(&account_key(address)).copied().unwrap_or(0))
    }
}

/// Connects clients for one configured account and issuer
#[derive(Debug, Clone)]
pub struct MemoryClientFactory {
    network: MemoryNetwork,
    account: Account,
    issuer: Option<Issuer>,
    ss58_prefix: u16,
}

impl MemoryClientFactory {
    pub fn new(network: MemoryNetwork, account: Account, issuer: Option<Issuer>) -> Self {
        Self {
            network,
            account,
            issuer,
            ss58_prefix: TRUE_NETWORK_PREFIX,
        }
    }

    /// Prefix used by `toTrueNetworkAddress` for this network
    pub fn with_ss58_prefix(mut self, prefix: u16) -> Self {
        self.ss58_prefix = prefix;
        self
    }

    pub fn network(&self) -> &MemoryNetwork {
        &self.network
    }
}

impl ClientFactory for MemoryClientFactory {
    fn network_name(&self) -> &str {
        LOCAL_NETWORK
    }

    fn ss58_prefix(&self) -> u16 {
        self.ss58_prefix
    }

    fn connect(&self) -> SdkResult<Rc<dyn AttestationClient>> {
        self.network.ensure_online()?;
        if self.account.secret.is_empty() {
            debug!(address = %self.account.address, "Connecting without a secret key");
        }
        Ok(Rc::new(self.network.client(self.account.clone(), self.issuer.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::FieldValue;

    const ALICE: &str = "nJrsrH8dov9Z36kTDpabgCZT8CbK1FbmjJvfU6qbMTG4g4c";
    const ALICE_GENERIC: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";

    fn client(network: &MemoryNetwork) -> MemoryClient {
        network.endow(ALICE, UNIT);
        network.client(
            Account {
                address: ALICE.to_string(),
                secret: String::new(),
            },
            Some(Issuer {
                name: "Test".to_string(),
                hash: format!("0x{}", "11".repeat(32)),
            }),
        )
    }

    fn values(score: u64) -> FieldValues {
        let mut values = FieldValues::new();
        values.insert("score".to_string(), FieldValue::Unsigned(score));
        values
    }

    #[test]
    fn test_attest_and_read_back() {
        let network = MemoryNetwork::new();
        let client = client(&network);

        let first = client.attest("0xschema", "bob", &values(1)).unwrap();
        let second = client.attest("0xschema", "bob", &values(2)).unwrap();
        assert_eq!(first.block_number, 1);
        assert_eq!(second.attestation_index, 1);
        assert_ne!(first.tx_hash, second.tx_hash);
        assert_eq!(first.tx_hash.len(), 66);

        let records = client.get_attestations("0xschema", "bob").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].values["score"], FieldValue::Unsigned(2));
        assert!(client.get_attestations("0xschema", "carol").unwrap().is_empty());
        assert_eq!(network.attestation_count(), 2);
    }

    #[test]
    fn test_update_requires_existing_attestation() {
        let network = MemoryNetwork::new();
        let client = client(&network);
        client.attest("0xschema", "bob", &values(1)).unwrap();

        let receipt = client.update_attestation("0xschema", "bob", 0, &values(9)).unwrap();
        assert_eq!(receipt.block_number, 2);
        let records = client.get_attestations("0xschema", "bob").unwrap();
        assert_eq!(records[0].values["score"], FieldValue::Unsigned(9));

        let err = client.update_attestation("0xschema", "bob", 3, &values(9)).unwrap_err();
        assert_eq!(
            err,
            SdkError::AttestationNotFound {
                subject: "bob".to_string(),
                index: 3
            }
        );
    }

    #[test]
    fn test_fees_and_balances() {
        let network = MemoryNetwork::new();
        let client = client(&network);
        client.attest("0xschema", "bob", &values(1)).unwrap();

        // any SS58 form of the same account sees the same balance
        assert_eq!(client.free_balance(ALICE_GENERIC).unwrap(), UNIT - TX_FEE);

        let poor = network.client(
            Account {
                address: "nobody".to_string(),
                secret: String::new(),
            },
            client.issuer().cloned(),
        );
        let err = poor.attest("0xschema", "bob", &values(1)).unwrap_err();
        assert!(matches!(err, SdkError::InsufficientBalance { available: 0, .. }));
    }

    #[test]
    fn test_offline_rejects_everything() {
        let network = MemoryNetwork::new();
        let client = client(&network);
        network.set_online(false);

        let disconnected = SdkError::Disconnected {
            network: LOCAL_NETWORK.to_string(),
        };
        assert_eq!(client.get_attestations("0xschema", "bob").unwrap_err(), disconnected);
        assert_eq!(client.free_balance(ALICE).unwrap_err(), disconnected);
        assert!(!client.network().is_connected);

        let factory = MemoryClientFactory::new(network.clone(), client.account().clone(), None);
        assert!(factory.connect().is_err());
        network.set_online(true);
        assert!(factory.connect().is_ok());
    }

    #[test]
    fn test_missing_issuer() {
        let network = MemoryNetwork::new();
        network.endow(ALICE, UNIT);
        let client = network.client(
            Account {
                address: ALICE.to_string(),
                secret: String::new(),
            },
            None,
        );
        assert_eq!(client.attest("0xschema", "bob", &values(1)).unwrap_err(), SdkError::NoIssuer);
    }
}
