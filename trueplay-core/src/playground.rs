//! The playground: configuration wired to a network client and a runner.

use crate::config::Config;
use crate::templates;
use std::rc::Rc;
use thiserror::Error;
use tracing::info;
use trueplay_runtime::memory::UNIT;
use trueplay_runtime::{
    CapabilityBundle, ClientFactory, MemoryClientFactory, MemoryNetwork, RuntimeError, ScriptRunner,
    UnsupportedNetwork, LOCAL_NETWORK,
};
use trueplay_types::LogEntry;

/// Starting balance of the configured account on a fresh local network
pub const GENESIS_BALANCE: u128 = 1_000 * UNIT;

#[derive(Error, Debug)]
pub enum PlaygroundError {
    #[error("Unknown template '{0}'")]
    UnknownTemplate(String),

    // script values are not Send, so only the message is kept
    #[error("Failed to set up the script runner: {0}")]
    Setup(String),
}

impl From<RuntimeError> for PlaygroundError {
    fn from(err: RuntimeError) -> Self {
        PlaygroundError::Setup(err.to_string())
    }
}

/// A configured runner plus the network it talks to
pub struct Playground {
    runner: ScriptRunner,
    network: Option<MemoryNetwork>,
    network_name: String,
}

impl Playground {
    /// Build the client factory for `config.network` and a runner using the
    /// configured limits. Networks other than `local` connect to nothing:
    /// scripts get an error from `getTrueNetworkInstance()`.
    pub fn from_config(config: &Config) -> Result<Self, PlaygroundError> {
        let network = (config.network == LOCAL_NETWORK).then(|| {
            let network = MemoryNetwork::new();
            network.endow(&config.account.address, GENESIS_BALANCE);
            network
        });
        let factory: Rc<dyn ClientFactory> = match &network {
            Some(network) => Rc::new(
                MemoryClientFactory::new(network.clone(), config.account.clone(), config.issuer.clone())
                    .with_ss58_prefix(config.ss58_prefix),
            ),
            None => Rc::new(UnsupportedNetwork::new(config.network.clone())),
        };

        let runner = ScriptRunner::new(CapabilityBundle::standard(factory), config.limits())?;
        info!(network = %config.network, "Playground ready");
        Ok(Self {
            runner,
            network,
            network_name: config.network.clone(),
        })
    }

    pub fn run_source(&mut self, source: &str) -> Vec<LogEntry> {
        self.runner.run_script(source)
    }

    pub fn run_template(&mut self, id: &str) -> Result<Vec<LogEntry>, PlaygroundError> {
        let template = templates::get_by_id(id).ok_or_else(|| PlaygroundError::UnknownTemplate(id.to_string()))?;
        info!(template = template.id, "Running template");
        Ok(self.runner.run_script(template.code))
    }

    /// The in-memory ledger, when running against `local`
    pub fn network(&self) -> Option<&MemoryNetwork> {
        self.network.as_ref()
    }

    pub fn network_name(&self) -> &str {
        &self.network_name
    }

    pub fn runner(&self) -> &ScriptRunner {
        &self.runner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trueplay_types::LogStatus;

    #[test]
    fn test_local_playground_runs_source() {
        let mut playground = Playground::from_config(&Config::default()).unwrap();
        let logs = playground.run_source("const api = await getTrueNetworkInstance(); return api.network.name");
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, LogStatus::Response);
        assert_eq!(logs[0].message, "\"local\"");
        assert!(playground.network().is_some());
    }

    #[test]
    fn test_other_networks_reject_connection() {
        let config = Config {
            network: "testnet".to_string(),
            ..Config::default()
        };
        let mut playground = Playground::from_config(&config).unwrap();
        assert!(playground.network().is_none());

        let logs = playground.run_template("attestation-read").unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, LogStatus::Error);
        assert_eq!(
            logs[0].message,
            "Network 'testnet' is not supported, only 'local' is available"
        );
    }

    #[test]
    fn test_unknown_template() {
        let mut playground = Playground::from_config(&Config::default()).unwrap();
        let err = playground.run_template("nope").unwrap_err();
        assert_eq!(err.to_string(), "Unknown template 'nope'");
    }

    #[test]
    fn test_configured_prefix_reaches_scripts() {
        let config = Config {
            ss58_prefix: 42,
            ..Config::default()
        };
        let mut playground = Playground::from_config(&config).unwrap();
        let logs = playground.run_source(r#"return toTrueNetworkAddress("nJrsrH8dov9Z36kTDpabgCZT8CbK1FbmjJvfU6qbMTG4g4c")"#);
        assert_eq!(logs[0].message, "\"5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY\"");
    }
}
