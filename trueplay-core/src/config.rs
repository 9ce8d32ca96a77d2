//! Configuration parsing and management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use trueplay_runtime::{Account, ExecutionLimits, Issuer, LOCAL_NETWORK, MAX_CALL_DEPTH};

/// Environment variable that overrides `account.secret`
pub const SECRET_KEY_ENV: &str = "TRUEPLAY_SECRET_KEY";

/// File name looked up when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "trueplay.yml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

/// Main configuration struct matching the trueplay.yml schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_network")]
    pub network: String,

    #[serde(default = "default_account")]
    pub account: Account,

    #[serde(default = "default_issuer")]
    pub issuer: Option<Issuer>,

    #[serde(default = "default_ss58_prefix")]
    pub ss58_prefix: u16,

    #[serde(default)]
    pub runner: RunnerConfig,

    // Internal: path the config was loaded from
    #[serde(skip)]
    pub(crate) config_path: Option<PathBuf>,
}

fn default_network() -> String {
    LOCAL_NETWORK.to_string()
}

fn default_account() -> Account {
    Account {
        address: "hd73pQXLhrYFTYq8JrvfHWtQDCMxvvhFBrgdW8bY1zkJhiS".to_string(),
        secret: String::new(),
    }
}

fn default_issuer() -> Option<Issuer> {
    Some(Issuer {
        name: "Playground".to_string(),
        hash: "0x8e8dec429b2f4aa205ca3d3f009133b4ed41d4a898cce0b2f0e1eef71d963ee7".to_string(),
    })
}

fn default_ss58_prefix() -> u16 {
    7
}

/// Execution limits applied to every run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_steps")]
    pub max_steps: u64,

    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_max_steps() -> u64 {
    5_000_000
}

fn default_max_call_depth() -> usize {
    64
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_steps: default_max_steps(),
            max_call_depth: default_max_call_depth(),
        }
    }
}

impl RunnerConfig {
    /// A zero `timeout_ms` or `max_steps` disables that limit
    pub fn limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            timeout: (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms)),
            max_steps: (self.max_steps > 0).then_some(self.max_steps),
            max_call_depth: self.max_call_depth,
            ..ExecutionLimits::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: default_network(),
            account: default_account(),
            issuer: default_issuer(),
            ss58_prefix: default_ss58_prefix(),
            runner: RunnerConfig::default(),
            config_path: None,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse and validate YAML text, applying the secret key override
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        // an empty file deserializes to unit, not a mapping
        let mut config: Config = if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            let mut config = Config::default();
            config.apply_env();
            Ok(config)
        }
    }

    fn apply_env(&mut self) {
        if let Ok(secret) = std::env::var(SECRET_KEY_ENV) {
            if !secret.trim().is_empty() {
                self.account.secret = secret.trim().to_string();
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.network.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "network".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.account.address.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "account.address".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.ss58_prefix > 16_383 {
            return Err(ConfigError::Invalid {
                field: "ss58_prefix".into(),
                reason: format!("{} is above the SS58 maximum of 16383", self.ss58_prefix),
            });
        }
        if let Some(issuer) = &self.issuer {
            let digits = issuer.hash.strip_prefix("0x").unwrap_or(&issuer.hash);
            if digits.len() != 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ConfigError::Invalid {
                    field: "issuer.hash".into(),
                    reason: "expected 32 bytes of 0x-prefixed hex".into(),
                });
            }
        }
        if self.runner.max_call_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "runner.max_call_depth".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.runner.max_call_depth > MAX_CALL_DEPTH {
            return Err(ConfigError::Invalid {
                field: "runner.max_call_depth".into(),
                reason: format!("{} is above the maximum of {}", self.runner.max_call_depth, MAX_CALL_DEPTH),
            });
        }
        Ok(())
    }

    /// Path the config was read from, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn limits(&self) -> ExecutionLimits {
        self.runner.limits()
    }

    /// Serialize back to YAML (the secret is never written out)
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        let mut public = self.clone();
        public.account.secret.clear();
        Ok(serde_yaml::to_string(&public)?)
    }

    /// Get a nested config value using dotted path (e.g., "runner.timeout_ms")
    pub fn get(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["network"] => Some(self.network.clone()),
            ["account", "address"] => Some(self.account.address.clone()),
            ["issuer", "name"] => self.issuer.as_ref().map(|i| i.name.clone()),
            ["issuer", "hash"] => self.issuer.as_ref().map(|i| i.hash.clone()),
            ["ss58_prefix"] => Some(self.ss58_prefix.to_string()),
            ["runner", "timeout_ms"] => Some(self.runner.timeout_ms.to_string()),
            ["runner", "max_steps"] => Some(self.runner.max_steps.to_string()),
            ["runner", "max_call_depth"] => Some(self.runner.max_call_depth.to_string()),
            _ => None,
        }
    }
}

/// Commented starter file written by `trueplay init`
pub const DEFAULT_CONFIG_YAML: &str = r#"# trueplay configuration

# Network the scripts talk to: local | testnet | mainnet
network: local

account:
  address: hd73pQXLhrYFTYq8JrvfHWtQDCMxvvhFBrgdW8bY1zkJhiS
  # Prefer the TRUEPLAY_SECRET_KEY environment variable
  secret: ""

issuer:
  name: Playground
  hash: "0x8e8dec429b2f4aa205ca3d3f009133b4ed41d4a898cce0b2f0e1eef71d963ee7"

ss58_prefix: 7

runner:
  timeout_ms: 5000
  max_steps: 5000000
  max_call_depth: 64
"#;
