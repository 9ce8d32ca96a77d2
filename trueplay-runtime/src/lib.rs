//! trueplay runtime - running playground scripts against an attestation network
//!
//! This crate turns a snippet of script source into an ordered log of what
//! happened. It includes:
//!
//! - **Script runner**: the harness around a run (log clearing, console
//!   capture, final RESPONSE or ERROR entry)
//! - **Log store**: the append-only list of [`LogEntry`] values a run produces
//! - **Value serializer**: JSON display of any script value, BigInts included
//! - **Capability bundle**: the globals a script may use in place of imports
//! - **SDK seam**: the [`AttestationClient`] and [`ClientFactory`] traits plus
//!   an in-memory network implementing them
//! - **Schemas and hashes**: field types, schema hashing, BLAKE2 digests and
//!   SS58 addresses
//!
//! ## Architecture
//!
//! A run goes through three stages:
//!
//! 1. **Harness**: the runner clears its log and installs a console sink that
//!    appends every `console.*` call as an entry
//! 2. **Evaluation**: a [`ScriptEvaluator`] executes the source with the
//!    bundle's bindings as globals
//! 3. **Outcome**: the return value is serialized into a RESPONSE entry, or
//!    the failure becomes an ERROR entry
//!
//! The console sink is restored by a guard when evaluation returns, whether
//! the script succeeded, threw, or hit an execution limit.
//!
//! ## Example
//!
//! ```rust
//! use std::rc::Rc;
//! use trueplay_runtime::{
//!     Account, CapabilityBundle, ExecutionLimits, LogStatus, MemoryClientFactory, MemoryNetwork, ScriptRunner,
//! };
//!
//! let network = MemoryNetwork::new();
//! let account = Account { address: "alice".into(), secret: String::new() };
//! let factory = MemoryClientFactory::new(network, account, None);
//!
//! let bundle = CapabilityBundle::standard(Rc::new(factory));
//! let mut runner = ScriptRunner::new(bundle, ExecutionLimits::default()).unwrap();
//!
//! let logs = runner.run_script("console.log('hi'); return { answer: 42n }");
//! assert_eq!(logs[0].status, LogStatus::Success);
//! assert_eq!(logs[1].status, LogStatus::Response);
//! assert_eq!(logs[1].message, "{\n  \"answer\": 42\n}");
//! ```
//!
//! ## Isolation
//!
//! There is none beyond the bundle: a script can reach exactly the bindings
//! it is given, and execution limits bound its time, steps and call depth.

pub mod bindings;
pub mod error;
pub mod hash;
pub mod log_store;
pub mod memory;
pub mod runner;
pub mod schema;
pub mod sdk;
pub mod serializer;

// Re-export main types
pub use bindings::CapabilityBundle;

pub use error::{RuntimeError, RuntimeResult, SdkError};

pub use log_store::LogStore;

pub use memory::{MemoryClient, MemoryClientFactory, MemoryNetwork, LOCAL_NETWORK};

pub use runner::{InterpreterEvaluator, ScriptEvaluator, ScriptRunner};

pub use schema::{FieldType, Schema};

pub use sdk::{
    Account, AttestationClient, AttestationRecord, ClientFactory, FieldValue, Issuer, NetworkInfo, Receipt,
    UnsupportedNetwork,
};

pub use serializer::safe_stringify;

pub use trueplay_script::{ExecutionLimits, MAX_CALL_DEPTH};
pub use trueplay_types::{LogEntry, LogStatus};

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_runner_creation() {
        let factory = UnsupportedNetwork::new("testnet");
        let runner = ScriptRunner::new(CapabilityBundle::standard(Rc::new(factory)), ExecutionLimits::default());
        let runner = runner.unwrap();
        assert!(runner.bindings().contains("getTrueNetworkInstance"));
        assert!(runner.bindings().contains("addLog"));
        assert!(runner.logs().is_empty());
    }

    #[test]
    fn test_bundle_rejects_log_binding_clash() {
        let bundle = CapabilityBundle::new().with("addLog", trueplay_script::Value::Null).unwrap();
        let err = ScriptRunner::new(bundle, ExecutionLimits::default()).err();
        assert!(matches!(err, Some(RuntimeError::DuplicateBinding(name)) if name == "addLog"));
    }
}
