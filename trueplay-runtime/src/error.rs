//! Error types for the runtime crate

use trueplay_script::{ScriptError, Span, Value};

/// Errors reported by an attestation client
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SdkError {
    #[error("Unable to reach the {network} network: disconnected")]
    Disconnected { network: String },

    #[error("Network '{0}' is not supported, only 'local' is available")]
    Unsupported(String),

    #[error("No issuer is registered for this client")]
    NoIssuer,

    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Missing value for schema field '{0}'")]
    MissingField(String),

    #[error("Unknown schema field '{0}'")]
    UnknownField(String),

    #[error("Invalid value for {kind} field '{field}': {reason}")]
    InvalidField { field: String, kind: String, reason: String },

    #[error("No attestation at index {index} for subject {subject}")]
    AttestationNotFound { subject: String, index: usize },

    #[error("Insufficient balance for {address}: {available} available, {required} required")]
    InsufficientBalance {
        address: String,
        available: u128,
        required: u128,
    },
}

impl SdkError {
    pub fn invalid_address(address: &str, reason: impl Into<String>) -> Self {
        SdkError::InvalidAddress {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// The rejection a script observes from an SDK call
    pub fn into_script_error(self) -> ScriptError {
        ScriptError::Thrown {
            span: Span::default(),
            value: Value::error_object("Error", &self.to_string()),
        }
    }
}

impl From<SdkError> for ScriptError {
    fn from(err: SdkError) -> Self {
        err.into_script_error()
    }
}

/// Errors raised while assembling or driving a runner
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Binding '{0}' is already defined")]
    DuplicateBinding(String),

    #[error("Invalid binding name '{0}'")]
    InvalidBindingName(String),

    #[error(transparent)]
    Sdk(#[from] SdkError),

    #[error(transparent)]
    Script(#[from] ScriptError),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
