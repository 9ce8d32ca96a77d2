//! The capability bundle: every global a playground script can reach
//!
//! Scripts have no import mechanism. What they can do is exactly the set of
//! named bindings in a [`CapabilityBundle`], installed as globals before the
//! script runs.

use crate::error::{RuntimeError, RuntimeResult};
use crate::hash;
use crate::log_store::LogStore;
use crate::schema::{create_schema, FieldType};
use crate::sdk::{ClientFactory, ClientHandle};
use crate::serializer::safe_stringify;
use indexmap::IndexMap;
use std::rc::Rc;
use trueplay_script::json::Indent;
use trueplay_script::{Interpreter, Result as ScriptResult, ScriptError, Span, Value};
use trueplay_types::LogStatus;

/// Named bindings injected into a script's global scope
#[derive(Clone, Default)]
pub struct CapabilityBundle {
    bindings: IndexMap<String, Value>,
}

impl CapabilityBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The playground bindings: SDK client factory, schema and field type
    /// constructors, hash and address helpers, and the serializer.
    ///
    /// `addLog` and `LogStatus` are bound by the runner to its own log store.
    pub fn standard(factory: Rc<dyn ClientFactory>) -> Self {
        let mut bundle = Self::new();
        let prefix = factory.ss58_prefix();

        bundle.set("getTrueNetworkInstance", Value::native("getTrueNetworkInstance", move |_, _| {
            let client = factory.connect()?;
            Ok(Value::host(ClientHandle::new(client)))
        }));

        bundle.set(
            "Schema",
            Value::object_from([(
                "create",
                Value::native("create", |_, args| Ok(Value::host(create_schema(&arg(args, 0))?))),
            )]),
        );
        for ty in FieldType::ALL {
            bundle.set(ty.name(), Value::host(ty));
        }

        bundle.set("bytesToBlakeTwo256Hash", Value::native("bytesToBlakeTwo256Hash", |_, args| {
            let bytes = bytes_arg(&arg(args, 0))?;
            Ok(Value::string(hash::bytes_to_blake_two_256_hash(&bytes)))
        }));
        bundle.set("stringToBlakeTwo256Hash", Value::native("stringToBlakeTwo256Hash", |_, args| {
            let text = arg(args, 0).to_display_string();
            Ok(Value::string(hash::string_to_blake_two_256_hash(&text)))
        }));
        bundle.set("getFreeBalance", Value::native("getFreeBalance", |_, args| {
            let api = ClientHandle::from_arg(args, 0)?;
            let address = match arg(args, 1) {
                Value::String(address) => address,
                _ => api.client().account().address.clone(),
            };
            let balance = api.client().free_balance(&address)?;
            Ok(Value::BigInt(i128::try_from(balance).unwrap_or(i128::MAX)))
        }));
        bundle.set("toTrueNetworkAddress", Value::native("toTrueNetworkAddress", move |_, args| {
            let address = arg(args, 0).to_display_string();
            Ok(Value::string(hash::to_network_address(&address, prefix)?))
        }));
        bundle.set("safeStringify", Value::native("safeStringify", |_, args| {
            let indent = args.get(1).map(Indent::from_value).unwrap_or_default();
            Ok(Value::string(safe_stringify(&arg(args, 0), &indent)))
        }));

        bundle
    }

    /// `addLog(message, status)` and the `LogStatus` enum, writing to `store`
    pub fn log_bindings(store: &LogStore) -> Self {
        let mut bundle = Self::new();
        let store = store.clone();

        bundle.set("addLog", Value::native("addLog", move |_, args| {
            let message = match arg(args, 0) {
                Value::String(message) => message,
                Value::Undefined => "undefined".to_string(),
                other => safe_stringify(&other, &Indent::None),
            };
            let status = match arg(args, 1) {
                Value::Undefined => LogStatus::Success,
                raw => {
                    let raw = raw.to_display_string();
                    LogStatus::parse(&raw).ok_or_else(|| {
                        ScriptError::type_error(Span::default(), format!("Unknown log status '{}'", raw))
                    })?
                }
            };
            store.append(message, status);
            Ok(Value::Undefined)
        }));
        bundle.set(
            "LogStatus",
            Value::object_from([
                ("SUCCESS", Value::string(LogStatus::Success.as_str())),
                ("ERROR", Value::string(LogStatus::Error.as_str())),
                ("RESPONSE", Value::string(LogStatus::Response.as_str())),
            ]),
        );
        bundle
    }

    /// Add a binding; names must be identifiers and may not repeat
    pub fn insert(&mut self, name: &str, value: Value) -> RuntimeResult<()> {
        if !is_identifier(name) {
            return Err(RuntimeError::InvalidBindingName(name.to_string()));
        }
        if self.bindings.contains_key(name) {
            return Err(RuntimeError::DuplicateBinding(name.to_string()));
        }
        self.bindings.insert(name.to_string(), value);
        Ok(())
    }

    /// Builder form of [`CapabilityBundle::insert`]
    pub fn with(mut self, name: &str, value: Value) -> RuntimeResult<Self> {
        self.insert(name, value)?;
        Ok(self)
    }

    /// Merge another bundle in, rejecting any name defined twice
    pub fn extend(&mut self, other: CapabilityBundle) -> RuntimeResult<()> {
        for (name, value) in other.bindings {
            self.insert(&name, value)?;
        }
        Ok(())
    }

    // names above are fixed identifiers
    fn set(&mut self, name: &str, value: Value) {
        self.bindings.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Define every binding as a global of `interp`
    pub fn install(&self, interp: &mut Interpreter) {
        for (name, value) in &self.bindings {
            interp.define_global(name, value.clone());
        }
    }
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Bytes from an array of octets, a `0x` hex string, or UTF-8 text
fn bytes_arg(value: &Value) -> ScriptResult<Vec<u8>> {
    match value {
        Value::Array(items) => items
            .borrow()
            .iter()
            .map(|item| match item {
                Value::Number(n) if n.fract() == 0.0 && (0.0..=255.0).contains(n) => Ok(*n as u8),
                other => Err(ScriptError::type_error(
                    Span::default(),
                    format!("Expected a byte (0-255), got {}", other.to_display_string()),
                )),
            })
            .collect(),
        Value::String(s) => match s.strip_prefix("0x").map(hex::decode) {
            Some(Ok(bytes)) => Ok(bytes),
            _ => Ok(s.as_bytes().to_vec()),
        },
        other => Err(ScriptError::type_error(
            Span::default(),
            format!("Expected bytes, got {}", other.type_of()),
        )),
    }
}
