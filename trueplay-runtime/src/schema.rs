//! Attestation schemas and their field types
//!
//! `Schema.create({ name: Text, score: U8 })` builds a [`Schema`] host
//! object. Field values are validated against their [`FieldType`] before
//! anything is sent to the client, and 64-bit fields come back to scripts as
//! BigInt.

use crate::error::SdkError;
use crate::hash::{blake2_256, parse_hash, to_hex};
use crate::sdk::{AttestationRecord, ClientHandle, FieldValue, FieldValues, Receipt, SdkResult};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use trueplay_script::{HostObject, Interpreter, PropertyMap, Result as ScriptResult, ScriptError, Span, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Hash,
    Text,
    Char,
}

impl FieldType {
    pub const ALL: [FieldType; 13] = [
        FieldType::U8,
        FieldType::U16,
        FieldType::U32,
        FieldType::U64,
        FieldType::I8,
        FieldType::I16,
        FieldType::I32,
        FieldType::I64,
        FieldType::F32,
        FieldType::F64,
        FieldType::Hash,
        FieldType::Text,
        FieldType::Char,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::U8 => "U8",
            FieldType::U16 => "U16",
            FieldType::U32 => "U32",
            FieldType::U64 => "U64",
            FieldType::I8 => "I8",
            FieldType::I16 => "I16",
            FieldType::I32 => "I32",
            FieldType::I64 => "I64",
            FieldType::F32 => "F32",
            FieldType::F64 => "F64",
            FieldType::Hash => "Hash",
            FieldType::Text => "Text",
            FieldType::Char => "Char",
        }
    }

    /// Stable tag mixed into the schema hash
    fn tag(&self) -> u8 {
        match self {
            FieldType::U8 => 0,
            FieldType::U16 => 1,
            FieldType::U32 => 2,
            FieldType::U64 => 3,
            FieldType::I8 => 4,
            FieldType::I16 => 5,
            FieldType::I32 => 6,
            FieldType::I64 => 7,
            FieldType::F32 => 8,
            FieldType::F64 => 9,
            FieldType::Hash => 10,
            FieldType::Text => 11,
            FieldType::Char => 12,
        }
    }

    fn unsigned_max(&self) -> Option<u64> {
        match self {
            FieldType::U8 => Some(u64::from(u8::MAX)),
            FieldType::U16 => Some(u64::from(u16::MAX)),
            FieldType::U32 => Some(u64::from(u32::MAX)),
            FieldType::U64 => Some(u64::MAX),
            _ => None,
        }
    }

    fn signed_range(&self) -> Option<(i64, i64)> {
        match self {
            FieldType::I8 => Some((i64::from(i8::MIN), i64::from(i8::MAX))),
            FieldType::I16 => Some((i64::from(i16::MIN), i64::from(i16::MAX))),
            FieldType::I32 => Some((i64::from(i32::MIN), i64::from(i32::MAX))),
            FieldType::I64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    /// Check a script value against this type and convert it for the ledger
    pub fn encode(&self, field: &str, value: &Value) -> SdkResult<FieldValue> {
        let invalid = |reason: String| SdkError::InvalidField {
            field: field.to_string(),
            kind: self.name().to_string(),
            reason,
        };

        let integer = || integer_of(value).ok_or_else(|| invalid(format!("expected an integer, got {}", describe(value))));

        match self {
            FieldType::U8 | FieldType::U16 | FieldType::U32 | FieldType::U64 => {
                let max = self.unsigned_max().unwrap_or(u64::MAX);
                let n = integer()?;
                u64::try_from(n)
                    .ok()
                    .filter(|n| *n <= max)
                    .map(FieldValue::Unsigned)
                    .ok_or_else(|| invalid(format!("{} is outside 0..={}", n, max)))
            }
            FieldType::I8 | FieldType::I16 | FieldType::I32 | FieldType::I64 => {
                let (min, max) = self.signed_range().unwrap_or((i64::MIN, i64::MAX));
                let n = integer()?;
                i64::try_from(n)
                    .ok()
                    .filter(|n| (min..=max).contains(n))
                    .map(FieldValue::Signed)
                    .ok_or_else(|| invalid(format!("{} is outside {}..={}", n, min, max)))
            }
            FieldType::F32 | FieldType::F64 => {
                let n = match value {
                    Value::Number(n) => *n,
                    Value::BigInt(n) => *n as f64,
                    other => return Err(invalid(format!("expected a number, got {}", describe(other)))),
                };
                if !n.is_finite() {
                    return Err(invalid("expected a finite number".to_string()));
                }
                if *self == FieldType::F32 {
                    if n.abs() > f64::from(f32::MAX) {
                        return Err(invalid(format!("{} does not fit in 32 bits", n)));
                    }
                    return Ok(FieldValue::Float(f64::from(n as f32)));
                }
                Ok(FieldValue::Float(n))
            }
            FieldType::Hash => match value {
                Value::String(s) if parse_hash(&s.to_ascii_lowercase()).is_some() => {
                    Ok(FieldValue::Text(s.to_ascii_lowercase()))
                }
                other => Err(invalid(format!(
                    "expected 0x followed by 64 hex digits, got {}",
                    describe(other)
                ))),
            },
            FieldType::Text => match value {
                Value::String(s) => Ok(FieldValue::Text(s.clone())),
                other => Err(invalid(format!("expected a string, got {}", describe(other)))),
            },
            FieldType::Char => match value {
                Value::String(s) if s.chars().count() == 1 => Ok(FieldValue::Text(s.clone())),
                other => Err(invalid(format!("expected a single character, got {}", describe(other)))),
            },
        }
    }

    /// Script value of a stored field
    pub fn decode(&self, value: &FieldValue) -> Value {
        match (self, value) {
            (FieldType::U64, FieldValue::Unsigned(n)) => Value::BigInt(i128::from(*n)),
            (FieldType::I64, FieldValue::Signed(n)) => Value::BigInt(i128::from(*n)),
            (_, FieldValue::Unsigned(n)) => Value::Number(*n as f64),
            (_, FieldValue::Signed(n)) => Value::Number(*n as f64),
            (_, FieldValue::Float(n)) => Value::Number(*n),
            (_, FieldValue::Text(s)) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Field type constructors (`U8`, `Text`, ...) are host values
impl HostObject for FieldType {
    fn type_name(&self) -> &str {
        self.name()
    }

    fn get(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::string(self.name())),
            _ => None,
        }
    }

    fn to_json(&self) -> Option<serde_json::Value> {
        Some(serde_json::Value::String(self.name().to_string()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Integral value of a Number or BigInt
fn integer_of(value: &Value) -> Option<i128> {
    match value {
        Value::BigInt(n) => Some(*n),
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 => Some(*n as i128),
        _ => None,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Number(_) | Value::BigInt(_) | Value::Bool(_) => value.to_display_string(),
        other => other.type_of().to_string(),
    }
}

/// An attestation schema: named, typed fields plus their hash
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    fields: Vec<(String, FieldType)>,
    hash: String,
}

impl Schema {
    pub fn new(fields: Vec<(String, FieldType)>) -> Result<Self, SdkError> {
        if fields.is_empty() {
            return Err(SdkError::InvalidField {
                field: String::new(),
                kind: "Schema".to_string(),
                reason: "a schema needs at least one field".to_string(),
            });
        }
        let hash = schema_hash(&fields);
        Ok(Self { fields, hash })
    }

    pub fn fields(&self) -> &[(String, FieldType)] {
        &self.fields
    }

    /// `0x`-prefixed BLAKE2b-256 identifier of the field layout
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Validate an object of field values against the schema
    pub fn encode_values(&self, values: &Value) -> SdkResult<FieldValues> {
        let Value::Object(props) = values else {
            return Err(SdkError::InvalidField {
                field: String::new(),
                kind: "Schema".to_string(),
                reason: format!("expected an object of field values, got {}", describe(values)),
            });
        };
        let props = props.borrow();

        if let Some(unknown) = props.keys().find(|key| !self.fields.iter().any(|(name, _)| name == *key)) {
            return Err(SdkError::UnknownField(unknown.clone()));
        }

        let mut encoded = FieldValues::new();
        for (name, ty) in &self.fields {
            let value = props
                .get(name)
                .filter(|v| !matches!(v, Value::Undefined))
                .ok_or_else(|| SdkError::MissingField(name.clone()))?;
            encoded.insert(name.clone(), ty.encode(name, value)?);
        }
        Ok(encoded)
    }

    /// Script object of a stored attestation
    pub fn record_value(&self, record: &AttestationRecord) -> Value {
        let mut values = PropertyMap::new();
        for (name, ty) in &self.fields {
            if let Some(stored) = record.values.get(name) {
                values.insert(name.clone(), ty.decode(stored));
            }
        }
        Value::object_from([
            ("attestationIndex", Value::Number(record.index as f64)),
            ("issuer", Value::string(record.issuer_hash.clone())),
            ("subject", Value::string(record.subject.clone())),
            ("blockNumber", Value::BigInt(i128::from(record.block_number))),
            ("values", Value::object(values)),
        ])
    }

    fn fields_value(&self) -> Value {
        Value::object(
            self.fields
                .iter()
                .map(|(name, ty)| (name.clone(), Value::string(ty.name())))
                .collect(),
        )
    }
}

/// Script-facing SDK calls: `schema.attest(api, subject, values)` and friends
impl Schema {
    fn attest(&self, args: &[Value]) -> ScriptResult<Value> {
        let api = ClientHandle::from_arg(args, 0)?;
        let subject = subject_arg(args, 1)?;
        let values = self.encode_values(args.get(2).unwrap_or(&Value::Undefined))?;
        let receipt = api.client().attest(&self.hash, &subject, &values)?;
        tracing::debug!(schema = %self.hash, %subject, tx = %receipt.tx_hash, "Attested");
        Ok(receipt_value(&receipt))
    }

    fn update_attestation(&self, args: &[Value]) -> ScriptResult<Value> {
        let api = ClientHandle::from_arg(args, 0)?;
        let subject = subject_arg(args, 1)?;
        let index = index_arg(args, 2)?;
        let values = self.encode_values(args.get(3).unwrap_or(&Value::Undefined))?;
        let receipt = api.client().update_attestation(&self.hash, &subject, index, &values)?;
        tracing::debug!(schema = %self.hash, %subject, index, tx = %receipt.tx_hash, "Updated attestation");
        Ok(receipt_value(&receipt))
    }

    fn get_attestations(&self, args: &[Value]) -> ScriptResult<Value> {
        let api = ClientHandle::from_arg(args, 0)?;
        let subject = subject_arg(args, 1)?;
        let records = api.client().get_attestations(&self.hash, &subject)?;
        Ok(Value::array(records.iter().map(|record| self.record_value(record)).collect()))
    }
}

/// Hash over the fields sorted by name, so key order does not matter
fn schema_hash(fields: &[(String, FieldType)]) -> String {
    let mut sorted: Vec<_> = fields.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    let mut bytes = Vec::new();
    for (name, ty) in sorted {
        bytes.extend_from_slice(name.as_bytes());
        bytes.push(0);
        bytes.push(ty.tag());
    }
    to_hex(&blake2_256(&bytes))
}

fn receipt_value(receipt: &Receipt) -> Value {
    Value::object_from([
        ("txHash", Value::string(receipt.tx_hash.clone())),
        ("blockHash", Value::string(receipt.block_hash.clone())),
        ("blockNumber", Value::Number(receipt.block_number as f64)),
        ("schemaHash", Value::string(receipt.schema_hash.clone())),
        ("subject", Value::string(receipt.subject.clone())),
        ("attestationIndex", Value::Number(receipt.attestation_index as f64)),
    ])
}

fn subject_arg(args: &[Value], index: usize) -> ScriptResult<String> {
    match args.get(index) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        other => Err(ScriptError::type_error(
            Span::default(),
            format!(
                "Expected a subject address string, got {}",
                describe(other.unwrap_or(&Value::Undefined))
            ),
        )),
    }
}

fn index_arg(args: &[Value], index: usize) -> ScriptResult<usize> {
    match args.get(index).and_then(integer_of) {
        Some(n) if n >= 0 => usize::try_from(n)
            .map_err(|_| ScriptError::range_error(Span::default(), "Attestation index is too large")),
        _ => Err(ScriptError::type_error(
            Span::default(),
            "Expected a non-negative attestation index",
        )),
    }
}

impl HostObject for Schema {
    fn type_name(&self) -> &str {
        "Schema"
    }

    fn get(&self, name: &str) -> Option<Value> {
        match name {
            "hash" | "schemaHash" => Some(Value::string(self.hash.clone())),
            "fields" => Some(self.fields_value()),
            _ => None,
        }
    }

    fn call_method(&self, _interp: &mut Interpreter, name: &str, args: &[Value]) -> Option<ScriptResult<Value>> {
        let result = match name {
            "getSchemaHash" => Ok(Value::string(self.hash.clone())),
            "attest" => self.attest(args),
            "updateAttestation" => self.update_attestation(args),
            "getAttestations" => self.get_attestations(args),
            _ => return None,
        };
        Some(result)
    }

    fn to_json(&self) -> Option<serde_json::Value> {
        let fields: serde_json::Map<_, _> = self
            .fields
            .iter()
            .map(|(name, ty)| (name.clone(), serde_json::Value::String(ty.name().to_string())))
            .collect();
        Some(serde_json::json!({ "hash": self.hash, "fields": fields }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `Schema.create(definition)`
pub fn create_schema(definition: &Value) -> ScriptResult<Schema> {
    let Value::Object(props) = definition else {
        return Err(ScriptError::type_error(
            Span::default(),
            "Schema.create expects an object of field types",
        ));
    };

    let mut fields = Vec::new();
    for (name, ty) in props.borrow().iter() {
        let ty = ty.as_host::<FieldType>().copied().ok_or_else(|| {
            ScriptError::type_error(
                Span::default(),
                format!("Field '{}' must be a schema type such as Text or U64", name),
            )
        })?;
        fields.push((name.clone(), ty));
    }
    Ok(Schema::new(fields)?)
}
