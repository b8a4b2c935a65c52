//! Payload values crossing the worker/host boundary.
//!
//! The runtime treats payloads as opaque blobs: it forwards `EncodedValues`
//! between responses and promises without looking inside. Typed access goes
//! through a `DataConverter`; `JsonConverter` is the default.

use crate::error::WorkerError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const METADATA_ENCODING_KEY: &str = "encoding";
pub const ENCODING_JSON: &str = "json/plain";
pub const ENCODING_NULL: &str = "binary/null";

/// A single encoded value plus its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub data: Vec<u8>,
}

impl Payload {
    pub fn encoding(&self) -> Option<&str> {
        self.metadata.get(METADATA_ENCODING_KEY).map(String::as_str)
    }
}

/// Converts between typed values and payloads.
pub trait DataConverter {
    fn to_payload<T: Serialize + ?Sized>(&self, value: &T) -> Result<Payload, WorkerError>;
    fn from_payload<T: DeserializeOwned>(&self, payload: &Payload) -> Result<T, WorkerError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter;

impl DataConverter for JsonConverter {
    fn to_payload<T: Serialize + ?Sized>(&self, value: &T) -> Result<Payload, WorkerError> {
        let value = serde_json::to_value(value).map_err(|e| WorkerError::Codec(e.to_string()))?;
        let mut metadata = BTreeMap::new();
        if value.is_null() {
            metadata.insert(METADATA_ENCODING_KEY.to_string(), ENCODING_NULL.to_string());
            return Ok(Payload {
                metadata,
                data: Vec::new(),
            });
        }
        metadata.insert(METADATA_ENCODING_KEY.to_string(), ENCODING_JSON.to_string());
        let data = serde_json::to_vec(&value).map_err(|e| WorkerError::Codec(e.to_string()))?;
        Ok(Payload { metadata, data })
    }

    fn from_payload<T: DeserializeOwned>(&self, payload: &Payload) -> Result<T, WorkerError> {
        match payload.encoding() {
            Some(ENCODING_NULL) => serde_json::from_value(Value::Null).map_err(|e| WorkerError::Codec(e.to_string())),
            // Untagged payloads are assumed to be JSON.
            Some(ENCODING_JSON) | None => {
                serde_json::from_slice(&payload.data).map_err(|e| WorkerError::Codec(e.to_string()))
            }
            Some(other) => Err(WorkerError::Codec(format!("unsupported payload encoding {other:?}"))),
        }
    }
}

/// Immutable, ordered list of payloads.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedValues {
    payloads: Vec<Payload>,
}

impl EncodedValues {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_payloads(payloads: Vec<Payload>) -> Self {
        Self { payloads }
    }

    /// A single `null` value; the conventional result of lifecycle commands.
    pub fn null() -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(METADATA_ENCODING_KEY.to_string(), ENCODING_NULL.to_string());
        Self {
            payloads: vec![Payload {
                metadata,
                data: Vec::new(),
            }],
        }
    }

    pub fn from_value<T: Serialize + ?Sized>(value: &T) -> Result<Self, WorkerError> {
        Ok(Self {
            payloads: vec![JsonConverter.to_payload(value)?],
        })
    }

    pub fn from_values<T: Serialize>(values: &[T]) -> Result<Self, WorkerError> {
        let payloads = values
            .iter()
            .map(|v| JsonConverter.to_payload(v))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { payloads })
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    pub fn payloads(&self) -> &[Payload] {
        &self.payloads
    }

    /// Decode the value at `index` with the JSON converter.
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> Result<T, WorkerError> {
        self.get_with(&JsonConverter, index)
    }

    pub fn get_with<T: DeserializeOwned, C: DataConverter>(&self, converter: &C, index: usize) -> Result<T, WorkerError> {
        let payload = self
            .payloads
            .get(index)
            .ok_or_else(|| WorkerError::Codec(format!("no value at index {index} (have {})", self.payloads.len())))?;
        converter.from_payload(payload)
    }

    /// Serialize the whole value list to bytes.
    pub fn encode(&self) -> Result<Vec<u8>, WorkerError> {
        serde_json::to_vec(self).map_err(|e| WorkerError::Codec(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WorkerError> {
        serde_json::from_slice(bytes).map_err(|e| WorkerError::Codec(e.to_string()))
    }
}
