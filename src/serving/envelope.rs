//! Wire envelopes shared by every endpoint.
//!
//! Requests carry the endpoint payload as the first element of the first input's
//! `data`, either as a JSON object or as a JSON-encoded string. Responses carry
//! either typed outputs (`<endpoint>-ok`) or exactly one `message` output
//! (`<endpoint>-error`), never both.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

pub const DATATYPE_STRING: &str = "STRING";
pub const DATATYPE_BYTES: &str = "BYTES";
pub const DATATYPE_JSON: &str = "JSON";

/// Name of the single output of an error envelope.
pub const ERROR_OUTPUT: &str = "message";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub datatype: String,
    #[serde(default)]
    pub shape: Vec<usize>,
    pub data: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub inputs: Vec<RequestInput>,
}

impl InferRequest {
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| Error::malformed(format!("invalid request body: {}", e)))
    }

    /// Wrap one payload object the way callers send it.
    pub fn with_payload(payload: Value) -> Self {
        Self {
            id: None,
            inputs: vec![RequestInput {
                name: "payload".to_string(),
                datatype: DATATYPE_BYTES.to_string(),
                shape: vec![1],
                data: vec![payload],
            }],
        }
    }

    /// Decode the endpoint payload from `inputs[0].data[0]`.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        let raw = self
            .inputs
            .first()
            .and_then(|input| input.data.first())
            .ok_or_else(|| Error::malformed("request has no input data"))?;
        let decoded = match raw {
            Value::String(text) => serde_json::from_str(text),
            Value::Object(_) => T::deserialize(raw),
            _ => return Err(Error::malformed("payload must be a JSON object or JSON string")),
        };
        decoded.map_err(|e| Error::malformed(format!("invalid payload: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputTensor {
    pub name: String,
    pub datatype: String,
    pub shape: Vec<usize>,
    pub data: Vec<Value>,
}

impl OutputTensor {
    pub fn strings(name: &str, values: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            datatype: DATATYPE_STRING.to_string(),
            shape: vec![values.len()],
            data: values.into_iter().map(Value::String).collect(),
        }
    }

    pub fn json(name: &str, values: Vec<Value>) -> Self {
        Self {
            name: name.to_string(),
            datatype: DATATYPE_JSON.to_string(),
            shape: vec![values.len()],
            data: values,
        }
    }

    /// String entries of `data`, skipping anything that is not a string.
    pub fn as_strings(&self) -> Vec<&str> {
        self.data.iter().filter_map(Value::as_str).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferResponse {
    pub model_name: String,
    pub id: String,
    pub outputs: Vec<OutputTensor>,
}

impl InferResponse {
    pub fn ok(endpoint: &str, outputs: Vec<OutputTensor>) -> Self {
        Self {
            model_name: endpoint.to_string(),
            id: format!("{}-ok", endpoint),
            outputs,
        }
    }

    pub fn error(endpoint: &str, message: impl Into<String>) -> Self {
        Self {
            model_name: endpoint.to_string(),
            id: format!("{}-error", endpoint),
            outputs: vec![OutputTensor {
                name: ERROR_OUTPUT.to_string(),
                datatype: DATATYPE_BYTES.to_string(),
                shape: vec![1],
                data: vec![Value::String(message.into())],
            }],
        }
    }

    pub fn is_error(&self) -> bool {
        self.id.ends_with("-error")
    }

    pub fn output(&self, name: &str) -> Option<&OutputTensor> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Message of an error envelope.
    pub fn error_message(&self) -> Option<&str> {
        if !self.is_error() {
            return None;
        }
        self.output(ERROR_OUTPUT)
            .and_then(|o| o.data.first())
            .and_then(Value::as_str)
    }
}
