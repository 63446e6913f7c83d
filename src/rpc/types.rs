//! JSON-RPC 2.0 wire types for the translation service.
//!
//! One method is exposed: `translate_stacktrace`, taking the infolog either
//! positionally (`[infolog]`) or by name (`{"infolog": ...}`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";
pub const TRANSLATE_METHOD: &str = "translate_stacktrace";

/// Translation failed; `message` is the sanitized reason
pub const FATAL_ERROR_CODE: i64 = -32000;
pub const PARSE_ERROR_CODE: i64 = -32700;
pub const INVALID_REQUEST_CODE: i64 = -32600;
pub const METHOD_NOT_FOUND_CODE: i64 = -32601;
pub const INVALID_PARAMS_CODE: i64 = -32602;

/// JSON-RPC 2.0 request structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

impl JsonRpcRequest {
    /// Create a new `translate_stacktrace` request
    ///
    /// # Arguments
    /// * `infolog` - Log text containing the crash or hang report
    /// * `id` - Request ID (for response correlation)
    pub fn translate_stacktrace(infolog: impl Into<String>, id: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: TRANSLATE_METHOD.to_string(),
            params: serde_json::json!([infolog.into()]),
            id: Value::from(id),
        }
    }

    /// The infolog argument, positional or named
    pub fn infolog(&self) -> Option<&str> {
        match &self.params {
            Value::Array(items) if items.len() == 1 => items[0].as_str(),
            Value::Object(map) => map.get("infolog").and_then(Value::as_str),
            _ => None,
        }
    }
}

/// JSON-RPC 2.0 response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse<T> {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl<T> JsonRpcResponse<T> {
    pub fn success(id: Value, result: T) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}
