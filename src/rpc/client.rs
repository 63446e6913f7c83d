//! HTTP client for a remote translation service.

use super::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, FATAL_ERROR_CODE, METHOD_NOT_FOUND_CODE};
use crate::parser::TranslationResult;
use crate::utils::config::DEFAULT_RPC_TIMEOUT;
use crate::utils::error::RpcError;
use log::{debug, info};
use reqwest::blocking::Client;
use std::time::Duration;

/// RPC client for the `translate_stacktrace` service
pub struct RpcClient {
    client: Client,
    rpc_url: String,
}

impl RpcClient {
    /// Create a new RPC client
    pub fn new(rpc_url: impl Into<String>) -> Result<Self, RpcError> {
        Self::with_timeout(rpc_url, DEFAULT_RPC_TIMEOUT)
    }

    /// Create a client with custom timeout
    pub fn with_timeout(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RpcError::RequestFailed)?;

        Ok(Self {
            client,
            rpc_url: rpc_url.into(),
        })
    }

    /// Translate an infolog on the remote service
    ///
    /// # Errors
    /// * `RpcError::Fatal` - the service rejected the log (reason included)
    /// * `RpcError::RequestFailed` / `RpcError::InvalidResponse` - transport problems
    pub fn translate_stacktrace(&self, infolog: &str) -> Result<TranslationResult, RpcError> {
        info!("Sending {} bytes of infolog to {}", infolog.len(), self.rpc_url);

        let request = JsonRpcRequest::translate_stacktrace(infolog, 1);
        debug!("RPC request: method={} id={}", request.method, request.id);

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .map_err(RpcError::RequestFailed)?;

        if !response.status().is_success() {
            return Err(RpcError::InvalidResponse(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().unwrap_or_default()
            )));
        }

        let rpc_response: JsonRpcResponse<TranslationResult> =
            response.json().map_err(RpcError::RequestFailed)?;

        if let Some(error) = rpc_response.error {
            return Err(map_rpc_error(error));
        }

        let mut result = rpc_response
            .result
            .ok_or_else(|| RpcError::InvalidResponse("Missing result field".to_string()))?;
        // frame indices are not part of the wire format
        result.reindex();
        Ok(result)
    }
}

/// Map JSON-RPC error to our error type
fn map_rpc_error(error: JsonRpcError) -> RpcError {
    match error.code {
        FATAL_ERROR_CODE => RpcError::Fatal(error.message),
        METHOD_NOT_FOUND_CODE => RpcError::MethodNotSupported,
        _ => RpcError::InvalidResponse(format!("{}: {}", error.code, error.message)),
    }
}
