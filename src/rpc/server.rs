//! JSON-RPC server exposing `translate_stacktrace` over HTTP.
//!
//! Translations run on the blocking pool; a semaphore caps how many run at
//! once since each one spawns 7-Zip and addr2line.

use super::types::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, FATAL_ERROR_CODE, INVALID_PARAMS_CODE,
    INVALID_REQUEST_CODE, METHOD_NOT_FOUND_CODE, PARSE_ERROR_CODE, TRANSLATE_METHOD,
};
use crate::parser::TranslationResult;
use crate::translator::StacktraceTranslator;
use crate::utils::config::ServerConfig;
use crate::utils::error::GENERIC_FATAL_REASON;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{error, info, warn};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;

type RpcResponse = JsonRpcResponse<TranslationResult>;

#[derive(Clone)]
pub struct AppState {
    translator: Arc<StacktraceTranslator>,
    permits: Arc<Semaphore>,
}

impl AppState {
    pub fn new(translator: Arc<StacktraceTranslator>, max_concurrent: usize) -> Self {
        Self {
            translator,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }
}

/// Routes: JSON-RPC on `/` and `/rpc`, liveness on `/health`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(handle_rpc))
        .route("/rpc", post(handle_rpc))
        .route("/health", get(health))
        .with_state(state)
}

/// Serve until ctrl-c
///
/// # Errors
/// Binding the listen address or accepting connections failed
pub async fn serve(translator: Arc<StacktraceTranslator>, config: &ServerConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    info!("Listening on {}", listener.local_addr()?);

    let app = router(AppState::new(translator, config.max_concurrent));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Body is taken raw so malformed JSON still gets a JSON-RPC reply
pub async fn handle_rpc(State(state): State<AppState>, body: String) -> Json<RpcResponse> {
    let value: Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => {
            warn!("Unparsable RPC request: {}", e);
            return reject(Value::Null, PARSE_ERROR_CODE, "Parse error");
        }
    };

    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            warn!("Invalid RPC request: {}", e);
            return reject(id, INVALID_REQUEST_CODE, "Invalid Request");
        }
    };

    if request.method != TRANSLATE_METHOD {
        warn!("Unknown RPC method {}", request.method);
        return reject(request.id, METHOD_NOT_FOUND_CODE, "Method not found");
    }

    let Some(infolog) = request.infolog().map(str::to_string) else {
        return reject(request.id, INVALID_PARAMS_CODE, "Invalid params: expected [infolog]");
    };

    let outcome = translate(&state, infolog).await;
    Json(match outcome {
        Ok(result) => JsonRpcResponse::success(request.id, result),
        Err(reason) => JsonRpcResponse::failure(request.id, JsonRpcError::new(FATAL_ERROR_CODE, reason)),
    })
}

/// Run one translation once a permit is free
async fn translate(state: &AppState, infolog: String) -> Result<TranslationResult, String> {
    let Ok(_permit) = state.permits.clone().acquire_owned().await else {
        error!("Translation semaphore closed");
        return Err(GENERIC_FATAL_REASON.to_string());
    };

    let translator = Arc::clone(&state.translator);
    match tokio::task::spawn_blocking(move || translator.translate_stacktrace(&infolog)).await {
        Ok(result) => result.map_err(|fatal| fatal.reason),
        Err(e) => {
            error!("Translation task failed: {}", e);
            Err(GENERIC_FATAL_REASON.to_string())
        }
    }
}

fn reject(id: Value, code: i64, message: &str) -> Json<RpcResponse> {
    Json(JsonRpcResponse::failure(id, JsonRpcError::new(code, message)))
}
