//! JSON-RPC endpoint exposing the submission operations and node status

use crate::chain::Blockchain;
use crate::config::ApiConfig;
use crate::error::{NodeError, NodeResult};
use crate::gateway::SubmissionGateway;
use crate::pool::PoolHandle;
use crate::tx::request::parse_address;
use crate::tx::TransactionRequest;
use crate::wallet::AccountResolver;

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use ethers::types::Address;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<SubmissionGateway>,
    pub pool: Arc<PoolHandle>,
    pub chain: Arc<dyn Blockchain>,
    pub accounts: Arc<dyn AccountResolver>,
    pub coinbase: Address,
    pub chain_id: u64,
}

/// Routes served by the node
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(handle_rpc))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the JSON-RPC server
pub async fn run_server(config: ApiConfig, state: AppState) -> NodeResult<()> {
    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting JSON-RPC server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| NodeError::Internal(format!("api bind {}: {}", addr, e)))?;
    axum::serve(listener, router(state))
        .await
        .map_err(|e| NodeError::Internal(format!("api server: {}", e)))?;

    Ok(())
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_rpc(
    State(state): State<AppState>,
    Json(request): Json<RpcRequest>,
) -> Json<RpcResponse> {
    debug!("JSON-RPC call {}", request.method);
    let id = request.id.clone();

    let response = match dispatch(&state, &request).await {
        Ok(result) => RpcResponse::result(id, result),
        Err(error) => RpcResponse::error(id, error),
    };
    Json(response)
}

async fn dispatch(state: &AppState, request: &RpcRequest) -> Result<Value, RpcError> {
    let params = &request.params;

    match request.method.as_str() {
        "eth_sendTransaction" => {
            let tx: TransactionRequest = param(params, 0)?;
            Ok(Value::String(state.gateway.send_transaction(&tx).await?))
        }
        "eth_sendRawTransaction" => {
            let raw: String = param(params, 0)?;
            Ok(Value::String(state.gateway.send_raw_transaction(&raw).await?))
        }
        "eth_getTransactionCount" => {
            let address: String = param(params, 0)?;
            let address = parse_address(&address)?;
            let nonce = state.pool.admission().await.pending_nonce(&address).await;
            Ok(Value::String(format!("{:#x}", nonce)))
        }
        "eth_blockNumber" => {
            let number = state.chain.best_block().await.number;
            Ok(Value::String(format!("{:#x}", number)))
        }
        "eth_coinbase" => Ok(Value::String(format!("{:#x}", state.coinbase))),
        "eth_accounts" => Ok(Value::Array(
            state
                .accounts
                .addresses()
                .into_iter()
                .map(|a| Value::String(format!("{:#x}", a)))
                .collect(),
        )),
        "eth_chainId" => Ok(Value::String(format!("{:#x}", state.chain_id))),
        other => Err(RpcError {
            code: METHOD_NOT_FOUND,
            message: format!("Method not found: {}", other),
        }),
    }
}

/// Positional parameter `index`, deserialized
fn param<T: DeserializeOwned>(params: &Value, index: usize) -> Result<T, RpcError> {
    let value = params.get(index).cloned().ok_or_else(|| RpcError {
        code: INVALID_PARAMS,
        message: format!("missing parameter {}", index),
    })?;

    serde_json::from_value(value).map_err(|e| RpcError {
        code: INVALID_PARAMS,
        message: format!("invalid parameter {}: {}", index, e),
    })
}

// Wire types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl From<NodeError> for RpcError {
    fn from(e: NodeError) -> Self {
        Self {
            code: e.rpc_code(),
            message: e.to_string(),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}
