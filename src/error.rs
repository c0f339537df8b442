//! Error types for the instant-mine node

use ethers::types::Address;
use thiserror::Error;

/// Main error type for the node
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Could not find account for address: {address:#x}")]
    UnknownAccount { address: Address },

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Missing parameter, gasPrice, gas or value: {0}")]
    MalformedRawTransaction(String),

    #[error("Transaction rejected by pool: {0}")]
    PoolRejected(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Mining error: {0}")]
    Mining(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NodeError {
    /// Check if error is a caller-side parameter problem
    pub fn is_invalid_params(&self) -> bool {
        matches!(
            self,
            NodeError::MalformedRawTransaction(_) | NodeError::InvalidParams(_)
        )
    }

    /// JSON-RPC error code for this error
    pub fn rpc_code(&self) -> i64 {
        match self {
            NodeError::MalformedRawTransaction(_) | NodeError::InvalidParams(_) => -32602,
            NodeError::PoolRejected(_) => -32010,
            NodeError::UnknownAccount { .. } | NodeError::SigningFailed(_) => -32000,
            _ => -32603,
        }
    }

    /// Short label used for metrics
    pub fn label(&self) -> &'static str {
        match self {
            NodeError::UnknownAccount { .. } => "unknown_account",
            NodeError::SigningFailed(_) => "signing_failed",
            NodeError::MalformedRawTransaction(_) => "malformed_raw",
            NodeError::PoolRejected(_) => "pool_rejected",
            NodeError::InvalidParams(_) => "invalid_params",
            NodeError::Execution(_) => "execution",
            NodeError::Mining(_) => "mining",
            NodeError::Config(_) => "config",
            NodeError::Internal(_) => "internal",
        }
    }
}

/// Result type for node operations
pub type NodeResult<T> = Result<T, NodeError>;
