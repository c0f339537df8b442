//! Assembles and signs transactions for accounts held by the node

use super::gas::DEFAULT_GAS_LIMIT;
use super::request::{NormalizedRequest, TransactionRequest};
use super::transaction::{Transaction, UnsignedTransaction};
use crate::error::{NodeError, NodeResult};
use crate::wallet::{Account, AccountResolver};

use ethers::types::U256;
use tracing::debug;

/// A parsed request paired with the account that will sign it
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub account: Account,
    pub request: NormalizedRequest,
}

/// Builds signed transactions from call arguments
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    chain_id: u64,
    default_gas_limit: u64,
}

impl TransactionBuilder {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            default_gas_limit: DEFAULT_GAS_LIMIT,
        }
    }

    /// Parse the request and resolve its signing account
    ///
    /// The nonce is deliberately left unresolved; it must be read inside the
    /// pool admission window.
    pub fn prepare(
        &self,
        resolver: &dyn AccountResolver,
        request: &TransactionRequest,
    ) -> NodeResult<PreparedRequest> {
        let request = request.normalize(self.default_gas_limit)?;
        let account = resolver
            .account(&request.from)
            .ok_or(NodeError::UnknownAccount {
                address: request.from,
            })?;

        Ok(PreparedRequest { account, request })
    }

    /// Assemble the transaction with the given nonce and sign it
    pub fn finalize(&self, prepared: &PreparedRequest, nonce: U256) -> NodeResult<Transaction> {
        let request = &prepared.request;
        let unsigned = UnsignedTransaction {
            nonce,
            gas_price: Some(request.gas_price),
            gas_limit: Some(request.gas_limit),
            to: request.to,
            value: Some(request.value),
            data: request.data.clone(),
        };

        let tx = unsigned
            .sign(&prepared.account, Some(self.chain_id))?
            .into_checked()
            .map_err(|e| NodeError::SigningFailed(e.to_string()))?;

        if tx.from() != prepared.account.address() {
            return Err(NodeError::SigningFailed(format!(
                "signature recovers to {:?}, expected {:?}",
                tx.from(),
                prepared.account.address()
            )));
        }

        debug!("Built transaction {} with nonce {}", tx.hash_string(), nonce);
        Ok(tx)
    }
}
