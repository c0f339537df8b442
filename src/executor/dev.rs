//! Gas-only projection used by the development node

use super::{ExecutionOutcome, SpeculativeCall, SpeculativeExecutor};
use crate::error::NodeResult;
use crate::tx::gas::intrinsic_gas;

use async_trait::async_trait;
use ethers::types::U256;
use tracing::debug;

/// Predicts success when the transaction pays its intrinsic gas and fits the
/// context block; no contract code is run.
#[derive(Debug, Default, Clone)]
pub struct DevExecutor;

#[async_trait]
impl SpeculativeExecutor for DevExecutor {
    async fn execute(&self, call: &SpeculativeCall) -> NodeResult<ExecutionOutcome> {
        let intrinsic = intrinsic_gas(&call.data, call.to.is_none());

        let outcome = if call.gas_limit < U256::from(intrinsic) {
            ExecutionOutcome::failure(
                call.gas_limit.low_u64(),
                format!("intrinsic gas too low: have {}, want {}", call.gas_limit, intrinsic),
            )
        } else if call.gas_limit > U256::from(call.block.gas_limit) {
            ExecutionOutcome::failure(0, "gas limit exceeds block gas limit")
        } else {
            ExecutionOutcome::success(intrinsic)
        };

        debug!(
            "Dry run of call from {:?} on block {}: {:?}",
            call.from, call.block.number, outcome
        );
        Ok(outcome)
    }
}
