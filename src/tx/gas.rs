//! Protocol gas constants and intrinsic gas accounting

/// Gas limit applied when a request does not carry one
pub const DEFAULT_GAS_LIMIT: u64 = 90_000;

/// Base cost of every transaction
pub const TX_BASE_GAS: u64 = 21_000;

/// Extra base cost for contract creation
pub const TX_CREATE_GAS: u64 = 32_000;

/// Cost per zero byte of payload
pub const TX_ZERO_DATA_GAS: u64 = 4;

/// Cost per non-zero byte of payload
pub const TX_NON_ZERO_DATA_GAS: u64 = 68;

/// Minimum gas a transaction must provide before any execution happens
pub fn intrinsic_gas(data: &[u8], is_create: bool) -> u64 {
    let zeros = data.iter().filter(|b| **b == 0).count() as u64;
    let non_zeros = data.len() as u64 - zeros;

    let mut gas = TX_BASE_GAS + zeros * TX_ZERO_DATA_GAS + non_zeros * TX_NON_ZERO_DATA_GAS;
    if is_create {
        gas += TX_CREATE_GAS;
    }
    gas
}
