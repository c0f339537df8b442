//! Inbound call arguments and the parsing helpers shared by both submission paths

use crate::error::{NodeError, NodeResult};

use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller-supplied fields of `eth_sendTransaction`
///
/// Every field arrives as the raw JSON-RPC string so that defaults and
/// prefix handling are applied in one place by [`TransactionRequest::normalize`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// A request with defaults applied and every field parsed
///
/// The nonce stays optional: it is resolved from the pool inside the
/// admission window, never here.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRequest {
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub nonce: Option<U256>,
    pub data: Bytes,
}

impl TransactionRequest {
    /// Parse all fields, applying defaults for the ones that are absent
    pub fn normalize(&self, default_gas_limit: u64) -> NodeResult<NormalizedRequest> {
        Ok(NormalizedRequest {
            from: parse_address(&self.from)?,
            to: self.to.as_deref().map(parse_address).transpose()?,
            value: parse_optional_quantity(self.value.as_deref())?.unwrap_or_default(),
            gas_price: parse_optional_quantity(self.gas_price.as_deref())?.unwrap_or_default(),
            gas_limit: parse_optional_quantity(self.gas.as_deref())?
                .unwrap_or_else(|| U256::from(default_gas_limit)),
            nonce: parse_optional_quantity(self.nonce.as_deref())?,
            data: self
                .data
                .as_deref()
                .map(parse_hex_bytes)
                .transpose()?
                .unwrap_or_default(),
        })
    }
}

impl fmt::Display for TransactionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{from={}, to={}, value={}, gasPrice={}, gas={}, nonce={}, data={}}}",
            self.from,
            self.to.as_deref().unwrap_or("null"),
            self.value.as_deref().unwrap_or("null"),
            self.gas_price.as_deref().unwrap_or("null"),
            self.gas.as_deref().unwrap_or("null"),
            self.nonce.as_deref().unwrap_or("null"),
            self.data.as_deref().unwrap_or("null"),
        )
    }
}

/// Strip a leading `0x` or `0X` marker
pub fn strip_hex_prefix(input: &str) -> &str {
    input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input)
}

/// Decode a hex string with optional prefix; odd lengths are left-padded
pub fn parse_hex_bytes(input: &str) -> NodeResult<Bytes> {
    let digits = strip_hex_prefix(input);
    let decoded = if digits.len() % 2 == 1 {
        hex::decode(format!("0{}", digits))
    } else {
        hex::decode(digits)
    };

    decoded
        .map(Bytes::from)
        .map_err(|e| NodeError::InvalidParams(format!("invalid hex '{}': {}", input, e)))
}

/// Parse a 20-byte address with optional prefix
pub fn parse_address(input: &str) -> NodeResult<Address> {
    let bytes = parse_hex_bytes(input)?;
    if bytes.len() != 20 {
        return Err(NodeError::InvalidParams(format!(
            "invalid address '{}': expected 20 bytes, got {}",
            input,
            bytes.len()
        )));
    }
    Ok(Address::from_slice(&bytes))
}

/// Parse a quantity given either as `0x`-prefixed hex or as a decimal string
pub fn parse_quantity(input: &str) -> NodeResult<U256> {
    let trimmed = input.trim();
    let parsed = if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        let digits = strip_hex_prefix(trimmed);
        if digits.is_empty() {
            Ok(U256::zero())
        } else {
            U256::from_str_radix(digits, 16).map_err(|e| e.to_string())
        }
    } else {
        U256::from_dec_str(trimmed).map_err(|e| e.to_string())
    };

    parsed.map_err(|e| NodeError::InvalidParams(format!("invalid quantity '{}': {}", input, e)))
}

fn parse_optional_quantity(input: Option<&str>) -> NodeResult<Option<U256>> {
    input.map(parse_quantity).transpose()
}
