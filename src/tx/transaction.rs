//! Canonical transaction record and its RLP wire format
//!
//! Signed legacy transactions are encoded as
//! `[nonce, gasPrice, gasLimit, to, value, data, v, r, s]`. A scalar slot that
//! holds the empty list (`0xc0`) is read back as an absent field, which is how
//! the raw submission path can tell a missing gas price apart from a zero one.

use crate::error::{NodeError, NodeResult};
use crate::wallet::Account;

use ethers::types::{Address, Bytes, Signature, H256, U256};
use ethers::utils::rlp::{DecoderError, Rlp, RlpStream};
use sha3::{Digest, Keccak256};
use std::fmt;

/// RLP of the empty list, used as the absent marker for scalar fields
const ABSENT: [u8; 1] = [0xc0];

/// Number of items in a signed legacy transaction
const SIGNED_ITEMS: usize = 9;

/// Transaction fields before a signature is attached
///
/// Gas price, gas limit and value are optional here because a decoded wire
/// payload may omit them; [`UncheckedTransaction::into_checked`] enforces presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub nonce: U256,
    pub gas_price: Option<U256>,
    pub gas_limit: Option<U256>,
    pub to: Option<Address>,
    pub value: Option<U256>,
    pub data: Bytes,
}

/// A signed transaction whose fields have not been validated yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UncheckedTransaction {
    unsigned: UnsignedTransaction,
    chain_id: Option<u64>,
    v: u64,
    r: U256,
    s: U256,
    hash: H256,
}

/// A finalized, signed transaction
///
/// Fields are private: once built the record cannot be changed, only read.
#[derive(Clone, PartialEq, Eq)]
pub struct Transaction {
    from: Address,
    to: Option<Address>,
    value: U256,
    gas_price: U256,
    gas_limit: U256,
    nonce: U256,
    data: Bytes,
    chain_id: Option<u64>,
    v: u64,
    r: U256,
    s: U256,
    hash: H256,
}

fn keccak(bytes: &[u8]) -> H256 {
    H256::from_slice(&Keccak256::digest(bytes))
}

fn append_optional(stream: &mut RlpStream, value: &Option<U256>) {
    match value {
        Some(value) => {
            stream.append(value);
        }
        None => {
            stream.append_raw(&ABSENT, 1);
        }
    }
}

fn append_recipient(stream: &mut RlpStream, to: &Option<Address>) {
    match to {
        Some(to) => {
            stream.append(to);
        }
        None => {
            stream.append_empty_data();
        }
    }
}

fn decode_optional(rlp: &Rlp<'_>, index: usize) -> Result<Option<U256>, DecoderError> {
    let item = rlp.at(index)?;
    if item.is_list() {
        if item.item_count()? == 0 {
            return Ok(None);
        }
        return Err(DecoderError::RlpExpectedToBeData);
    }
    Ok(Some(item.as_val()?))
}

fn decode_recipient(rlp: &Rlp<'_>, index: usize) -> Result<Option<Address>, DecoderError> {
    let item = rlp.at(index)?;
    if item.is_empty() {
        return Ok(None);
    }
    Ok(Some(item.as_val()?))
}

/// Recovery id folded with the chain id: `parity + 35 + 2 * chain_id`
fn eip155_v(parity: u64, chain_id: u64) -> NodeResult<u64> {
    chain_id
        .checked_mul(2)
        .and_then(|v| v.checked_add(35 + parity))
        .ok_or_else(|| NodeError::SigningFailed(format!("chain id {} out of range", chain_id)))
}

impl UnsignedTransaction {
    fn append_fields(&self, stream: &mut RlpStream) {
        stream.append(&self.nonce);
        append_optional(stream, &self.gas_price);
        append_optional(stream, &self.gas_limit);
        append_recipient(stream, &self.to);
        append_optional(stream, &self.value);
        stream.append(&self.data.to_vec());
    }

    /// Hash covered by the signature, EIP-155 when a chain id is given
    pub fn sighash(&self, chain_id: Option<u64>) -> H256 {
        let mut stream = match chain_id {
            Some(_) => RlpStream::new_list(9),
            None => RlpStream::new_list(6),
        };
        self.append_fields(&mut stream);
        if let Some(chain_id) = chain_id {
            stream.append(&chain_id);
            stream.append(&0u8);
            stream.append(&0u8);
        }
        keccak(&stream.out())
    }

    /// Sign with the account's key
    pub fn sign(self, account: &Account, chain_id: Option<u64>) -> NodeResult<UncheckedTransaction> {
        let signature = account.sign_hash(self.sighash(chain_id))?;
        let parity = signature
            .v
            .checked_sub(27)
            .filter(|p| *p <= 1)
            .ok_or_else(|| {
                NodeError::SigningFailed(format!("unexpected recovery byte {}", signature.v))
            })?;
        let v = match chain_id {
            Some(chain_id) => eip155_v(parity, chain_id)?,
            None => parity + 27,
        };

        let mut unchecked = UncheckedTransaction {
            unsigned: self,
            chain_id,
            v,
            r: signature.r,
            s: signature.s,
            hash: H256::zero(),
        };
        unchecked.hash = keccak(&unchecked.encode());
        Ok(unchecked)
    }
}

impl UncheckedTransaction {
    /// Decode a signed transaction from its wire bytes
    pub fn decode(raw: &[u8]) -> NodeResult<Self> {
        Self::decode_rlp(raw)
            .map_err(|e| NodeError::InvalidParams(format!("invalid raw transaction: {}", e)))
    }

    fn decode_rlp(raw: &[u8]) -> Result<Self, DecoderError> {
        let rlp = Rlp::new(raw);
        if !rlp.is_list() {
            return Err(DecoderError::RlpExpectedToBeList);
        }
        match rlp.item_count()? {
            SIGNED_ITEMS => {}
            n if n < SIGNED_ITEMS => return Err(DecoderError::RlpIsTooShort),
            _ => return Err(DecoderError::RlpIncorrectListLen),
        }
        if rlp.payload_info()?.total() != raw.len() {
            return Err(DecoderError::RlpIsTooBig);
        }

        let unsigned = UnsignedTransaction {
            nonce: rlp.val_at(0)?,
            gas_price: decode_optional(&rlp, 1)?,
            gas_limit: decode_optional(&rlp, 2)?,
            to: decode_recipient(&rlp, 3)?,
            value: decode_optional(&rlp, 4)?,
            data: Bytes::from(rlp.val_at::<Vec<u8>>(5)?),
        };
        let v: u64 = rlp.val_at(6)?;
        let chain_id = match v {
            27 | 28 => None,
            v if v >= 35 => Some((v - 35) / 2),
            _ => return Err(DecoderError::Custom("invalid signature v")),
        };

        Ok(Self {
            unsigned,
            chain_id,
            v,
            r: rlp.val_at(7)?,
            s: rlp.val_at(8)?,
            hash: keccak(raw),
        })
    }

    /// Signed wire encoding
    pub fn encode(&self) -> Bytes {
        let mut stream = RlpStream::new_list(SIGNED_ITEMS);
        self.unsigned.append_fields(&mut stream);
        stream.append(&self.v);
        stream.append(&self.r);
        stream.append(&self.s);
        Bytes::from(stream.out().to_vec())
    }

    pub fn hash(&self) -> H256 {
        self.hash
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    /// Names of the mandatory numeric fields that are absent
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.unsigned.gas_limit.is_none() {
            missing.push("gas");
        }
        if self.unsigned.gas_price.is_none() {
            missing.push("gasPrice");
        }
        if self.unsigned.value.is_none() {
            missing.push("value");
        }
        missing
    }

    /// Recover the sender from the signature
    pub fn recover_sender(&self) -> NodeResult<Address> {
        let parity = match self.chain_id {
            Some(chain_id) => self.v - 35 - chain_id * 2,
            None => self.v - 27,
        };
        let signature = Signature {
            r: self.r,
            s: self.s,
            v: parity + 27,
        };
        signature
            .recover(self.unsigned.sighash(self.chain_id))
            .map_err(|e| NodeError::InvalidParams(format!("invalid signature: {}", e)))
    }

    /// Enforce field presence and recover the sender
    ///
    /// Absent gas limit, gas price or value is reported as
    /// [`NodeError::MalformedRawTransaction`] before the signature is touched.
    pub fn into_checked(self) -> NodeResult<Transaction> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(NodeError::MalformedRawTransaction(missing.join(", ")));
        }

        let from = self.recover_sender()?;
        let UnsignedTransaction {
            nonce,
            gas_price,
            gas_limit,
            to,
            value,
            data,
        } = self.unsigned;

        Ok(Transaction {
            from,
            to,
            value: value.unwrap_or_default(),
            gas_price: gas_price.unwrap_or_default(),
            gas_limit: gas_limit.unwrap_or_default(),
            nonce,
            data,
            chain_id: self.chain_id,
            v: self.v,
            r: self.r,
            s: self.s,
            hash: self.hash,
        })
    }
}

impl Transaction {
    pub fn from(&self) -> Address {
        self.from
    }

    /// Recipient, `None` for contract creation
    pub fn to(&self) -> Option<Address> {
        self.to
    }

    pub fn value(&self) -> U256 {
        self.value
    }

    pub fn gas_price(&self) -> U256 {
        self.gas_price
    }

    pub fn gas_limit(&self) -> U256 {
        self.gas_limit
    }

    pub fn nonce(&self) -> U256 {
        self.nonce
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn hash(&self) -> H256 {
        self.hash
    }

    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }

    /// Hash in its JSON-RPC display form
    pub fn hash_string(&self) -> String {
        format!("{:#x}", self.hash)
    }

    /// Signed wire encoding
    pub fn encode(&self) -> Bytes {
        UncheckedTransaction {
            unsigned: UnsignedTransaction {
                nonce: self.nonce,
                gas_price: Some(self.gas_price),
                gas_limit: Some(self.gas_limit),
                to: self.to,
                value: Some(self.value),
                data: self.data.clone(),
            },
            chain_id: self.chain_id,
            v: self.v,
            r: self.r,
            s: self.s,
            hash: self.hash,
        }
        .encode()
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("hash", &self.hash)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("nonce", &self.nonce)
            .field("value", &self.value)
            .field("gas_price", &self.gas_price)
            .field("gas_limit", &self.gas_limit)
            .field("data", &self.data)
            .finish()
    }
}
