//! Key custody for accounts the node signs on behalf of

use crate::error::{NodeError, NodeResult};

use dashmap::DashMap;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Signature, H256};
use tracing::info;

/// A key-holding account capable of producing signatures
#[derive(Clone, Debug)]
pub struct Account {
    wallet: LocalWallet,
}

impl Account {
    pub fn new(wallet: LocalWallet) -> Self {
        Self { wallet }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Sign a prehashed message, returning a signature with `v` of 27 or 28
    pub fn sign_hash(&self, hash: H256) -> NodeResult<Signature> {
        self.wallet
            .sign_hash(hash)
            .map_err(|e| NodeError::SigningFailed(e.to_string()))
    }
}

/// Maps a sender address to the account holding its key
pub trait AccountResolver: Send + Sync {
    fn account(&self, address: &Address) -> Option<Account>;

    /// Addresses of every held account
    fn addresses(&self) -> Vec<Address>;
}

/// In-memory wallet of local private keys
#[derive(Default)]
pub struct Wallet {
    accounts: DashMap<Address, Account>,
}

impl Wallet {
    pub fn new(wallets: impl IntoIterator<Item = LocalWallet>) -> Self {
        let wallet = Self::default();
        for local in wallets {
            wallet.insert(local);
        }
        wallet
    }

    /// Add a key, returning its address
    pub fn insert(&self, local: LocalWallet) -> Address {
        let account = Account::new(local);
        let address = account.address();
        self.accounts.insert(address, account);
        info!("Wallet holds account {:?}", address);
        address
    }
}

impl AccountResolver for Wallet {
    fn account(&self, address: &Address) -> Option<Account> {
        self.accounts.get(address).map(|a| a.value().clone())
    }

    fn addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.accounts.iter().map(|e| *e.key()).collect();
        addresses.sort();
        addresses
    }
}
