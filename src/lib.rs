//! Instant-mine node - transaction submission with on-demand block production
//!
//! Transactions enter through `eth_sendTransaction` (built and signed with a
//! held key) or `eth_sendRawTransaction` (already signed). Once admitted to the
//! pool, a transaction that would succeed on the current best block gets a
//! block of its own right away.

pub mod api;
pub mod chain;
pub mod config;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod metrics;
pub mod miner;
pub mod pool;
pub mod tx;
pub mod wallet;

#[cfg(test)]
pub(crate) mod test_utils;
