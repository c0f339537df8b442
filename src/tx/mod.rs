//! Transaction construction: call arguments, wire format, signing and gas rules

pub mod builder;
pub mod gas;
pub mod request;
pub mod transaction;

pub use builder::{PreparedRequest, TransactionBuilder};
pub use request::{NormalizedRequest, TransactionRequest};
pub use transaction::{Transaction, UncheckedTransaction, UnsignedTransaction};
