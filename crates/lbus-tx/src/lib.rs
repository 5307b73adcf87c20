//! Transaction construction for the ledger bus client.
//!
//! Builds [`Transaction`]s with a timestamp fixed at build time, encodes them
//! canonically, and signs them into [`SignedTransaction`]s. The canonical
//! encoding is the only signing input, so any party that rebuilds it from the
//! wire fields can verify the signature.

pub mod error;
pub mod signed;
pub mod signer;
pub mod transaction;

pub use error::{TxError, TxResult};
pub use signed::{sign, sign_with_private_key, SignedTransaction};
pub use signer::TransactionSigner;
pub use transaction::{Transaction, TransactionBuilder, DEFAULT_TX_VERSION};
