//! Development ledger for the ledger bus.
//!
//! [`DevLedger`] keeps accounts, transactions, logs, and blocks in memory and
//! answers the ledger methods over any [`lbus_transport::PubSubTransport`].
//! It verifies signatures and enforces strictly sequential nonces, which is
//! enough to exercise a client end to end without a real network.

pub mod error;
pub mod ledger;
pub mod server;

pub use error::{DevnetError, DevnetResult};
pub use ledger::DevLedger;
pub use server::{DevLedgerHandle, ServeMode};
