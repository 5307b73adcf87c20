//! Ledger bus client.
//!
//! Submits signed transactions to a remote ledger and queries its state,
//! using a publish/subscribe transport as the only channel.
//!
//! ```no_run
//! # async fn demo() -> lbus_client::ClientResult<()> {
//! use std::sync::Arc;
//! use lbus_client::{ClientConfig, LedgerClient};
//! use lbus_crypto::Identity;
//! use lbus_transport::InMemoryBroker;
//! use lbus_types::Payload;
//!
//! let client = LedgerClient::new(Arc::new(InMemoryBroker::start()), ClientConfig::default())?;
//! let identity = Identity::generate();
//! let contract = "ab".repeat(32);
//! client
//!     .sign_and_send_transaction(&identity, &contract, "ADD_X", Payload::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod nonce;

pub use client::{LedgerClient, Session};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use nonce::{NonceLease, NoncePolicy, NonceSequencer};

pub use lbus_protocol::{BlockSummary, ContractOutput, ListFilter, LogEntry};
pub use lbus_tx::{SignedTransaction, TransactionSigner};
pub use lbus_types::{Address, Payload};
