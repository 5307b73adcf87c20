//! Foundation types for the ledger bus client (LBUS).
//!
//! Every other LBUS crate depends on `lbus-types`.
//!
//! # Key Types
//!
//! - [`Address`]: Validated hex-encoded Ed25519 public key
//! - [`TxHash`]: BLAKE3 content hash of a canonical transaction
//! - [`CorrelationId`]: Per-call id tying a reply to its request
//! - [`Payload`]: Opaque ordered key/value transaction data

pub mod address;
pub mod correlation;
pub mod error;
pub mod hash;
pub mod payload;

pub use address::{Address, ADDRESS_BYTES, ADDRESS_HEX_LEN};
pub use correlation::CorrelationId;
pub use error::TypeError;
pub use hash::TxHash;
pub use payload::{canonicalize, canonicalize_payload, Payload};
