//! Cryptographic primitives for the ledger bus client.
//!
//! Provides Ed25519 key handling, signing and verification, and the
//! [`Identity`] keypair that signs transactions.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod identity;
pub mod signer;

pub use identity::Identity;
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
