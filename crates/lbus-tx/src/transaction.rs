use lbus_types::{canonicalize_payload, Address, Payload, TxHash};
use serde::{Deserialize, Serialize};

use crate::error::{TxError, TxResult};

/// Transaction format version stamped by default.
pub const DEFAULT_TX_VERSION: u32 = 1;

/// An unsigned ledger operation.
///
/// Immutable once built. The timestamp is captured by the builder and never
/// recomputed, so the bytes signed here are the bytes the ledger rebuilds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    from: Address,
    to: Address,
    method: String,
    data: Payload,
    nonce: u64,
    timestamp: i64,
    version: u32,
}

/// Field-order-stable view used for the signing input.
#[derive(Serialize)]
struct CanonicalTransaction<'a> {
    from: &'a Address,
    to: &'a Address,
    method: &'a str,
    data: Payload,
    nonce: u64,
    timestamp: i64,
    version: u32,
}

impl Transaction {
    /// Build with the current wall-clock time and the default version.
    pub fn build(
        from: Address,
        to: Address,
        method: impl Into<String>,
        data: Payload,
        nonce: u64,
    ) -> TxResult<Self> {
        TransactionBuilder::new(from, to, method)
            .data(data)
            .nonce(nonce)
            .build()
    }

    pub fn from(&self) -> &Address {
        &self.from
    }

    pub fn to(&self) -> &Address {
        &self.to
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn data(&self) -> &Payload {
        &self.data
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Unix seconds, fixed at build time.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// The signing input: compact JSON with keys in the fixed order
    /// `from, to, method, data, nonce, timestamp, version` and every nested
    /// object key-sorted.
    pub fn canonical_bytes(&self) -> TxResult<Vec<u8>> {
        let canonical = CanonicalTransaction {
            from: &self.from,
            to: &self.to,
            method: &self.method,
            data: canonicalize_payload(&self.data),
            nonce: self.nonce,
            timestamp: self.timestamp,
            version: self.version,
        };
        serde_json::to_vec(&canonical).map_err(|e| TxError::Serialization(e.to_string()))
    }

    /// Content hash of the canonical encoding.
    pub fn hash(&self) -> TxResult<TxHash> {
        Ok(TxHash::of_canonical(&self.canonical_bytes()?))
    }
}

/// Step-by-step construction of a [`Transaction`].
#[derive(Clone, Debug)]
pub struct TransactionBuilder {
    from: Address,
    to: Address,
    method: String,
    data: Payload,
    nonce: u64,
    timestamp: Option<i64>,
    version: u32,
}

impl TransactionBuilder {
    pub fn new(from: Address, to: Address, method: impl Into<String>) -> Self {
        Self {
            from,
            to,
            method: method.into(),
            data: Payload::new(),
            nonce: 0,
            timestamp: None,
            version: DEFAULT_TX_VERSION,
        }
    }

    pub fn data(mut self, data: Payload) -> Self {
        self.data = data;
        self
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Pin the timestamp instead of reading the clock at `build()`.
    pub fn timestamp(mut self, unix_seconds: i64) -> Self {
        self.timestamp = Some(unix_seconds);
        self
    }

    pub fn build(self) -> TxResult<Transaction> {
        if self.method.trim().is_empty() {
            return Err(TxError::Invalid("method must not be empty".into()));
        }
        Ok(Transaction {
            from: self.from,
            to: self.to,
            method: self.method,
            data: self.data,
            nonce: self.nonce,
            timestamp: self.timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp()),
            version: self.version,
        })
    }
}
