use lbus_protocol::ProtocolError;
use lbus_transport::TransportError;
use lbus_tx::TxError;

/// Errors produced by the development ledger.
///
/// The `Display` text is what callers see in the `message` of an error
/// envelope.
#[derive(Debug, thiserror::Error)]
pub enum DevnetError {
    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("invalid nonce: expected {expected}, got {actual}")]
    NonceMismatch { expected: u64, actual: u64 },

    #[error("transaction rejected: {0}")]
    Rejected(#[from] TxError),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

pub type DevnetResult<T> = Result<T, DevnetError>;
