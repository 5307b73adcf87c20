use std::time::Duration;

use lbus_protocol::ProtocolError;
use lbus_rpc::RpcError;
use lbus_transport::TransportError;
use lbus_tx::TxError;
use lbus_types::TypeError;
use thiserror::Error;

/// Every failure a client call can surface.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected locally before any transport I/O.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("{method} timed out after {after:?}")]
    Timeout { method: String, after: Duration },

    /// The ledger answered with `status = error`; `message` is verbatim.
    #[error("ledger error: {message}")]
    Remote { message: String },

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("invalid key material")]
    InvalidKey,

    #[error("signing failed: {0}")]
    SigningFailure(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Whether the ledger might have seen the request. Timeouts and remote
    /// errors leave the outcome to the ledger; local validation never does.
    pub fn reached_ledger(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Remote { .. })
    }
}

impl From<RpcError> for ClientError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Timeout { method, after } => Self::Timeout { method, after },
            RpcError::Transport(e) => Self::Transport(e),
            RpcError::Remote { message } => Self::Remote { message },
            RpcError::Protocol(e) => Self::from(e),
        }
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Remote { message } => Self::Remote { message },
            other => Self::Protocol(other.to_string()),
        }
    }
}

impl From<TxError> for ClientError {
    fn from(err: TxError) -> Self {
        match err {
            TxError::Invalid(msg) => Self::Validation(msg),
            TxError::InvalidKey => Self::InvalidKey,
            TxError::Serialization(msg) => Self::Protocol(msg),
            other => Self::SigningFailure(other.to_string()),
        }
    }
}

impl From<TypeError> for ClientError {
    fn from(err: TypeError) -> Self {
        Self::Validation(err.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
