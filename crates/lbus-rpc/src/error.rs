use std::time::Duration;

use lbus_protocol::ProtocolError;
use lbus_transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("{method} timed out after {after:?}")]
    Timeout { method: String, after: Duration },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("remote error: {message}")]
    Remote { message: String },

    #[error("protocol error: {0}")]
    Protocol(ProtocolError),
}

impl From<ProtocolError> for RpcError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Remote { message } => Self::Remote { message },
            other => Self::Protocol(other),
        }
    }
}

pub type RpcResult<T> = Result<T, RpcError>;
