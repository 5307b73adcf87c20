use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("address is empty")]
    EmptyAddress,

    #[error("invalid address length: expected {expected} hex characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid hex character {found:?} at position {position}")]
    InvalidHex { position: usize, found: char },

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("invalid correlation id: {0}")]
    InvalidCorrelationId(String),
}
