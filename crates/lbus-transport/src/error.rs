use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,

    #[error("invalid subject: {0}")]
    InvalidSubject(String),

    #[error("unknown subscription: {0}")]
    UnknownSubscription(u64),

    #[error("subscribe failed: {0}")]
    Subscribe(String),

    #[error("publish failed: {0}")]
    Publish(String),
}

pub type TransportResult<T> = Result<T, TransportError>;
