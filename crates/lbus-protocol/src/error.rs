use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("remote error: {message}")]
    Remote { message: String },

    #[error("invalid subject: {0}")]
    InvalidSubject(String),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
