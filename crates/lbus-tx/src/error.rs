use lbus_types::Address;

/// Errors produced while building, signing, or verifying transactions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxError {
    #[error("invalid transaction: {0}")]
    Invalid(String),

    #[error("invalid key material")]
    InvalidKey,

    #[error("signing failed: {0}")]
    SigningFailure(String),

    #[error("signer {signer} cannot sign for {from}")]
    SignerMismatch { from: Address, signer: Address },

    #[error("signature does not verify")]
    InvalidSignature,

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type TxResult<T> = Result<T, TxError>;
