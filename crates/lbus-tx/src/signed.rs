use lbus_crypto::{Identity, Signature, SignatureError, SigningKey, VerifyingKey};
use lbus_types::{Address, TxHash};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TxError, TxResult};
use crate::transaction::Transaction;

/// A transaction plus the signature that authorizes it.
///
/// Wire shape: the transaction fields flattened alongside `signature` and
/// `public_key`. The ledger is the sole authority on final acceptance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedTransaction {
    #[serde(flatten)]
    transaction: Transaction,
    signature: Signature,
    public_key: Address,
}

impl SignedTransaction {
    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn public_key(&self) -> &Address {
        &self.public_key
    }

    pub fn hash(&self) -> TxResult<TxHash> {
        self.transaction.hash()
    }

    /// Check that `public_key` is the sender and that the signature covers
    /// the canonical encoding.
    pub fn verify(&self) -> TxResult<()> {
        if &self.public_key != self.transaction.from() {
            return Err(TxError::SignerMismatch {
                from: self.transaction.from().clone(),
                signer: self.public_key.clone(),
            });
        }
        let key = VerifyingKey::from_address(&self.public_key).map_err(|_| TxError::InvalidKey)?;
        let message = self.transaction.canonical_bytes()?;
        key.verify(&message, &self.signature)
            .map_err(|_| TxError::InvalidSignature)
    }

    pub fn into_transaction(self) -> Transaction {
        self.transaction
    }
}

/// Sign `tx` with `identity`, which must own `tx.from`.
pub fn sign(identity: &Identity, tx: Transaction) -> TxResult<SignedTransaction> {
    if identity.address() != tx.from() {
        return Err(TxError::SignerMismatch {
            from: tx.from().clone(),
            signer: identity.address().clone(),
        });
    }
    let message = tx.canonical_bytes()?;
    let signature = identity.sign(&message);

    // Catch a corrupted key before the ledger does.
    identity
        .verifying_key()
        .verify(&message, &signature)
        .map_err(|e| TxError::SigningFailure(e.to_string()))?;

    debug!(
        from = %tx.from().short_id(),
        method = tx.method(),
        nonce = tx.nonce(),
        "transaction signed"
    );
    Ok(SignedTransaction {
        public_key: identity.address().clone(),
        transaction: tx,
        signature,
    })
}

/// Sign with hex-encoded private key material.
///
/// Malformed key material fails with [`TxError::InvalidKey`].
pub fn sign_with_private_key(private_key_hex: &str, tx: Transaction) -> TxResult<SignedTransaction> {
    let key = SigningKey::from_hex(private_key_hex).map_err(|e| match e {
        SignatureError::InvalidKey => TxError::InvalidKey,
        other => TxError::SigningFailure(other.to_string()),
    })?;
    sign(&Identity::from_signing_key(key), tx)
}
