use std::sync::Arc;

use lbus_crypto::Identity;
use lbus_types::Address;

use crate::error::TxResult;
use crate::signed::{self, SignedTransaction};
use crate::transaction::Transaction;

/// Anything that can authorize transactions for one address.
///
/// Callers hand a signer to each state-changing call instead of swapping a
/// key inside the client, so several identities can be used concurrently.
pub trait TransactionSigner: Send + Sync {
    /// The address this signer signs for.
    fn address(&self) -> &Address;

    fn sign_transaction(&self, tx: Transaction) -> TxResult<SignedTransaction>;
}

impl TransactionSigner for Identity {
    fn address(&self) -> &Address {
        Identity::address(self)
    }

    fn sign_transaction(&self, tx: Transaction) -> TxResult<SignedTransaction> {
        signed::sign(self, tx)
    }
}

impl<T: TransactionSigner + ?Sized> TransactionSigner for Arc<T> {
    fn address(&self) -> &Address {
        (**self).address()
    }

    fn sign_transaction(&self, tx: Transaction) -> TxResult<SignedTransaction> {
        (**self).sign_transaction(tx)
    }
}
