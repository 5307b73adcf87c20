use std::fmt;

use lbus_types::Address;

use crate::signer::{Signature, SignatureError, SigningKey, VerifyingKey};

/// The keypair of one signer.
///
/// Identities are immutable: switching signers means handing a different
/// `Identity` to the next call, never mutating one in place. The private half
/// never appears in `Debug` output.
pub struct Identity {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    address: Address,
}

impl Identity {
    /// Generate a fresh random identity.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate())
    }

    /// Load from hex-encoded private key material (seed or seed‖public form).
    pub fn from_private_key_hex(private_key: &str) -> Result<Self, SignatureError> {
        SigningKey::from_hex(private_key).map(Self::from_signing_key)
    }

    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        let address = verifying_key.to_address();
        Self {
            signing_key,
            verifying_key,
            address,
        }
    }

    /// Public key as a ledger address.
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Hex-encoded private seed. Only for export to a key file.
    pub fn private_key_hex(&self) -> String {
        self.signing_key.to_hex()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("address", &self.address)
            .field("signing_key", &self.signing_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_matches_public_key() {
        let id = Identity::generate();
        assert_eq!(id.address(), &id.verifying_key().to_address());
    }

    #[test]
    fn private_key_hex_roundtrip() {
        let id = Identity::generate();
        let restored = Identity::from_private_key_hex(&id.private_key_hex()).unwrap();
        assert_eq!(restored.address(), id.address());
    }

    #[test]
    fn malformed_private_key_is_invalid_key() {
        assert_eq!(
            Identity::from_private_key_hex("not hex").unwrap_err(),
            SignatureError::InvalidKey
        );
    }

    #[test]
    fn signatures_verify_against_address() {
        let id = Identity::generate();
        let sig = id.sign(b"payload");
        let vk = VerifyingKey::from_address(id.address()).unwrap();
        assert!(vk.verify(b"payload", &sig).is_ok());
    }

    #[test]
    fn debug_does_not_leak_private_key() {
        let id = Identity::generate();
        let debug = format!("{id:?}");
        assert!(debug.contains("***"));
        assert!(!debug.contains(&id.private_key_hex()));
    }
}
