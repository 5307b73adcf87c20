use std::fmt;

use ed25519_dalek::{Signer as _, Verifier as _};
use lbus_types::Address;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

const SEED_LEN: usize = ed25519_dalek::SECRET_KEY_LENGTH;
const KEYPAIR_LEN: usize = ed25519_dalek::KEYPAIR_LENGTH;
const SIGNATURE_LEN: usize = ed25519_dalek::SIGNATURE_LENGTH;

/// Private half of an Ed25519 keypair. Never printed.
pub struct SigningKey(ed25519_dalek::SigningKey);

/// Public half of an Ed25519 keypair; doubles as a ledger address.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey(ed25519_dalek::VerifyingKey);

/// Detached Ed25519 signature, serialized as 128 lowercase hex characters.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

/// Key or signature material that failed to parse or check.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature does not verify")]
    InvalidSignature,
    #[error("malformed key material")]
    InvalidKey,
}

/// Hex-decode `s` into exactly `N` bytes, or `None`.
fn decode_exact<const N: usize>(s: &str) -> Option<[u8; N]> {
    hex::decode(s).ok()?.try_into().ok()
}

impl SigningKey {
    /// Fresh key from the OS-seeded thread RNG.
    pub fn generate() -> Self {
        Self(ed25519_dalek::SigningKey::generate(&mut rand::thread_rng()))
    }

    pub fn from_bytes(seed: [u8; SEED_LEN]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(&seed))
    }

    /// Parse hex key material: a 32-byte seed, or a 64-byte
    /// `seed || public key` pair whose public half must match the seed.
    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        let s = s.trim();
        if let Some(seed) = decode_exact::<SEED_LEN>(s) {
            return Ok(Self::from_bytes(seed));
        }
        let pair = decode_exact::<KEYPAIR_LEN>(s).ok_or(SignatureError::InvalidKey)?;
        ed25519_dalek::SigningKey::from_keypair_bytes(&pair)
            .map(Self)
            .map_err(|_| SignatureError::InvalidKey)
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey(self.0.verifying_key())
    }

    /// Deterministic: equal key and message give equal signatures.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.0.sign(message))
    }

    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        self.0.as_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }
}

impl VerifyingKey {
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), SignatureError> {
        match self.0.verify(message, &signature.0) {
            Ok(()) => Ok(()),
            Err(_) => Err(SignatureError::InvalidSignature),
        }
    }

    pub fn to_address(&self) -> Address {
        Address::from_bytes(self.as_bytes())
    }

    /// The key an address names. Fails when the bytes are off the curve.
    pub fn from_address(address: &Address) -> Result<Self, SignatureError> {
        Self::from_bytes(address.to_bytes())
    }

    pub fn as_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, SignatureError> {
        ed25519_dalek::VerifyingKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|_| SignatureError::InvalidKey)
    }
}

impl Signature {
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        self.0.to_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        decode_exact::<SIGNATURE_LEN>(s)
            .map(|raw| Self(ed25519_dalek::Signature::from_bytes(&raw)))
            .ok_or(SignatureError::InvalidSignature)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(|_| de::Error::custom("signature must be 64 hex-encoded bytes"))
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(***)")
    }
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VerifyingKey").field(&hex::encode(self.as_bytes())).finish()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Signature({}..)", &hex[..16])
    }
}
