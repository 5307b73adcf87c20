use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Number of raw bytes in a public key address.
pub const ADDRESS_BYTES: usize = 32;

/// Number of hex characters in an encoded address.
pub const ADDRESS_HEX_LEN: usize = ADDRESS_BYTES * 2;

/// A validated account address: the hex-encoded Ed25519 public key of a
/// signer or contract.
///
/// An `Address` can only be obtained through [`Address::parse`] (or the
/// `FromStr`/`Deserialize` impls that delegate to it), so every transaction
/// field typed as `Address` is known to be well formed. Parsing normalizes to
/// lowercase; the normalized form is what gets signed.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    hex: String,
    bytes: [u8; ADDRESS_BYTES],
}

impl Address {
    /// Validate and normalize a hex-encoded public key.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        validate(s)?;
        let mut bytes = [0u8; ADDRESS_BYTES];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| TypeError::InvalidLength {
            expected: ADDRESS_HEX_LEN,
            actual: s.len(),
        })?;
        Ok(Self {
            hex: s.to_ascii_lowercase(),
            bytes,
        })
    }

    /// Build an address from raw public key bytes.
    pub fn from_bytes(bytes: [u8; ADDRESS_BYTES]) -> Self {
        Self {
            hex: hex::encode(bytes),
            bytes,
        }
    }

    /// Raw public key bytes.
    pub fn to_bytes(&self) -> [u8; ADDRESS_BYTES] {
        self.bytes
    }

    /// The normalized hex string.
    pub fn as_str(&self) -> &str {
        &self.hex
    }

    /// Short identifier (first 8 hex characters), for logs.
    pub fn short_id(&self) -> &str {
        &self.hex[..8]
    }
}

/// Check that `s` is a well-formed address without allocating.
///
/// Fails on empty input, on any length other than [`ADDRESS_HEX_LEN`], and on
/// the first non-hex character.
pub fn validate(s: &str) -> Result<(), TypeError> {
    if s.is_empty() {
        return Err(TypeError::EmptyAddress);
    }
    if let Some((position, found)) = s.chars().enumerate().find(|(_, c)| !c.is_ascii_hexdigit()) {
        return Err(TypeError::InvalidHex { position, found });
    }
    if s.len() != ADDRESS_HEX_LEN {
        return Err(TypeError::InvalidLength {
            expected: ADDRESS_HEX_LEN,
            actual: s.len(),
        });
    }
    Ok(())
}

impl FromStr for Address {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.hex
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.short_id())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde helper for `Option<Address>` fields that travel as `""` when absent.
///
/// The ledger addresses its root contract with an empty `to`, so queries
/// encode `None` that way instead of as `null`.
pub mod empty_as_none {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Address;

    pub fn serialize<S>(value: &Option<Address>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(addr) => serializer.serialize_str(addr.as_str()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Address>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        if s.is_empty() {
            return Ok(None);
        }
        Address::parse(&s).map(Some).map_err(serde::de::Error::custom)
    }
}
