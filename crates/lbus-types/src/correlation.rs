use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Ties an asynchronous reply back to the request that produced it.
///
/// A fresh id is minted for every call, so at most one pending request ever
/// listens on the reply subject derived from it. The string form is the
/// 32-character simple UUID encoding, which is safe to embed as a single
/// subject token.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(uuid::Uuid);

impl CorrelationId {
    /// Generate a new random correlation id (UUID v4).
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Parse the simple (or hyphenated) UUID form.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| TypeError::InvalidCorrelationId(e.to_string()))
    }

    /// Parse exactly the [`to_token`](Self::to_token) form, so that
    /// `from_token(t)?.to_token() == t`.
    pub fn from_token(s: &str) -> Result<Self, TypeError> {
        let canonical = s.len() == 32 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !canonical {
            return Err(TypeError::InvalidCorrelationId(format!("not a simple lowercase token: {s:?}")));
        }
        Self::parse(s)
    }

    /// Subject-safe token (32 lowercase hex characters).
    pub fn to_token(&self) -> String {
        self.0.simple().to_string()
    }

    /// Short representation (first 8 characters), for logs.
    pub fn short_id(&self) -> String {
        self.to_token()[..8].to_string()
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CorrelationId({})", self.short_id())
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_token())
    }
}
