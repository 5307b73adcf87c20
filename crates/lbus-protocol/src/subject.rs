use lbus_types::CorrelationId;

use crate::error::{ProtocolError, ProtocolResult};

/// Default root shared by request and reply subjects.
pub const DEFAULT_SUBJECT_ROOT: &str = "ledger";

const REQUEST_SEGMENT: &str = "request";
const REPLY_SEGMENT: &str = "reply";

/// Subject scheme pairing request and reply addresses.
///
/// For root `R` and correlation id `C`:
/// - request: `R.request.C`
/// - reply:   `R.reply.C`
///
/// The responder listens on `R.request.*` and derives where to answer from
/// the subject the request arrived on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subjects {
    root: String,
}

impl Subjects {
    pub fn new(root: impl Into<String>) -> ProtocolResult<Self> {
        let root = root.into();
        validate_root(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn request(&self, id: &CorrelationId) -> String {
        format!("{}.{REQUEST_SEGMENT}.{}", self.root, id.to_token())
    }

    pub fn reply(&self, id: &CorrelationId) -> String {
        format!("{}.{REPLY_SEGMENT}.{}", self.root, id.to_token())
    }

    /// Pattern matching every request subject under this root.
    pub fn request_wildcard(&self) -> String {
        format!("{}.{REQUEST_SEGMENT}.*", self.root)
    }

    /// Extract the correlation id from a request subject.
    ///
    /// Only the token form [`Subjects::request`] emits is accepted, so the
    /// reply subject always matches what the requester subscribed to.
    pub fn correlation_of(&self, request_subject: &str) -> ProtocolResult<CorrelationId> {
        let rest = request_subject
            .strip_prefix(self.root.as_str())
            .and_then(|s| s.strip_prefix('.'))
            .and_then(|s| s.strip_prefix(REQUEST_SEGMENT))
            .and_then(|s| s.strip_prefix('.'))
            .ok_or_else(|| ProtocolError::InvalidSubject(request_subject.to_string()))?;
        CorrelationId::from_token(rest)
            .map_err(|_| ProtocolError::InvalidSubject(request_subject.to_string()))
    }

    /// Reply subject paired with a request subject.
    pub fn reply_for(&self, request_subject: &str) -> ProtocolResult<String> {
        self.correlation_of(request_subject).map(|id| self.reply(&id))
    }
}

impl Default for Subjects {
    fn default() -> Self {
        Self {
            root: DEFAULT_SUBJECT_ROOT.to_string(),
        }
    }
}

fn validate_root(root: &str) -> ProtocolResult<()> {
    if root.is_empty() {
        return Err(ProtocolError::InvalidSubject("subject root is empty".into()));
    }
    for token in root.split('.') {
        if token.is_empty() {
            return Err(ProtocolError::InvalidSubject(format!("empty token in {root:?}")));
        }
        if token == "*" || token == ">" || token.chars().any(|c| c.is_whitespace()) {
            return Err(ProtocolError::InvalidSubject(format!(
                "invalid token {token:?} in {root:?}"
            )));
        }
    }
    Ok(())
}
