use std::path::Path;
use std::time::Duration;

use lbus_protocol::{Subjects, DEFAULT_SUBJECT_ROOT};
use lbus_rpc::DEFAULT_CALL_TIMEOUT;
use lbus_tx::DEFAULT_TX_VERSION;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};
use crate::nonce::NoncePolicy;

/// Client settings, loadable from TOML.
///
/// ```toml
/// subject_root = "ledger"
/// call_timeout_ms = 10000
/// tx_version = 1
/// nonce_policy = "session-counter"
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub subject_root: String,
    pub call_timeout_ms: u64,
    pub tx_version: u32,
    pub nonce_policy: NoncePolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            subject_root: DEFAULT_SUBJECT_ROOT.to_string(),
            call_timeout_ms: DEFAULT_CALL_TIMEOUT.as_millis() as u64,
            tx_version: DEFAULT_TX_VERSION,
            nonce_policy: NoncePolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(s: &str) -> ClientResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| ClientError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.call_timeout_ms == 0 {
            return Err(ClientError::Config("call_timeout_ms must be greater than zero".into()));
        }
        self.subjects()?;
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn subjects(&self) -> ClientResult<Subjects> {
        Subjects::new(self.subject_root.clone()).map_err(|e| ClientError::Config(e.to_string()))
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_nonce_policy(mut self, policy: NoncePolicy) -> Self {
        self.nonce_policy = policy;
        self
    }
}
