use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ledger methods understood by the remote service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LedgerMethod {
    /// Submit a signed transaction.
    Send,
    /// Read-only contract query; never signed.
    GetState,
    GetNonce,
    GetTransactions,
    GetLogs,
    GetBlocks,
}

impl LedgerMethod {
    pub const ALL: [LedgerMethod; 6] = [
        Self::Send,
        Self::GetState,
        Self::GetNonce,
        Self::GetTransactions,
        Self::GetLogs,
        Self::GetBlocks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Send => "SEND",
            Self::GetState => "GET_STATE",
            Self::GetNonce => "GET_NONCE",
            Self::GetTransactions => "GET_TRANSACTIONS",
            Self::GetLogs => "GET_LOGS",
            Self::GetBlocks => "GET_BLOCKS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }

    /// Whether the method changes ledger state.
    pub fn is_mutating(&self) -> bool {
        matches!(self, Self::Send)
    }
}

impl fmt::Display for LedgerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound request: `{method, params}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Envelope status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// Every reply is wrapped in `{status, message, data}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub status: Status,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

impl ResponseEnvelope {
    pub fn ok(data: Value) -> Self {
        Self {
            status: Status::Ok,
            message: String::new(),
            data,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            data: Value::Null,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}
