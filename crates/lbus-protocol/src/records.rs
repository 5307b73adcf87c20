use lbus_types::address::empty_as_none;
use lbus_types::{Address, Payload, TxHash};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, ProtocolResult};

/// The ledger's structured result of applying a transaction or answering a
/// query. States are opaque; feature code decodes them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractOutput {
    #[serde(default)]
    pub states: Vec<Value>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

impl ContractOutput {
    /// Decode from reply payload bytes. A `null` payload is an empty output.
    pub fn from_payload(payload: &[u8]) -> ProtocolResult<Self> {
        let value: Value = serde_json::from_slice(payload)
            .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }

    /// Decode the state at `index` into a typed value.
    pub fn state<T: DeserializeOwned>(&self, index: usize) -> ProtocolResult<Option<T>> {
        self.states
            .get(index)
            .map(|v| {
                serde_json::from_value(v.clone())
                    .map_err(|e| ProtocolError::Deserialization(e.to_string()))
            })
            .transpose()
    }

    /// Logs of one type, in emission order.
    pub fn logs_of<'a>(&'a self, log_type: &'a str) -> impl Iterator<Item = &'a LogEntry> + 'a {
        self.logs.iter().filter(move |l| l.log_type == log_type)
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty() && self.logs.is_empty()
    }
}

/// An event emitted by a contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub log_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
}

/// One entry of a GET_BLOCKS listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub height: u64,
    pub timestamp: i64,
    #[serde(default)]
    pub transactions: Vec<TxHash>,
}

/// Parameters of GET_STATE. Queries are never signed; an absent `to`
/// travels as `""` and addresses the ledger root.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateQuery {
    #[serde(with = "empty_as_none", default)]
    pub from: Option<Address>,
    #[serde(with = "empty_as_none", default)]
    pub to: Option<Address>,
    pub method: String,
    #[serde(default)]
    pub data: Payload,
}

/// Parameters of GET_NONCE.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceQuery {
    pub public_key: Address,
}

/// Reply data of GET_NONCE: the last committed nonce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceReply {
    pub nonce: u64,
}

/// Filter shared by the GET_TRANSACTIONS, GET_LOGS, and GET_BLOCKS listings.
/// Unset fields are omitted from the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilter {
    /// Sender or recipient address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// Contract address (recipient of the originating transaction).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl ListFilter {
    pub fn for_address(address: Address) -> Self {
        Self {
            address: Some(address),
            ..Default::default()
        }
    }

    pub fn for_contract(contract: Address) -> Self {
        Self {
            contract: Some(contract),
            ..Default::default()
        }
    }

    pub fn with_log_type(mut self, log_type: impl Into<String>) -> Self {
        self.log_type = Some(log_type.into());
        self
    }

    pub fn page(mut self, offset: u32, limit: u32) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }

    /// Apply `offset`/`limit` to an already-filtered list.
    pub fn paginate<T>(&self, items: Vec<T>) -> Vec<T> {
        let offset = self.offset.unwrap_or(0) as usize;
        let iter = items.into_iter().skip(offset);
        match self.limit {
            Some(limit) => iter.take(limit as usize).collect(),
            None => iter.collect(),
        }
    }
}
