use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use lbus_protocol::{
    BlockSummary, ContractOutput, LedgerMethod, ListFilter, LogEntry, NonceQuery, NonceReply,
    ResponseEnvelope, RpcRequest, StateQuery,
};
use lbus_tx::SignedTransaction;
use lbus_types::{Address, TxHash};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{DevnetError, DevnetResult};

/// In-memory ledger for tests, local demos, and embedding.
///
/// Accepts a SEND when the signature verifies and the nonce is exactly one
/// past the sender's last committed nonce. Every accepted transaction gets
/// its own block and one log entry named after its method.
#[derive(Default)]
pub struct DevLedger {
    inner: RwLock<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    nonces: HashMap<Address, u64>,
    transactions: Vec<Committed>,
    logs: Vec<LogEntry>,
    blocks: Vec<BlockSummary>,
    contract_states: HashMap<Address, Vec<Value>>,
}

struct Committed {
    hash: TxHash,
    signed: SignedTransaction,
}

impl Committed {
    fn involves(&self, address: &Address) -> bool {
        let tx = self.signed.transaction();
        tx.from() == address || tx.to() == address
    }
}

impl DevLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer one request. Failures become error envelopes; this never
    /// panics on bad input.
    pub fn handle(&self, request: &RpcRequest) -> ResponseEnvelope {
        match self.dispatch(request) {
            Ok(data) => ResponseEnvelope::ok(data),
            Err(e) => {
                debug!(method = %request.method, error = %e, "request rejected");
                ResponseEnvelope::error(e.to_string())
            }
        }
    }

    fn dispatch(&self, request: &RpcRequest) -> DevnetResult<Value> {
        let method = LedgerMethod::parse(&request.method)
            .ok_or_else(|| DevnetError::UnknownMethod(request.method.clone()))?;
        match method {
            LedgerMethod::Send => to_value(self.submit(params(request)?)?),
            LedgerMethod::GetState => to_value(self.state(&params(request)?)),
            LedgerMethod::GetNonce => {
                let query: NonceQuery = params(request)?;
                let nonce = self
                    .nonce(&query.public_key)
                    .ok_or_else(|| DevnetError::AccountNotFound(query.public_key.to_string()))?;
                to_value(NonceReply { nonce })
            }
            LedgerMethod::GetTransactions => to_value(self.transactions(&list_params(request)?)),
            LedgerMethod::GetLogs => to_value(self.logs(&list_params(request)?)),
            LedgerMethod::GetBlocks => to_value(self.blocks(&list_params(request)?)),
        }
    }

    /// Verify and commit a signed transaction.
    pub fn submit(&self, signed: SignedTransaction) -> DevnetResult<ContractOutput> {
        signed.verify()?;
        let hash = signed.hash()?;
        let tx = signed.transaction();

        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let expected = state.nonces.get(tx.from()).copied().unwrap_or(0) + 1;
        if tx.nonce() != expected {
            return Err(DevnetError::NonceMismatch {
                expected,
                actual: tx.nonce(),
            });
        }

        let entry = Value::Object(tx.data().clone().into_iter().collect());
        let log = LogEntry {
            log_type: tx.method().to_string(),
            data: entry.clone(),
            contract: Some(tx.to().clone()),
            tx_hash: Some(hash),
        };
        let block = BlockSummary {
            height: state.blocks.len() as u64 + 1,
            timestamp: tx.timestamp(),
            transactions: vec![hash],
        };

        state.nonces.insert(tx.from().clone(), tx.nonce());
        state
            .contract_states
            .entry(tx.to().clone())
            .or_default()
            .push(entry.clone());
        state.logs.push(log.clone());
        info!(
            from = %tx.from().short_id(),
            nonce = tx.nonce(),
            tx_hash = %hash.short_hex(),
            height = block.height,
            "transaction committed"
        );
        state.blocks.push(block);
        state.transactions.push(Committed { hash, signed });

        Ok(ContractOutput {
            states: vec![entry],
            logs: vec![log],
        })
    }

    /// States of the addressed contract. The root answers with a summary of
    /// the whole ledger.
    pub fn state(&self, query: &StateQuery) -> ContractOutput {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        match &query.to {
            Some(contract) => ContractOutput {
                states: state.contract_states.get(contract).cloned().unwrap_or_default(),
                logs: state
                    .logs
                    .iter()
                    .filter(|l| l.contract.as_ref() == Some(contract))
                    .cloned()
                    .collect(),
            },
            None => ContractOutput {
                states: vec![json!({
                    "accounts": state.nonces.len(),
                    "contracts": state.contract_states.len(),
                    "height": state.blocks.len(),
                })],
                logs: Vec::new(),
            },
        }
    }

    /// Last committed nonce, `None` for an account never seen.
    pub fn nonce(&self, account: &Address) -> Option<u64> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .nonces
            .get(account)
            .copied()
    }

    pub fn transactions(&self, filter: &ListFilter) -> Vec<SignedTransaction> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let matching = state
            .transactions
            .iter()
            .filter(|c| filter.address.as_ref().map_or(true, |a| c.involves(a)))
            .filter(|c| {
                filter
                    .contract
                    .as_ref()
                    .map_or(true, |a| c.signed.transaction().to() == a)
            })
            .filter(|c| {
                filter
                    .log_type
                    .as_deref()
                    .map_or(true, |t| c.signed.transaction().method() == t)
            })
            .map(|c| c.signed.clone())
            .collect();
        filter.paginate(matching)
    }

    pub fn logs(&self, filter: &ListFilter) -> Vec<LogEntry> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let senders: HashMap<TxHash, &Address> = state
            .transactions
            .iter()
            .map(|c| (c.hash, c.signed.transaction().from()))
            .collect();
        let matching = state
            .logs
            .iter()
            .filter(|l| {
                filter.address.as_ref().map_or(true, |a| {
                    l.contract.as_ref() == Some(a)
                        || l.tx_hash.and_then(|h| senders.get(&h).copied()) == Some(a)
                })
            })
            .filter(|l| filter.contract.as_ref().map_or(true, |a| l.contract.as_ref() == Some(a)))
            .filter(|l| filter.log_type.as_deref().map_or(true, |t| l.log_type == t))
            .cloned()
            .collect();
        filter.paginate(matching)
    }

    pub fn blocks(&self, filter: &ListFilter) -> Vec<BlockSummary> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let by_hash: HashMap<TxHash, &Committed> =
            state.transactions.iter().map(|c| (c.hash, c)).collect();
        let matching = state
            .blocks
            .iter()
            .filter(|b| {
                (filter.address.is_none() && filter.contract.is_none())
                    || b.transactions.iter().any(|h| {
                        by_hash.get(h).is_some_and(|c| {
                            filter.address.as_ref().map_or(true, |a| c.involves(a))
                                && filter
                                    .contract
                                    .as_ref()
                                    .map_or(true, |a| c.signed.transaction().to() == a)
                        })
                    })
            })
            .cloned()
            .collect();
        filter.paginate(matching)
    }

    pub fn height(&self) -> u64 {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).blocks.len() as u64
    }
}

fn params<T: DeserializeOwned>(request: &RpcRequest) -> DevnetResult<T> {
    serde_json::from_value(request.params.clone()).map_err(|e| DevnetError::InvalidParams(e.to_string()))
}

/// List filters may be omitted entirely.
fn list_params(request: &RpcRequest) -> DevnetResult<ListFilter> {
    if request.params.is_null() {
        return Ok(ListFilter::default());
    }
    params(request)
}

fn to_value<T: Serialize>(value: T) -> DevnetResult<Value> {
    serde_json::to_value(value).map_err(|e| DevnetError::InvalidParams(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lbus_crypto::Identity;
    use lbus_tx::{sign, TransactionBuilder};
    use lbus_types::Payload;

    fn contract(byte: u8) -> Address {
        Address::from_bytes([byte; 32])
    }

    fn signed(identity: &Identity, to: Address, method: &str, nonce: u64) -> SignedTransaction {
        let mut data = Payload::new();
        data.insert("n".into(), json!(nonce));
        let tx = TransactionBuilder::new(identity.address().clone(), to, method)
            .data(data)
            .nonce(nonce)
            .timestamp(1_700_000_000 + nonce as i64)
            .build()
            .unwrap();
        sign(identity, tx).unwrap()
    }

    fn request(method: &str, params: Value) -> RpcRequest {
        RpcRequest {
            method: method.into(),
            params,
        }
    }

    #[test]
    fn accepts_sequential_nonces() {
        let ledger = DevLedger::new();
        let id = Identity::generate();
        for n in 1..=3 {
            ledger.submit(signed(&id, contract(9), "ADD_X", n)).unwrap();
        }
        assert_eq!(ledger.nonce(id.address()), Some(3));
        assert_eq!(ledger.height(), 3);
    }

    #[test]
    fn rejects_gaps_and_replays() {
        let ledger = DevLedger::new();
        let id = Identity::generate();
        let err = ledger.submit(signed(&id, contract(9), "ADD_X", 2)).unwrap_err();
        assert!(matches!(err, DevnetError::NonceMismatch { expected: 1, actual: 2 }));

        let first = signed(&id, contract(9), "ADD_X", 1);
        ledger.submit(first.clone()).unwrap();
        assert!(matches!(
            ledger.submit(first),
            Err(DevnetError::NonceMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn rejects_forged_signature() {
        let ledger = DevLedger::new();
        let owner = Identity::generate();
        let mut value = serde_json::to_value(signed(&owner, contract(9), "ADD_X", 1)).unwrap();
        value["method"] = json!("DRAIN");
        let forged: SignedTransaction = serde_json::from_value(value).unwrap();
        assert!(matches!(ledger.submit(forged), Err(DevnetError::Rejected(_))));
        assert_eq!(ledger.height(), 0);
    }

    #[test]
    fn unknown_account_nonce_is_not_found() {
        let ledger = DevLedger::new();
        let reply = ledger.handle(&request(
            "GET_NONCE",
            json!({"public_key": Identity::generate().address().to_string()}),
        ));
        assert!(!reply.is_ok());
        assert!(reply.message.contains("not found"));
    }

    #[test]
    fn unknown_method_and_bad_params_are_error_envelopes() {
        let ledger = DevLedger::new();
        let reply = ledger.handle(&request("MINT", json!({})));
        assert_eq!(reply.message, "unknown method: MINT");

        let reply = ledger.handle(&request("GET_NONCE", json!({"public_key": "nope"})));
        assert!(!reply.is_ok());
        assert!(reply.message.starts_with("invalid params"));
    }

    #[test]
    fn state_tracks_contract_data() {
        let ledger = DevLedger::new();
        let id = Identity::generate();
        ledger.submit(signed(&id, contract(9), "ADD_X", 1)).unwrap();
        ledger.submit(signed(&id, contract(8), "ADD_Y", 2)).unwrap();

        let query = StateQuery {
            from: None,
            to: Some(contract(9)),
            method: "ANY".into(),
            data: Payload::new(),
        };
        let out = ledger.state(&query);
        assert_eq!(out.states, vec![json!({"n": 1})]);
        assert_eq!(out.logs.len(), 1);

        let root = ledger.state(&StateQuery { to: None, ..query });
        assert_eq!(root.states[0]["height"], json!(2));
        assert_eq!(root.states[0]["contracts"], json!(2));
    }

    #[test]
    fn listings_filter_and_paginate() {
        let ledger = DevLedger::new();
        let alice = Identity::generate();
        let bob = Identity::generate();
        ledger.submit(signed(&alice, contract(9), "ADD_X", 1)).unwrap();
        ledger.submit(signed(&bob, contract(9), "ADD_Y", 1)).unwrap();
        ledger.submit(signed(&alice, contract(8), "ADD_X", 2)).unwrap();

        assert_eq!(ledger.transactions(&ListFilter::default()).len(), 3);
        assert_eq!(ledger.transactions(&ListFilter::for_address(alice.address().clone())).len(), 2);
        assert_eq!(ledger.transactions(&ListFilter::for_contract(contract(9))).len(), 2);

        let logs = ledger.logs(&ListFilter::default().with_log_type("ADD_X"));
        assert_eq!(logs.len(), 2);
        assert_eq!(ledger.logs(&ListFilter::for_address(bob.address().clone())).len(), 1);

        let page = ledger.blocks(&ListFilter::default().page(1, 1));
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].height, 2);
        assert_eq!(ledger.blocks(&ListFilter::for_contract(contract(8))).len(), 1);
    }

    #[test]
    fn list_params_may_be_null() {
        let ledger = DevLedger::new();
        let reply = ledger.handle(&request("GET_BLOCKS", Value::Null));
        assert!(reply.is_ok());
        assert_eq!(reply.data, json!([]));
    }
}
