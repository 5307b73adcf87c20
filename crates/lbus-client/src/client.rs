use std::sync::Arc;

use lbus_protocol::{
    BlockSummary, ContractOutput, LedgerMethod, ListFilter, LogEntry, NonceQuery, NonceReply,
    StateQuery,
};
use lbus_rpc::RpcChannel;
use lbus_transport::PubSubTransport;
use lbus_tx::{SignedTransaction, TransactionBuilder, TransactionSigner};
use lbus_types::{Address, Payload};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::nonce::NonceSequencer;

/// Client for a remote ledger reachable only through pub/sub.
///
/// Holds no identity. State-changing calls take a [`TransactionSigner`];
/// reads never sign. Nonces are assigned per signer through a
/// [`NonceSequencer`], so concurrent sends for one identity in this process
/// never reuse a nonce.
pub struct LedgerClient {
    rpc: RpcChannel,
    config: ClientConfig,
    nonces: NonceSequencer,
}

impl LedgerClient {
    pub fn new(transport: Arc<dyn PubSubTransport>, config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let rpc = RpcChannel::new(transport, config.subjects()?, config.call_timeout());
        Ok(Self {
            rpc,
            nonces: NonceSequencer::new(config.nonce_policy),
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn rpc(&self) -> &RpcChannel {
        &self.rpc
    }

    /// Bind a signer for a sequence of calls.
    pub fn session(&self, signer: Arc<dyn TransactionSigner>) -> Session<'_> {
        Session {
            client: self,
            signer,
        }
    }

    /// Build, sign, and submit a transaction calling `method` on `to`.
    ///
    /// `to` and `method` are checked before any I/O. The nonce is the
    /// ledger's last committed nonce for the signer plus one (1 for an
    /// unknown account).
    pub async fn sign_and_send_transaction<S>(
        &self,
        signer: &S,
        to: &str,
        method: &str,
        data: Payload,
    ) -> ClientResult<ContractOutput>
    where
        S: TransactionSigner + ?Sized,
    {
        let to = Address::parse(to)?;
        require_method(method)?;
        let from = signer.address().clone();

        let lease = self
            .nonces
            .lease(&from, || self.fetch_nonce(&from))
            .await?;

        let tx = TransactionBuilder::new(from, to, method)
            .data(data)
            .nonce(lease.nonce())
            .version(self.config.tx_version)
            .build()?;
        let signed = signer.sign_transaction(tx)?;
        let tx_hash = signed.hash()?;

        let payload = self.rpc.call(LedgerMethod::Send.as_str(), &signed).await?;
        let output = ContractOutput::from_payload(&payload)?;
        info!(
            from = %signed.public_key().short_id(),
            nonce = lease.nonce(),
            tx_hash = %tx_hash.short_hex(),
            "transaction accepted"
        );
        lease.commit();
        Ok(output)
    }

    /// Read-only query against `to` (empty for the ledger root). Never signs.
    pub async fn get_state(&self, to: &str, method: &str, data: Payload) -> ClientResult<ContractOutput> {
        self.query_state(None, to, method, data).await
    }

    async fn query_state(
        &self,
        from: Option<Address>,
        to: &str,
        method: &str,
        data: Payload,
    ) -> ClientResult<ContractOutput> {
        let to = if to.is_empty() {
            None
        } else {
            Some(Address::parse(to)?)
        };
        require_method(method)?;
        let query = StateQuery {
            from,
            to,
            method: method.to_string(),
            data,
        };
        let payload = self.rpc.call(LedgerMethod::GetState.as_str(), &query).await?;
        Ok(ContractOutput::from_payload(&payload)?)
    }

    /// Last committed nonce for `account`.
    ///
    /// Fails with [`ClientError::AccountNotFound`] when the ledger has no
    /// record of the account.
    pub async fn get_nonce(&self, account: &str) -> ClientResult<u64> {
        let account = Address::parse(account)?;
        self.fetch_nonce(&account).await
    }

    async fn fetch_nonce(&self, account: &Address) -> ClientResult<u64> {
        let query = NonceQuery {
            public_key: account.clone(),
        };
        let payload = match self.rpc.call(LedgerMethod::GetNonce.as_str(), &query).await {
            Ok(payload) => payload,
            Err(lbus_rpc::RpcError::Remote { message }) if is_not_found(&message) => {
                return Err(ClientError::AccountNotFound(account.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let value: Value = serde_json::from_slice(&payload)
            .map_err(|e| ClientError::Protocol(e.to_string()))?;
        if value.is_null() {
            return Err(ClientError::AccountNotFound(account.to_string()));
        }
        let reply: NonceReply =
            serde_json::from_value(value).map_err(|e| ClientError::Protocol(e.to_string()))?;
        debug!(account = %account.short_id(), nonce = reply.nonce, "nonce fetched");
        Ok(reply.nonce)
    }

    pub async fn get_transactions(&self, filter: &ListFilter) -> ClientResult<Vec<SignedTransaction>> {
        self.list(LedgerMethod::GetTransactions, filter).await
    }

    pub async fn get_logs(&self, filter: &ListFilter) -> ClientResult<Vec<LogEntry>> {
        self.list(LedgerMethod::GetLogs, filter).await
    }

    pub async fn get_blocks(&self, filter: &ListFilter) -> ClientResult<Vec<BlockSummary>> {
        self.list(LedgerMethod::GetBlocks, filter).await
    }

    async fn list<T: DeserializeOwned>(&self, method: LedgerMethod, filter: &ListFilter) -> ClientResult<Vec<T>> {
        let items: Option<Vec<T>> = self.call_typed(method, filter).await?;
        Ok(items.unwrap_or_default())
    }

    async fn call_typed<P: Serialize, R: DeserializeOwned>(&self, method: LedgerMethod, params: &P) -> ClientResult<R> {
        Ok(self.rpc.call_typed(method.as_str(), params).await?)
    }
}

/// A signer bound to a client.
pub struct Session<'a> {
    client: &'a LedgerClient,
    signer: Arc<dyn TransactionSigner>,
}

impl Session<'_> {
    pub fn address(&self) -> &Address {
        self.signer.address()
    }

    pub async fn sign_and_send(&self, to: &str, method: &str, data: Payload) -> ClientResult<ContractOutput> {
        self.client
            .sign_and_send_transaction(self.signer.as_ref(), to, method, data)
            .await
    }

    /// Query with `from` set to the session's address. Does not sign.
    pub async fn get_state(&self, to: &str, method: &str, data: Payload) -> ClientResult<ContractOutput> {
        self.client
            .query_state(Some(self.signer.address().clone()), to, method, data)
            .await
    }

    /// Last committed nonce for the session's address, 0 if unknown.
    pub async fn nonce(&self) -> ClientResult<u64> {
        match self.client.fetch_nonce(self.signer.address()).await {
            Err(ClientError::AccountNotFound(_)) => Ok(0),
            other => other,
        }
    }
}

fn require_method(method: &str) -> ClientResult<()> {
    if method.trim().is_empty() {
        return Err(ClientError::Validation("method must not be empty".into()));
    }
    Ok(())
}

fn is_not_found(message: &str) -> bool {
    message.to_ascii_lowercase().contains("not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nonce::NoncePolicy;
    use lbus_crypto::Identity;
    use lbus_protocol::{EnvelopeCodec, ResponseEnvelope, RpcRequest, Subjects};
    use lbus_transport::{BrokerStats, DeliveryHandler, InMemoryBroker, Message};
    use lbus_tx::{Transaction, TxResult};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Minimal scripted ledger: tracks committed nonces and keeps every
    /// submitted transaction.
    #[derive(Default)]
    struct StubLedger {
        committed: Mutex<Option<u64>>,
        sends: Mutex<Vec<SignedTransaction>>,
        nonce_queries: AtomicUsize,
        fail_next_send: AtomicBool,
        nonce_reply_null: AtomicBool,
    }

    impl StubLedger {
        fn respond(&self, request: &RpcRequest) -> ResponseEnvelope {
            match request.method.as_str() {
                "GET_NONCE" => {
                    self.nonce_queries.fetch_add(1, Ordering::SeqCst);
                    if self.nonce_reply_null.load(Ordering::SeqCst) {
                        return ResponseEnvelope::ok(Value::Null);
                    }
                    match *self.committed.lock().unwrap() {
                        Some(n) => ResponseEnvelope::ok(json!({ "nonce": n })),
                        None => ResponseEnvelope::error("Account not found"),
                    }
                }
                "SEND" => {
                    let signed: SignedTransaction =
                        serde_json::from_value(request.params.clone()).unwrap();
                    if self.fail_next_send.swap(false, Ordering::SeqCst) {
                        return ResponseEnvelope::error("ledger busy");
                    }
                    *self.committed.lock().unwrap() = Some(signed.transaction().nonce());
                    self.sends.lock().unwrap().push(signed);
                    ResponseEnvelope::ok(json!({ "states": [{"ok": true}], "logs": [] }))
                }
                "GET_STATE" => ResponseEnvelope::ok(json!({ "states": [request.params.clone()] })),
                "GET_LOGS" => ResponseEnvelope::ok(json!([{ "log_type": "Transfer", "data": {"amount": 5} }])),
                "GET_BLOCKS" => ResponseEnvelope::ok(Value::Null),
                other => ResponseEnvelope::error(format!("unknown method {other}")),
            }
        }

        fn send_nonces(&self) -> Vec<u64> {
            self.sends.lock().unwrap().iter().map(|s| s.transaction().nonce()).collect()
        }
    }

    async fn serve(broker: &InMemoryBroker, ledger: Arc<StubLedger>) {
        let subjects = Subjects::default();
        let responder = broker.clone();
        let reply_subjects = subjects.clone();
        let handler: DeliveryHandler = Arc::new(move |message: Message| {
            let request = EnvelopeCodec::decode_request(&message.payload).unwrap();
            let reply = EnvelopeCodec::encode_response(&ledger.respond(&request)).unwrap();
            let reply_to = reply_subjects.reply_for(&message.subject).unwrap();
            let broker = responder.clone();
            tokio::spawn(async move { broker.publish(&reply_to, reply).await.unwrap() });
        });
        broker.subscribe(&subjects.request_wildcard(), handler).await.unwrap();
    }

    async fn setup(policy: NoncePolicy) -> (InMemoryBroker, Arc<StubLedger>, LedgerClient) {
        let broker = InMemoryBroker::start();
        let ledger = Arc::new(StubLedger::default());
        serve(&broker, Arc::clone(&ledger)).await;
        let config = ClientConfig::default()
            .with_call_timeout(Duration::from_secs(2))
            .with_nonce_policy(policy);
        let client = LedgerClient::new(Arc::new(broker.clone()), config).unwrap();
        (broker, ledger, client)
    }

    struct CountingSigner {
        inner: Identity,
        calls: AtomicUsize,
    }

    impl CountingSigner {
        fn new() -> Self {
            Self {
                inner: Identity::generate(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TransactionSigner for CountingSigner {
        fn address(&self) -> &Address {
            self.inner.address()
        }

        fn sign_transaction(&self, tx: Transaction) -> TxResult<SignedTransaction> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.sign_transaction(tx)
        }
    }

    fn contract() -> String {
        Address::from_bytes([7; 32]).to_string()
    }

    fn data(pairs: &[(&str, Value)]) -> Payload {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn invalid_recipient_fails_without_io() {
        let broker = InMemoryBroker::start();
        let client = LedgerClient::new(Arc::new(broker.clone()), ClientConfig::default()).unwrap();
        let signer = CountingSigner::new();

        for bad in ["", "abc", "g".repeat(64).as_str()] {
            let err = client
                .sign_and_send_transaction(&signer, bad, "ADD_X", Payload::new())
                .await
                .unwrap_err();
            assert!(matches!(err, ClientError::Validation(_)), "{bad:?} gave {err:?}");
        }
        let err = client
            .sign_and_send_transaction(&signer, &contract(), " ", Payload::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));

        assert_eq!(broker.stats(), BrokerStats::default());
        assert_eq!(signer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_address_reads_fail_without_io() {
        let broker = InMemoryBroker::start();
        let client = LedgerClient::new(Arc::new(broker.clone()), ClientConfig::default()).unwrap();

        for bad in ["", "abc", "g".repeat(64).as_str()] {
            let err = client.get_state(bad, "GET", Payload::new()).await.unwrap_err();
            assert!(matches!(err, ClientError::Validation(_)), "get_state({bad:?}) gave {err:?}");

            let err = client.get_nonce(bad).await.unwrap_err();
            assert!(matches!(err, ClientError::Validation(_)), "get_nonce({bad:?}) gave {err:?}");
        }

        assert_eq!(broker.stats(), BrokerStats::default());
    }

    #[tokio::test]
    async fn unknown_account_sends_nonce_one_with_valid_signature() {
        let (_broker, ledger, client) = setup(NoncePolicy::SessionCounter).await;
        let identity = Identity::generate();

        let output = client
            .sign_and_send_transaction(&identity, &contract(), "ADD_X", data(&[("a", json!("b"))]))
            .await
            .unwrap();
        assert_eq!(output.states, vec![json!({"ok": true})]);

        let sends = ledger.sends.lock().unwrap().clone();
        assert_eq!(sends.len(), 1);
        let sent = &sends[0];
        assert_eq!(sent.transaction().nonce(), 1);
        assert_eq!(sent.public_key(), identity.address());
        assert_eq!(sent.transaction().from(), identity.address());
        assert_eq!(sent.transaction().method(), "ADD_X");
        assert_eq!(sent.transaction().data()["a"], json!("b"));
        assert!(sent.verify().is_ok());
    }

    #[tokio::test]
    async fn sequential_sends_increase_nonce() {
        for policy in [NoncePolicy::SessionCounter, NoncePolicy::Refetch] {
            let (_broker, ledger, client) = setup(policy).await;
            let identity = Identity::generate();
            for _ in 0..3 {
                client
                    .sign_and_send_transaction(&identity, &contract(), "ADD_X", Payload::new())
                    .await
                    .unwrap();
            }
            assert_eq!(ledger.send_nonces(), vec![1, 2, 3], "{policy:?}");
            let expected_queries = match policy {
                NoncePolicy::SessionCounter => 1,
                NoncePolicy::Refetch => 3,
            };
            assert_eq!(ledger.nonce_queries.load(Ordering::SeqCst), expected_queries);
        }
    }

    #[tokio::test]
    async fn concurrent_sends_for_one_identity_never_reuse_a_nonce() {
        let (_broker, ledger, client) = setup(NoncePolicy::SessionCounter).await;
        let client = Arc::new(client);
        let identity = Arc::new(Identity::generate());

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let client = Arc::clone(&client);
            let identity = Arc::clone(&identity);
            tasks.spawn(async move {
                client
                    .sign_and_send_transaction(&*identity, &contract(), "ADD_X", Payload::new())
                    .await
                    .unwrap();
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap();
        }
        let mut nonces = ledger.send_nonces();
        nonces.sort_unstable();
        assert_eq!(nonces, (1..=8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn failed_send_reseeds_from_ledger() {
        let (_broker, ledger, client) = setup(NoncePolicy::SessionCounter).await;
        let identity = Identity::generate();
        client
            .sign_and_send_transaction(&identity, &contract(), "ADD_X", Payload::new())
            .await
            .unwrap();

        ledger.fail_next_send.store(true, Ordering::SeqCst);
        let err = client
            .sign_and_send_transaction(&identity, &contract(), "ADD_X", Payload::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Remote { ref message } if message == "ledger busy"));
        assert!(err.reached_ledger());

        client
            .sign_and_send_transaction(&identity, &contract(), "ADD_X", Payload::new())
            .await
            .unwrap();
        assert_eq!(ledger.send_nonces(), vec![1, 2]);
        assert_eq!(ledger.nonce_queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn get_nonce_reports_unknown_accounts() {
        let (_broker, ledger, client) = setup(NoncePolicy::SessionCounter).await;
        let account = Identity::generate().address().to_string();

        let err = client.get_nonce(&account).await.unwrap_err();
        assert!(matches!(err, ClientError::AccountNotFound(_)));

        ledger.nonce_reply_null.store(true, Ordering::SeqCst);
        let err = client.get_nonce(&account).await.unwrap_err();
        assert!(matches!(err, ClientError::AccountNotFound(_)));

        assert!(matches!(client.get_nonce("xyz").await, Err(ClientError::Validation(_))));
    }

    #[tokio::test]
    async fn reads_never_sign() {
        let (_broker, ledger, client) = setup(NoncePolicy::SessionCounter).await;
        let signer = Arc::new(CountingSigner::new());
        let session = client.session(signer.clone());

        let output = session
            .get_state(&contract(), "GET_BALANCE", data(&[("who", json!("me"))]))
            .await
            .unwrap();
        let echoed = &output.states[0];
        assert_eq!(echoed["from"], json!(signer.address().to_string()));
        assert_eq!(echoed["method"], json!("GET_BALANCE"));

        let root = client.get_state("", "TOTAL_SUPPLY", Payload::new()).await.unwrap();
        assert_eq!(root.states[0]["to"], json!(""));

        assert_eq!(session.nonce().await.unwrap(), 0);
        client.get_logs(&ListFilter::default()).await.unwrap();
        assert_eq!(signer.calls.load(Ordering::SeqCst), 0);
        assert!(ledger.sends.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn session_sends_with_bound_signer() {
        let (_broker, ledger, client) = setup(NoncePolicy::SessionCounter).await;
        let signer = Arc::new(CountingSigner::new());
        let session = client.session(signer.clone());

        session.sign_and_send(&contract(), "ADD_X", Payload::new()).await.unwrap();
        session.sign_and_send(&contract(), "ADD_X", Payload::new()).await.unwrap();

        assert_eq!(signer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(ledger.send_nonces(), vec![1, 2]);
        assert_eq!(session.nonce().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn list_queries_decode_records() {
        let (_broker, _ledger, client) = setup(NoncePolicy::SessionCounter).await;
        let logs = client.get_logs(&ListFilter::default().with_log_type("Transfer")).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].log_type, "Transfer");

        // null data decodes as an empty list
        let blocks = client.get_blocks(&ListFilter::default()).await.unwrap();
        assert!(blocks.is_empty());
    }

    #[tokio::test]
    async fn silent_ledger_times_out() {
        let broker = InMemoryBroker::start();
        let config = ClientConfig::default().with_call_timeout(Duration::from_millis(100));
        let client = LedgerClient::new(Arc::new(broker.clone()), config).unwrap();

        let err = client.get_nonce(&contract()).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout { ref method, .. } if method == "GET_NONCE"));
        assert_eq!(broker.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn rejects_invalid_config() {
        let broker = InMemoryBroker::start();
        let config = ClientConfig {
            call_timeout_ms: 0,
            ..ClientConfig::default()
        };
        assert!(matches!(
            LedgerClient::new(Arc::new(broker), config),
            Err(ClientError::Config(_))
        ));
    }
}
