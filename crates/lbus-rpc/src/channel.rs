use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use lbus_protocol::{EnvelopeCodec, Subjects};
use lbus_transport::{DeliveryHandler, Message, PubSubTransport, SubscriptionId, TransportError};
use lbus_types::CorrelationId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{RpcError, RpcResult};

/// Deadline applied by [`RpcChannel::call`].
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Request/reply correlation over a [`PubSubTransport`].
///
/// Cheap to clone; clones share the transport. Concurrent calls are
/// independent: every call mints its own correlation id and reply subject.
#[derive(Clone)]
pub struct RpcChannel {
    transport: Arc<dyn PubSubTransport>,
    subjects: Subjects,
    default_timeout: Duration,
}

impl RpcChannel {
    pub fn new(transport: Arc<dyn PubSubTransport>, subjects: Subjects, default_timeout: Duration) -> Self {
        Self {
            transport,
            subjects,
            default_timeout,
        }
    }

    pub fn subjects(&self) -> &Subjects {
        &self.subjects
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn transport(&self) -> &Arc<dyn PubSubTransport> {
        &self.transport
    }

    /// Call `method` under the default deadline and return the reply's
    /// `data` as bytes.
    pub async fn call<P: Serialize>(&self, method: &str, params: &P) -> RpcResult<Bytes> {
        self.call_with_timeout(method, params, self.default_timeout).await
    }

    /// Like [`RpcChannel::call`], deserializing the reply into `R`.
    pub async fn call_typed<P, R>(&self, method: &str, params: &P) -> RpcResult<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let payload = self.call(method, params).await?;
        serde_json::from_slice(&payload).map_err(|e| {
            RpcError::Protocol(lbus_protocol::ProtocolError::Deserialization(e.to_string()))
        })
    }

    pub async fn call_with_timeout<P: Serialize>(
        &self,
        method: &str,
        params: &P,
        after: Duration,
    ) -> RpcResult<Bytes> {
        let request = EnvelopeCodec::encode_request(method, params)?;

        let id = CorrelationId::new();
        let reply_subject = self.subjects.reply(&id);
        let request_subject = self.subjects.request(&id);

        let (tx, rx) = oneshot::channel::<Bytes>();
        let handler = reply_handler(id, tx);

        // Listen before publishing so a fast reply cannot slip past.
        let sub = self.transport.subscribe(&reply_subject, handler).await?;
        let guard = SubscriptionGuard::new(Arc::clone(&self.transport), sub);
        debug!(method, correlation_id = %id, subject = %request_subject, "rpc call");

        let outcome = self.exchange(method, &request_subject, request, rx, after).await;
        guard.release().await;

        match &outcome {
            Ok(_) => debug!(method, correlation_id = %id, "rpc reply"),
            Err(RpcError::Timeout { .. }) => {
                warn!(method, correlation_id = %id, ?after, "rpc timed out")
            }
            Err(e) => debug!(method, correlation_id = %id, error = %e, "rpc failed"),
        }
        outcome
    }

    async fn exchange(
        &self,
        method: &str,
        request_subject: &str,
        request: Bytes,
        rx: oneshot::Receiver<Bytes>,
        after: Duration,
    ) -> RpcResult<Bytes> {
        self.transport.publish(request_subject, request).await?;

        let payload = match tokio::time::timeout(after, rx).await {
            Ok(Ok(payload)) => payload,
            // The handler owns the sender; losing it means the transport
            // dropped our subscription.
            Ok(Err(_)) => return Err(RpcError::Transport(TransportError::Closed)),
            Err(_) => {
                return Err(RpcError::Timeout {
                    method: method.to_string(),
                    after,
                })
            }
        };
        Ok(EnvelopeCodec::decode(&payload)?)
    }
}

/// Delivery callback feeding a single-slot waiter. The first delivery wins;
/// later ones are dropped.
fn reply_handler(id: CorrelationId, tx: oneshot::Sender<Bytes>) -> DeliveryHandler {
    let slot = Mutex::new(Some(tx));
    Arc::new(move |message: Message| {
        let sender = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        match sender {
            Some(sender) => {
                // Receiver gone means the caller already gave up.
                let _ = sender.send(message.payload);
            }
            None => warn!(correlation_id = %id, subject = %message.subject, "duplicate reply dropped"),
        }
    })
}

/// Releases a reply subscription exactly once.
///
/// The normal path awaits [`SubscriptionGuard::release`]. If the owning
/// future is dropped first, `Drop` spawns the unsubscribe on the current
/// runtime.
struct SubscriptionGuard {
    transport: Arc<dyn PubSubTransport>,
    id: Option<SubscriptionId>,
}

impl SubscriptionGuard {
    fn new(transport: Arc<dyn PubSubTransport>, id: SubscriptionId) -> Self {
        Self {
            transport,
            id: Some(id),
        }
    }

    async fn release(mut self) {
        if let Some(id) = self.id.take() {
            if let Err(e) = self.transport.unsubscribe(id).await {
                warn!(%id, error = %e, "failed to release reply subscription");
            }
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let transport = Arc::clone(&self.transport);
                handle.spawn(async move {
                    if let Err(e) = transport.unsubscribe(id).await {
                        warn!(%id, error = %e, "failed to release reply subscription");
                    }
                });
                debug!(%id, "reply subscription released after cancellation");
            }
            Err(_) => warn!(%id, "no runtime to release reply subscription"),
        }
    }
}
