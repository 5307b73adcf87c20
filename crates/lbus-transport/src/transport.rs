use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportResult;

/// A message as delivered to subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub payload: Bytes,
}

/// Callback invoked from the transport's own dispatch context for every
/// message matching a subscription. Must not block.
pub type DeliveryHandler = Arc<dyn Fn(Message) + Send + Sync>;

/// Handle identifying one subscription on one transport.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Broadcast publish/subscribe transport: the only channel to the ledger.
///
/// Implementations fan each published message out to every subscription
/// whose pattern matches its subject. No ordering or delivery guarantee is
/// assumed beyond what the broker provides.
#[async_trait]
pub trait PubSubTransport: Send + Sync {
    /// Register `handler` for subjects matching `pattern` (`*` matches one
    /// token, `>` matches the remaining tokens).
    async fn subscribe(&self, pattern: &str, handler: DeliveryHandler) -> TransportResult<SubscriptionId>;

    /// Remove a subscription. Messages published afterwards are not delivered
    /// to its handler.
    async fn unsubscribe(&self, id: SubscriptionId) -> TransportResult<()>;

    async fn publish(&self, subject: &str, payload: Bytes) -> TransportResult<()>;
}

#[async_trait]
impl<T: PubSubTransport + ?Sized> PubSubTransport for Arc<T> {
    async fn subscribe(&self, pattern: &str, handler: DeliveryHandler) -> TransportResult<SubscriptionId> {
        (**self).subscribe(pattern, handler).await
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> TransportResult<()> {
        (**self).unsubscribe(id).await
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> TransportResult<()> {
        (**self).publish(subject, payload).await
    }
}
