use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{TransportError, TransportResult};
use crate::pattern::{validate_subject, SubjectPattern};
use crate::transport::{DeliveryHandler, Message, PubSubTransport, SubscriptionId};

/// Internal subscriber: a pattern paired with its delivery callback.
struct Subscriber {
    id: SubscriptionId,
    pattern: SubjectPattern,
    handler: DeliveryHandler,
}

/// Fan-out router that delivers messages to matching subscribers.
struct Router {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl Router {
    fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    fn add(&self, sub: Subscriber) {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sub);
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        let mut subs = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    /// Route a message to all matching subscribers.
    ///
    /// Handlers are collected first and invoked without the lock held, so a
    /// handler may itself (un)subscribe.
    fn route(&self, message: &Message) -> usize {
        let handlers: Vec<DeliveryHandler> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.pattern.matches(&message.subject))
            .map(|s| Arc::clone(&s.handler))
            .collect();
        for handler in &handlers {
            handler(message.clone());
        }
        handlers.len()
    }

    fn len(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Counters for the traffic a broker has seen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BrokerStats {
    pub published: u64,
    pub subscribed: u64,
    pub unsubscribed: u64,
}

struct BrokerInner {
    router: Arc<Router>,
    queue: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    next_id: AtomicU64,
    published: AtomicU64,
    subscribed: AtomicU64,
    unsubscribed: AtomicU64,
    history: Option<Mutex<Vec<Message>>>,
}

/// In-process broker with a background dispatch task.
///
/// `publish` only enqueues; delivery happens later on the dispatch task,
/// which is what real brokers look like from the caller's side. Cloning
/// yields another handle to the same broker. The dispatch task ends once
/// every handle is dropped or [`InMemoryBroker::shutdown`] is called.
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<BrokerInner>,
}

impl InMemoryBroker {
    /// Start a broker. Must be called from within a Tokio runtime.
    pub fn start() -> Self {
        Self::build(false)
    }

    /// Start a broker that also records every published message.
    pub fn start_recording() -> Self {
        Self::build(true)
    }

    fn build(record: bool) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let router = Arc::new(Router::new());

        let dispatch_router = Arc::clone(&router);
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let delivered = dispatch_router.route(&message);
                trace!(subject = %message.subject, delivered, "message dispatched");
            }
            debug!("broker dispatch loop stopped");
        });

        Self {
            inner: Arc::new(BrokerInner {
                router,
                queue: Mutex::new(Some(tx)),
                next_id: AtomicU64::new(1),
                published: AtomicU64::new(0),
                subscribed: AtomicU64::new(0),
                unsubscribed: AtomicU64::new(0),
                history: record.then(|| Mutex::new(Vec::new())),
            }),
        }
    }

    /// Stop accepting messages. Already-queued messages are still delivered.
    pub fn shutdown(&self) {
        self.inner
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_closed(&self) -> bool {
        self.inner
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Current number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.router.len()
    }

    pub fn stats(&self) -> BrokerStats {
        BrokerStats {
            published: self.inner.published.load(Ordering::Relaxed),
            subscribed: self.inner.subscribed.load(Ordering::Relaxed),
            unsubscribed: self.inner.unsubscribed.load(Ordering::Relaxed),
        }
    }

    /// Messages published so far (empty unless started with
    /// [`InMemoryBroker::start_recording`]).
    pub fn published(&self) -> Vec<Message> {
        self.inner
            .history
            .as_ref()
            .map(|h| h.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PubSubTransport for InMemoryBroker {
    async fn subscribe(&self, pattern: &str, handler: DeliveryHandler) -> TransportResult<SubscriptionId> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let pattern_parsed = SubjectPattern::parse(pattern)?;
        let id = SubscriptionId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.router.add(Subscriber {
            id,
            pattern: pattern_parsed,
            handler,
        });
        self.inner.subscribed.fetch_add(1, Ordering::Relaxed);
        debug!(%id, pattern, "subscribed");
        Ok(id)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> TransportResult<()> {
        if !self.inner.router.remove(id) {
            return Err(TransportError::UnknownSubscription(id.as_u64()));
        }
        self.inner.unsubscribed.fetch_add(1, Ordering::Relaxed);
        debug!(%id, "unsubscribed");
        Ok(())
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> TransportResult<()> {
        validate_subject(subject)?;
        let message = Message {
            subject: subject.to_string(),
            payload,
        };
        {
            let queue = self
                .inner
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let sender = queue.as_ref().ok_or(TransportError::Closed)?;
            sender
                .send(message.clone())
                .map_err(|_| TransportError::Closed)?;
        }
        self.inner.published.fetch_add(1, Ordering::Relaxed);
        if let Some(history) = &self.inner.history {
            history
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(message);
        }
        trace!(subject, "published");
        Ok(())
    }
}
