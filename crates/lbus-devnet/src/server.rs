use std::sync::Arc;

use lbus_protocol::{EnvelopeCodec, ResponseEnvelope, Subjects};
use lbus_transport::{DeliveryHandler, Message, PubSubTransport, SubscriptionId};
use tracing::{debug, info, warn};

use crate::error::DevnetResult;
use crate::ledger::DevLedger;

/// How a served ledger reacts to requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ServeMode {
    #[default]
    Respond,
    /// Accept requests and never answer.
    Silent,
}

/// A [`DevLedger`] listening on a transport.
pub struct DevLedgerHandle {
    ledger: Arc<DevLedger>,
    transport: Arc<dyn PubSubTransport>,
    subscription: Option<SubscriptionId>,
}

impl DevLedger {
    /// Serve a fresh ledger on `R.request.*`.
    pub async fn spawn(transport: Arc<dyn PubSubTransport>, subjects: Subjects) -> DevnetResult<DevLedgerHandle> {
        Self::serve(Arc::new(Self::new()), transport, subjects, ServeMode::Respond).await
    }

    /// Serve an existing ledger.
    pub async fn serve(
        ledger: Arc<DevLedger>,
        transport: Arc<dyn PubSubTransport>,
        subjects: Subjects,
        mode: ServeMode,
    ) -> DevnetResult<DevLedgerHandle> {
        let handler = request_handler(Arc::clone(&ledger), Arc::clone(&transport), subjects.clone(), mode);
        let subscription = transport.subscribe(&subjects.request_wildcard(), handler).await?;
        info!(root = subjects.root(), ?mode, "dev ledger serving");
        Ok(DevLedgerHandle {
            ledger,
            transport,
            subscription: Some(subscription),
        })
    }
}

impl DevLedgerHandle {
    pub fn ledger(&self) -> &Arc<DevLedger> {
        &self.ledger
    }

    /// Stop listening. Requests already being answered still get replies.
    pub async fn stop(mut self) -> DevnetResult<()> {
        if let Some(id) = self.subscription.take() {
            self.transport.unsubscribe(id).await?;
            info!("dev ledger stopped");
        }
        Ok(())
    }
}

impl Drop for DevLedgerHandle {
    fn drop(&mut self) {
        let Some(id) = self.subscription.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let transport = Arc::clone(&self.transport);
                handle.spawn(async move {
                    if let Err(e) = transport.unsubscribe(id).await {
                        warn!(%id, error = %e, "failed to release dev ledger subscription");
                    }
                });
                debug!(%id, "dev ledger dropped without stop");
            }
            Err(_) => warn!(%id, "no runtime to release dev ledger subscription"),
        }
    }
}

fn request_handler(
    ledger: Arc<DevLedger>,
    transport: Arc<dyn PubSubTransport>,
    subjects: Subjects,
    mode: ServeMode,
) -> DeliveryHandler {
    Arc::new(move |message: Message| {
        let reply_to = match subjects.reply_for(&message.subject) {
            Ok(subject) => subject,
            Err(e) => {
                warn!(subject = %message.subject, error = %e, "request on unexpected subject");
                return;
            }
        };
        if mode == ServeMode::Silent {
            debug!(subject = %message.subject, "request dropped");
            return;
        }

        let reply = match EnvelopeCodec::decode_request(&message.payload) {
            Ok(request) => ledger.handle(&request),
            Err(e) => ResponseEnvelope::error(e.to_string()),
        };
        let transport = Arc::clone(&transport);
        tokio::spawn(async move {
            let bytes = match EnvelopeCodec::encode_response(&reply) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(error = %e, "failed to encode reply");
                    return;
                }
            };
            if let Err(e) = transport.publish(&reply_to, bytes).await {
                warn!(subject = %reply_to, error = %e, "failed to publish reply");
            }
        });
    })
}
