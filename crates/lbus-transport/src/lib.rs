//! Publish/subscribe transport boundary for the ledger bus client.
//!
//! [`PubSubTransport`] is the seam broker adapters implement. The crate also
//! ships [`InMemoryBroker`], an in-process broker with subject wildcards and a
//! background dispatch task, used by tests, demos, and embedded setups.

pub mod error;
pub mod memory;
pub mod pattern;
pub mod transport;

pub use error::{TransportError, TransportResult};
pub use memory::{BrokerStats, InMemoryBroker};
pub use pattern::{validate_subject, SubjectPattern};
pub use transport::{DeliveryHandler, Message, PubSubTransport, SubscriptionId};
