//! Wire protocol for the ledger bus client.
//!
//! Defines the request/response envelopes, the subject scheme that pairs a
//! request with its reply, and the record shapes the ledger returns.

pub mod codec;
pub mod error;
pub mod message;
pub mod records;
pub mod subject;

pub use codec::EnvelopeCodec;
pub use error::{ProtocolError, ProtocolResult};
pub use message::{LedgerMethod, ResponseEnvelope, RpcRequest, Status};
pub use records::{
    BlockSummary, ContractOutput, ListFilter, LogEntry, NonceQuery, NonceReply, StateQuery,
};
pub use subject::{Subjects, DEFAULT_SUBJECT_ROOT};
