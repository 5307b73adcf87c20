//! Request/reply over broadcast pub/sub.
//!
//! Each call gets its own correlation id, listens on the matching reply
//! subject before publishing, and waits for the first reply under a deadline.

pub mod channel;
pub mod error;

pub use channel::{RpcChannel, DEFAULT_CALL_TIMEOUT};
pub use error::{RpcError, RpcResult};
