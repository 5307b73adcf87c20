use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{ResponseEnvelope, RpcRequest, Status};

/// JSON codec for request and response envelopes.
///
/// The decoder is payload-agnostic: it branches on `status`, passes `message`
/// through verbatim, and hands `data` back as opaque bytes.
pub struct EnvelopeCodec;

impl EnvelopeCodec {
    /// Encode `{method, params}`.
    pub fn encode_request<P: Serialize>(method: &str, params: &P) -> ProtocolResult<Bytes> {
        let params = serde_json::to_value(params)
            .map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        let request = RpcRequest {
            method: method.to_string(),
            params,
        };
        serde_json::to_vec(&request)
            .map(Bytes::from)
            .map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    pub fn decode_request(data: &[u8]) -> ProtocolResult<RpcRequest> {
        serde_json::from_slice(data).map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))
    }

    pub fn encode_response(envelope: &ResponseEnvelope) -> ProtocolResult<Bytes> {
        serde_json::to_vec(envelope)
            .map(Bytes::from)
            .map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Encode a successful reply carrying `data`.
    pub fn encode_ok<D: Serialize>(data: &D) -> ProtocolResult<Bytes> {
        let data = serde_json::to_value(data)
            .map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        Self::encode_response(&ResponseEnvelope::ok(data))
    }

    pub fn encode_error(message: &str) -> ProtocolResult<Bytes> {
        Self::encode_response(&ResponseEnvelope::error(message))
    }

    /// Parse the outer envelope without interpreting it.
    pub fn decode_envelope(data: &[u8]) -> ProtocolResult<ResponseEnvelope> {
        serde_json::from_slice(data).map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))
    }

    /// Unwrap a reply: `ok` yields the re-serialized `data`, `error` yields
    /// [`ProtocolError::Remote`] carrying `message`.
    pub fn decode(data: &[u8]) -> ProtocolResult<Bytes> {
        let envelope = Self::decode_envelope(data)?;
        match envelope.status {
            Status::Ok => Self::payload_bytes(&envelope.data),
            Status::Error => Err(ProtocolError::Remote {
                message: envelope.message,
            }),
        }
    }

    fn payload_bytes(data: &Value) -> ProtocolResult<Bytes> {
        serde_json::to_vec(data)
            .map(Bytes::from)
            .map_err(|e| ProtocolError::Serialization(e.to_string()))
    }
}
