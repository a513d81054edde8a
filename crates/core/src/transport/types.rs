//! Types shared by the transport backends.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in a transport backend.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Consume failed: {0}")]
    Consume(String),

    #[error("Offset commit failed: {0}")]
    Commit(String),

    #[error("Malformed message: {0}")]
    Decode(String),

    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

/// Payload published for every new submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionEvent {
    pub id: String,
    pub content: String,
}

impl SubmissionEvent {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }

    /// JSON encoding used on the wire.
    pub fn encode(&self) -> Result<Vec<u8>, TransportError> {
        serde_json::to_vec(self).map_err(|e| TransportError::Publish(e.to_string()))
    }

    pub fn decode(payload: &[u8]) -> Result<Self, TransportError> {
        serde_json::from_slice(payload).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

/// A message read from a broker, detached from the client that fetched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let event = SubmissionEvent::new("sub-1", "hello 1");
        let json: serde_json::Value = serde_json::from_slice(&event.encode().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"id": "sub-1", "content": "hello 1"}));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = SubmissionEvent::decode(b"not json").unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));

        let err = SubmissionEvent::decode(br#"{"id": "sub-1"}"#).unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));
    }

    #[test]
    fn test_decode_ignores_extra_fields() {
        let event =
            SubmissionEvent::decode(br#"{"id": "a", "content": "b", "trace": "x"}"#).unwrap();
        assert_eq!(event, SubmissionEvent::new("a", "b"));
    }
}
