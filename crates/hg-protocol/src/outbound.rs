//! Outbound commands sent to the assistant service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPayload {
    pub query: String,
}

/// Events the client emits. There is exactly one today.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    Query(QueryPayload),
}

impl OutboundEvent {
    pub fn query(text: impl Into<String>) -> Self {
        OutboundEvent::Query(QueryPayload { query: text.into() })
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::Query(_) => "query",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            OutboundEvent::Query(p) => serde_json::json!({ "query": p.query }),
        }
    }

    /// Wrap the event for transports that carry name and payload together.
    pub fn to_envelope(&self) -> Envelope {
        Envelope {
            event: self.name().to_string(),
            data: self.payload(),
        }
    }
}

/// `{"event": name, "data": payload}` as posted to the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_payload_shape() {
        let event = OutboundEvent::query("hello");
        assert_eq!(event.name(), "query");
        assert_eq!(event.payload(), json!({"query": "hello"}));
    }

    #[test]
    fn envelope_serialization() {
        let envelope = OutboundEvent::query("scan 10.0.0.1").to_envelope();
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            json,
            json!({"event": "query", "data": {"query": "scan 10.0.0.1"}})
        );
    }
}
