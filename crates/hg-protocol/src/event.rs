//! Inbound events and their payload schemas.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A named event exactly as the connection delivered it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub name: String,
    pub payload: Value,
}

impl RawEvent {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// An event without a payload (`connect`, `response_start`, ...).
    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(name, Value::Null)
    }
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    #[error("malformed `{event}` payload: {source}")]
    Malformed {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Coarse confidence category reported by the service.
///
/// Unrecognized levels decode into `Other` instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    Other(String),
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &str {
        match self {
            ConfidenceLevel::High => "HIGH",
            ConfidenceLevel::Medium => "MEDIUM",
            ConfidenceLevel::Low => "LOW",
            ConfidenceLevel::Other(s) => s,
        }
    }
}

impl From<String> for ConfidenceLevel {
    fn from(s: String) -> Self {
        match s.as_str() {
            "HIGH" => ConfidenceLevel::High,
            "MEDIUM" => ConfidenceLevel::Medium,
            "LOW" => ConfidenceLevel::Low,
            _ => ConfidenceLevel::Other(s),
        }
    }
}

impl From<&str> for ConfidenceLevel {
    fn from(s: &str) -> Self {
        ConfidenceLevel::from(s.to_string())
    }
}

impl From<ConfidenceLevel> for String {
    fn from(level: ConfidenceLevel) -> Self {
        level.as_str().to_string()
    }
}

/// `connected` carries an arbitrary payload; these are the fields we use.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConnectedPayload {
    pub message: Option<String>,
    pub session: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusPayload {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConfidencePayload {
    pub level: ConfidenceLevel,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolDetectedPayload {
    pub tool: String,
    #[serde(default)]
    pub summary: Value,
}

/// One retrieved knowledge source behind an answer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Source {
    pub source: String,
    /// Similarity score; the server omits it or sends `null` when unknown.
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SourcesPayload {
    #[serde(default)]
    pub sources: Vec<Source>,
}

/// A fragment of the streamed answer. A missing chunk is tolerated.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChunkPayload {
    #[serde(default)]
    pub chunk: Option<String>,
}

/// End of a streamed answer. `time` is the server-side duration in seconds.
///
/// Never rejected: the end of a stream must always be applied, so a `time`
/// of the wrong type (or a payload that is not an object) counts as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseEndPayload {
    pub time: Option<f64>,
}

impl ResponseEndPayload {
    fn from_value(value: &Value) -> Self {
        let time = match value {
            Value::Null => None,
            Value::Object(map) => match map.get("time") {
                None | Some(Value::Null) => None,
                Some(time) => {
                    let secs = time.as_f64();
                    if secs.is_none() {
                        tracing::warn!(%time, "ignoring non-numeric response_end time");
                    }
                    secs
                }
            },
            other => {
                tracing::warn!(payload = %other, "ignoring non-object response_end payload");
                None
            }
        };
        Self { time }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    /// Outcome of a slash command (`/target`, `/ports`, ...).
    Command(CommandResult),
    /// Any other response type; the client does not act on these.
    Other { kind: String },
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// Text of a remote `error` event, whatever shape it arrived in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPayload {
    pub text: String,
}

impl ErrorPayload {
    fn from_value(value: &Value) -> Self {
        let text = match value {
            Value::Null => "unknown error".to_string(),
            Value::String(s) => s.clone(),
            Value::Object(map) => match map.get("message") {
                Some(Value::String(s)) => s.clone(),
                _ => value.to_string(),
            },
            other => other.to_string(),
        };
        Self { text }
    }
}

/// Every inbound event the client understands, with a validated payload.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Connect,
    Connected(ConnectedPayload),
    Disconnect,
    Status(StatusPayload),
    Confidence(ConfidencePayload),
    ToolDetected(ToolDetectedPayload),
    Sources(SourcesPayload),
    ResponseStart,
    ResponseChunk(ChunkPayload),
    ResponseEnd(ResponseEndPayload),
    Response(ResponsePayload),
    Error(ErrorPayload),
}

impl InboundEvent {
    /// Validate a raw event against its schema.
    pub fn from_raw(raw: &RawEvent) -> Result<Self, PayloadError> {
        let name = raw.name.as_str();
        let payload = &raw.payload;
        let event = match name {
            "connect" => InboundEvent::Connect,
            "disconnect" => InboundEvent::Disconnect,
            "response_start" => InboundEvent::ResponseStart,
            "connected" => {
                InboundEvent::Connected(decode_lenient::<ConnectedPayload>(payload))
            }
            "status" => InboundEvent::Status(decode(name, payload)?),
            "confidence" => InboundEvent::Confidence(decode(name, payload)?),
            "tool_detected" => InboundEvent::ToolDetected(decode(name, payload)?),
            "sources" => InboundEvent::Sources(decode_or_default(name, payload)?),
            "response_chunk" => InboundEvent::ResponseChunk(decode_or_default(name, payload)?),
            "response_end" => InboundEvent::ResponseEnd(ResponseEndPayload::from_value(payload)),
            "response" => {
                let raw: RawResponse = decode(name, payload)?;
                if raw.kind == "command" {
                    InboundEvent::Response(ResponsePayload::Command(decode(name, &raw.data)?))
                } else {
                    InboundEvent::Response(ResponsePayload::Other { kind: raw.kind })
                }
            }
            "error" => InboundEvent::Error(ErrorPayload::from_value(payload)),
            other => return Err(PayloadError::UnknownEvent(other.to_string())),
        };
        Ok(event)
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::Connect => "connect",
            InboundEvent::Connected(_) => "connected",
            InboundEvent::Disconnect => "disconnect",
            InboundEvent::Status(_) => "status",
            InboundEvent::Confidence(_) => "confidence",
            InboundEvent::ToolDetected(_) => "tool_detected",
            InboundEvent::Sources(_) => "sources",
            InboundEvent::ResponseStart => "response_start",
            InboundEvent::ResponseChunk(_) => "response_chunk",
            InboundEvent::ResponseEnd(_) => "response_end",
            InboundEvent::Response(_) => "response",
            InboundEvent::Error(_) => "error",
        }
    }
}

fn decode<T: DeserializeOwned>(event: &str, payload: &Value) -> Result<T, PayloadError> {
    T::deserialize(payload).map_err(|source| PayloadError::Malformed {
        event: event.to_string(),
        source,
    })
}

/// Like `decode`, but a `null` payload means "all fields absent".
fn decode_or_default<T: DeserializeOwned + Default>(
    event: &str,
    payload: &Value,
) -> Result<T, PayloadError> {
    if payload.is_null() {
        return Ok(T::default());
    }
    decode(event, payload)
}

fn decode_lenient<T: DeserializeOwned + Default>(payload: &Value) -> T {
    T::deserialize(payload).unwrap_or_default()
}
