//! Scripted transport for tests and the offline demo.
//!
//! Produces the same `RawEvent` sequence the HTTP transport delivers, so
//! every layer above the gateway can run without a server.

use std::time::Duration;

use async_stream::stream;
use futures::Stream;
use hg_protocol::{OutboundEvent, RawEvent};
use serde_json::json;
use tokio::time::sleep;

use crate::{Emitter, GatewayError};

/// Records every emitted event instead of sending it.
#[derive(Debug, Default)]
pub struct MockEmitter {
    pub sent: Vec<OutboundEvent>,
    /// When set, every emit fails with `GatewayError::Closed`.
    pub fail: bool,
}

impl MockEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// An emitter whose connection is already gone.
    pub fn closed() -> Self {
        Self {
            sent: Vec::new(),
            fail: true,
        }
    }
}

impl Emitter for MockEmitter {
    fn emit(&mut self, event: OutboundEvent) -> Result<(), GatewayError> {
        if self.fail {
            return Err(GatewayError::Closed);
        }
        self.sent.push(event);
        Ok(())
    }
}

/// One step of a script.
#[derive(Debug, Clone)]
pub enum MockStep {
    /// Deliver an event.
    Event(RawEvent),
    /// Pause before the next step.
    Delay { ms: u64 },
}

/// An ordered script of inbound traffic.
#[derive(Debug, Clone, Default)]
pub struct MockScript {
    pub steps: Vec<MockStep>,
    /// Optional pause before every event.
    pub step_delay_ms: Option<u64>,
}

impl MockScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event(mut self, event: RawEvent) -> Self {
        self.steps.push(MockStep::Event(event));
        self
    }

    pub fn delay(mut self, ms: u64) -> Self {
        self.steps.push(MockStep::Delay { ms });
        self
    }

    pub fn with_step_delay(mut self, ms: u64) -> Self {
        self.step_delay_ms = Some(ms);
        self
    }

    /// Append another script. Its step delay becomes explicit pauses so it
    /// only applies to the appended events.
    pub fn then(mut self, other: MockScript) -> Self {
        for step in other.steps {
            if let (Some(ms), MockStep::Event(_)) = (other.step_delay_ms, &step) {
                self.steps.push(MockStep::Delay { ms });
            }
            self.steps.push(step);
        }
        self
    }

    /// Just the events, in order, without timing.
    pub fn events(&self) -> Vec<RawEvent> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                MockStep::Event(event) => Some(event.clone()),
                MockStep::Delay { .. } => None,
            })
            .collect()
    }
}

/// Play a script as an event stream.
pub fn mock_stream(script: MockScript) -> impl Stream<Item = RawEvent> + Send + 'static {
    let step_delay = script.step_delay_ms;
    stream! {
        for step in script.steps {
            match step {
                MockStep::Event(event) => {
                    if let Some(ms) = step_delay {
                        sleep(Duration::from_millis(ms)).await;
                    }
                    yield event;
                }
                MockStep::Delay { ms } => {
                    sleep(Duration::from_millis(ms)).await;
                }
            }
        }
    }
}

/// Ready-made scripts for common scenarios.
pub mod fixtures {
    use super::*;

    /// `connect` followed by the server's `connected` greeting.
    pub fn handshake() -> MockScript {
        MockScript::new().event(RawEvent::bare("connect")).event(RawEvent::new(
            "connected",
            json!({"message": "Connected to HackGPT", "session": "default"}),
        ))
    }

    /// A complete streamed answer.
    pub fn streamed_response(chunks: &[&str], secs: f64) -> MockScript {
        let mut script = MockScript::new().event(RawEvent::bare("response_start"));
        for chunk in chunks {
            script = script.event(chunk_event(chunk));
        }
        script.event(RawEvent::new("response_end", json!({ "time": secs })))
    }

    /// A second `response_start` arrives before the first answer ends.
    pub fn restarted_response(first: &[&str], second: &[&str], secs: f64) -> MockScript {
        let mut script = MockScript::new().event(RawEvent::bare("response_start"));
        for chunk in first {
            script = script.event(chunk_event(chunk));
        }
        script.then(streamed_response(second, secs))
    }

    /// The connection drops mid-answer; a late chunk follows.
    pub fn disconnect_mid_stream(chunks: &[&str], late_chunk: &str) -> MockScript {
        let mut script = MockScript::new().event(RawEvent::bare("response_start"));
        for chunk in chunks {
            script = script.event(chunk_event(chunk));
        }
        script
            .event(RawEvent::bare("disconnect"))
            .event(chunk_event(late_chunk))
    }

    /// Scripted conversation shown by `hackgpt --demo`.
    pub fn demo_conversation() -> MockScript {
        handshake()
            .delay(400)
            .event(RawEvent::new(
                "status",
                json!({"message": "Retrieving context..."}),
            ))
            .event(RawEvent::new(
                "confidence",
                json!({"level": "HIGH", "score": 0.87}),
            ))
            .event(RawEvent::new(
                "sources",
                json!({"sources": [
                    {"source": "hacktricks/nmap.md", "score": 0.91},
                    {"source": "payloads/smb.md", "score": 0.83}
                ]}),
            ))
            .event(RawEvent::new(
                "status",
                json!({"message": "Generating response..."}),
            ))
            .then(
                streamed_response(
                    &[
                        "## Next steps\n\n",
                        "Port **445** is open, so enumerate SMB shares:\n\n",
                        "```bash\nsmbclient -L //10.10.10.5 -N\n```\n\n",
                        "- check for *null sessions*\n",
                        "- look for writable shares\n",
                    ],
                    2.41,
                )
                .with_step_delay(120),
            )
            .event(RawEvent::new(
                "tool_detected",
                json!({"tool": "nmap", "summary": {"hosts": 1}}),
            ))
            .event(RawEvent::new(
                "response",
                json!({"type": "command", "data": {"success": true, "message": "Target set: 10.10.10.5"}}),
            ))
    }

    fn chunk_event(chunk: &str) -> RawEvent {
        RawEvent::new("response_chunk", json!({ "chunk": chunk }))
    }
}
