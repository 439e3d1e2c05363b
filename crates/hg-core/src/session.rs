//! One client session: everything a connection's handlers touch.
//!
//! All handlers take `&mut Session` and run to completion, so events are
//! applied strictly one at a time in delivery order.

use std::time::Instant;

use hg_gateway::Emitter;
use hg_protocol::{InboundEvent, RawEvent, ResponsePayload};

use crate::config::StreamConfig;
use crate::conversation::{ConversationLog, MessageId};
use crate::dispatch::{InputField, QueryDispatcher, Submission};
use crate::render::ContentRenderer;
use crate::status::{ConnectionState, StatusPresenter};
use crate::stream::{completion_status, ResponseStreamController, Transition};

pub const TIMED_OUT_STATUS: &str = "Response timed out";

pub fn error_message(text: &str) -> String {
    format!("❌ Error: {text}")
}

pub struct Session<E, R> {
    log: ConversationLog,
    stream: ResponseStreamController<R>,
    status: StatusPresenter,
    dispatcher: QueryDispatcher,
    emitter: E,
}

impl<E: Emitter, R: ContentRenderer> Session<E, R> {
    pub fn new(emitter: E, renderer: R) -> Self {
        Self {
            log: ConversationLog::new(),
            stream: ResponseStreamController::new(renderer),
            status: StatusPresenter::new(),
            dispatcher: QueryDispatcher::new(),
            emitter,
        }
    }

    /// Apply anomaly policy and stream timeout.
    pub fn configure(mut self, config: &StreamConfig) -> Self {
        self.stream.set_policy(config.anomaly_policy);
        self.stream.set_timeout(config.timeout());
        self
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn status(&self) -> &ConnectionState {
        self.status.state()
    }

    pub fn stream(&self) -> &ResponseStreamController<R> {
        &self.stream
    }

    pub fn input(&self) -> &InputField {
        self.dispatcher.input()
    }

    pub fn input_mut(&mut self) -> &mut InputField {
        self.dispatcher.input_mut()
    }

    pub fn emitter(&self) -> &E {
        &self.emitter
    }

    /// Decode and apply one event from the connection. Unknown and
    /// malformed events are logged and dropped.
    pub fn handle_raw(&mut self, raw: &RawEvent, now: Instant) -> Option<Transition> {
        tracing::debug!(event = %raw.name, payload = %raw.payload, "inbound");
        match InboundEvent::from_raw(raw) {
            Ok(event) => self.handle(event, now),
            Err(e) => {
                tracing::warn!(error = %e, "dropping inbound event");
                None
            }
        }
    }

    /// Apply one validated event. Returns the stream transition it caused.
    pub fn handle(&mut self, event: InboundEvent, now: Instant) -> Option<Transition> {
        match event {
            InboundEvent::Connect => {
                self.status.on_connect();
                None
            }
            InboundEvent::Connected(payload) => {
                tracing::info!(session = ?payload.session, "connected");
                self.status.on_connected();
                None
            }
            InboundEvent::Disconnect => {
                tracing::info!("disconnected");
                self.status.on_disconnect();
                self.stream.disconnect(&mut self.log)
            }
            InboundEvent::Status(p) => {
                self.status.on_status(p.message);
                None
            }
            InboundEvent::Confidence(p) => {
                self.status.on_confidence(p.level, p.score);
                None
            }
            InboundEvent::ToolDetected(p) => {
                tracing::debug!(tool = %p.tool, summary = %p.summary, "tool detected");
                self.status.on_tool_detected(&mut self.log, &p.tool);
                None
            }
            InboundEvent::Sources(p) => {
                self.status.on_sources(p.sources);
                None
            }
            InboundEvent::ResponseStart => Some(self.stream.start(&mut self.log, now)),
            InboundEvent::ResponseChunk(p) => {
                Some(self.stream.chunk(&mut self.log, p.chunk.as_deref(), now))
            }
            InboundEvent::ResponseEnd(p) => {
                let transition = self.stream.end(&mut self.log, p.time, now);
                if let Transition::Finished { elapsed, .. } = &transition {
                    self.status.on_status(completion_status(*elapsed));
                }
                Some(transition)
            }
            InboundEvent::Response(ResponsePayload::Command(result)) => {
                self.status.on_command_result(&mut self.log, &result);
                None
            }
            InboundEvent::Response(ResponsePayload::Other { kind }) => {
                tracing::debug!(%kind, "ignoring response");
                None
            }
            InboundEvent::Error(p) => {
                tracing::warn!(error = %p.text, "remote error");
                self.log.append_system(&error_message(&p.text));
                None
            }
        }
    }

    pub fn submit(&mut self) -> Submission {
        self.dispatcher.submit(&mut self.log, &mut self.emitter)
    }

    pub fn submit_quick(&mut self, query: &str) -> Submission {
        self.dispatcher
            .submit_quick(&mut self.log, &mut self.emitter, query)
    }

    pub fn insert_command(&mut self, command: &str) {
        self.dispatcher.insert_command(command);
    }

    /// Periodic housekeeping: enforces the stream timeout.
    pub fn tick(&mut self, now: Instant) -> Option<Transition> {
        let transition = self.stream.check_timeout(&mut self.log, now)?;
        self.status.on_status(TIMED_OUT_STATUS);
        Some(transition)
    }

    /// Id of the message the active stream writes into.
    pub fn streaming_message(&self) -> Option<MessageId> {
        self.stream.active().map(|s| s.target())
    }
}
