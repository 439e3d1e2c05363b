//! The streaming-response state machine.
//!
//! ```text
//!            response_start
//!   Idle ───────────────────▶ Streaming ──┐ response_chunk
//!    ▲                          │   ▲     │
//!    │   response_end           │   └─────┘
//!    │   disconnect / timeout   │
//!    └──────────────────────────┘
//!            response_start while Streaming: abandon, then start again
//! ```
//!
//! At most one [`ResponseStream`] exists. Only this controller creates,
//! mutates or clears it.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversation::{ConversationLog, MessageId, MessageStatus, SinkContent};
use crate::render::ContentRenderer;

/// Notice appended under [`AnomalyPolicy::Strict`] when a response is cut
/// short by a new one.
pub const INTERRUPTED_NOTICE: &str = "⚠ Previous response was interrupted before completion";

/// How a `response_start` during an active stream is surfaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyPolicy {
    /// Abandon the old response and log it.
    #[default]
    Tolerant,
    /// Same, and leave a visible notice in the transcript.
    Strict,
}

/// An inbound event that does not fit the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolAnomaly {
    #[error("response_start received while a response was streaming")]
    StartWhileStreaming,
    #[error("response_chunk received while idle")]
    ChunkWhileIdle,
    #[error("response_end received while idle")]
    EndWhileIdle,
}

/// Outcome of one event applied to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Started {
        message: MessageId,
        /// Stream that was active when this one started, if any.
        abandoned: Option<MessageId>,
    },
    Appended {
        message: MessageId,
        len: usize,
        /// False when the renderer refused the text and it is shown raw.
        rendered: bool,
    },
    /// Empty or absent chunk.
    Skipped,
    Finished {
        message: MessageId,
        elapsed: Duration,
    },
    Abandoned {
        message: MessageId,
    },
    TimedOut {
        message: MessageId,
    },
    Ignored(ProtocolAnomaly),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Streaming(MessageId),
}

/// The in-flight assistant response.
#[derive(Debug)]
pub struct ResponseStream {
    target: MessageId,
    accumulated: String,
    started_at: Instant,
    last_activity: Instant,
}

impl ResponseStream {
    pub fn target(&self) -> MessageId {
        self.target
    }

    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }
}

pub struct ResponseStreamController<R> {
    active: Option<ResponseStream>,
    renderer: R,
    policy: AnomalyPolicy,
    timeout: Option<Duration>,
}

impl<R: ContentRenderer> ResponseStreamController<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            active: None,
            renderer,
            policy: AnomalyPolicy::default(),
            timeout: None,
        }
    }

    pub fn with_policy(mut self, policy: AnomalyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Abandon streams that see no start or chunk for this long.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn set_policy(&mut self, policy: AnomalyPolicy) {
        self.policy = policy;
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    pub fn policy(&self) -> AnomalyPolicy {
        self.policy
    }

    pub fn state(&self) -> StreamState {
        match &self.active {
            Some(stream) => StreamState::Streaming(stream.target),
            None => StreamState::Idle,
        }
    }

    pub fn active(&self) -> Option<&ResponseStream> {
        self.active.as_ref()
    }

    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    /// `response_start`: open a new assistant message and bind it.
    pub fn start(&mut self, log: &mut ConversationLog, now: Instant) -> Transition {
        let abandoned = self.abandon(log);
        if let Some(old) = abandoned {
            tracing::warn!(
                msg_id = old.0,
                anomaly = %ProtocolAnomaly::StartWhileStreaming,
                "abandoning unfinished response"
            );
            if self.policy == AnomalyPolicy::Strict {
                log.append_system(INTERRUPTED_NOTICE);
            }
        }

        let target = log.append_assistant_placeholder();
        self.active = Some(ResponseStream {
            target,
            accumulated: String::new(),
            started_at: now,
            last_activity: now,
        });
        tracing::debug!(msg_id = target.0, "response started");
        Transition::Started {
            message: target,
            abandoned,
        }
    }

    /// `response_chunk`: append and re-render the whole accumulated text.
    pub fn chunk(
        &mut self,
        log: &mut ConversationLog,
        text: Option<&str>,
        now: Instant,
    ) -> Transition {
        let Some(stream) = self.active.as_mut() else {
            tracing::warn!(anomaly = %ProtocolAnomaly::ChunkWhileIdle, "dropping chunk");
            return Transition::Ignored(ProtocolAnomaly::ChunkWhileIdle);
        };
        let text = match text {
            Some(t) if !t.is_empty() => t,
            _ => return Transition::Skipped,
        };

        stream.accumulated.push_str(text);
        stream.last_activity = now;

        let (content, rendered) = match self.renderer.render(&stream.accumulated) {
            Ok(content) => (SinkContent::Rendered(content), true),
            Err(e) => {
                tracing::warn!(error = %e, msg_id = stream.target.0, "render failed, showing raw text");
                (SinkContent::Raw(stream.accumulated.clone()), false)
            }
        };

        let target = stream.target;
        let len = stream.accumulated.len();
        if let Some(message) = log.get_mut(target) {
            message.set_content(stream.accumulated.clone());
            message.sink_mut().write(content);
        }
        log.request_scroll();

        Transition::Appended {
            message: target,
            len,
            rendered,
        }
    }

    /// `response_end`: finalize the message and return to Idle.
    ///
    /// `server_secs` is the duration reported by the service; without it
    /// the local time since `response_start` is used.
    pub fn end(
        &mut self,
        log: &mut ConversationLog,
        server_secs: Option<f64>,
        now: Instant,
    ) -> Transition {
        let Some(stream) = self.active.take() else {
            tracing::warn!(anomaly = %ProtocolAnomaly::EndWhileIdle, "dropping response_end");
            return Transition::Ignored(ProtocolAnomaly::EndWhileIdle);
        };

        if let Some(message) = log.get_mut(stream.target) {
            message.set_status(MessageStatus::Complete);
        }
        let elapsed = server_secs
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or_else(|| now.saturating_duration_since(stream.started_at));

        tracing::debug!(
            msg_id = stream.target.0,
            bytes = stream.accumulated.len(),
            secs = elapsed.as_secs_f64(),
            "response finished"
        );
        Transition::Finished {
            message: stream.target,
            elapsed,
        }
    }

    /// Connection lost: drop the stream, keep what was rendered.
    pub fn disconnect(&mut self, log: &mut ConversationLog) -> Option<Transition> {
        let message = self.abandon(log)?;
        tracing::info!(msg_id = message.0, "response abandoned on disconnect");
        Some(Transition::Abandoned { message })
    }

    /// Abandon a stream idle for longer than the configured timeout.
    pub fn check_timeout(&mut self, log: &mut ConversationLog, now: Instant) -> Option<Transition> {
        let timeout = self.timeout?;
        let last = self.active.as_ref()?.last_activity;
        if now.saturating_duration_since(last) < timeout {
            return None;
        }
        let message = self.abandon(log)?;
        tracing::warn!(
            msg_id = message.0,
            timeout_secs = timeout.as_secs_f64(),
            "response timed out"
        );
        Some(Transition::TimedOut { message })
    }

    fn abandon(&mut self, log: &mut ConversationLog) -> Option<MessageId> {
        let stream = self.active.take()?;
        if let Some(message) = log.get_mut(stream.target) {
            message.set_status(MessageStatus::Abandoned);
        }
        Some(stream.target)
    }
}

/// Status line shown when a response completes.
pub fn completion_status(elapsed: Duration) -> String {
    format!("Response generated in {:.2}s", elapsed.as_secs_f64())
}
