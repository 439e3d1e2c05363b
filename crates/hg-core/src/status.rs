//! Connection and response status presentation.
//!
//! The presenter keeps only the last-known values; it is a translator from
//! inbound signals to what the status bar shows.

use hg_protocol::{CommandResult, ConfidenceLevel, Source};

use crate::conversation::{ConversationLog, MessageId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionPhase {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionPhase::Connecting => "connecting",
            ConnectionPhase::Connected => "connected",
            ConnectionPhase::Disconnected => "disconnected",
        }
    }
}

/// Semantic color of an indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Warning,
    Danger,
}

/// Last confidence reading, ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceIndicator {
    pub level: ConfidenceLevel,
    pub score: f64,
}

impl ConfidenceIndicator {
    pub fn new(level: ConfidenceLevel, score: f64) -> Self {
        Self { level, score }
    }

    /// Gauge fill, `score * 100` clamped to `0..=100`.
    pub fn width_percent(&self) -> u16 {
        if self.score.is_nan() {
            return 0;
        }
        (self.score * 100.0).round().clamp(0.0, 100.0) as u16
    }

    pub fn tone(&self) -> Tone {
        tone_for(&self.level)
    }
}

/// Unknown levels are treated as low confidence.
pub fn tone_for(level: &ConfidenceLevel) -> Tone {
    match level {
        ConfidenceLevel::High => Tone::Success,
        ConfidenceLevel::Medium => Tone::Warning,
        ConfidenceLevel::Low | ConfidenceLevel::Other(_) => Tone::Danger,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionState {
    pub phase: ConnectionPhase,
    pub status_line: String,
    pub confidence: Option<ConfidenceIndicator>,
    pub sources: Vec<Source>,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            phase: ConnectionPhase::Connecting,
            status_line: "Connecting...".to_string(),
            confidence: None,
            sources: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct StatusPresenter {
    state: ConnectionState,
}

impl StatusPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn on_connect(&mut self) {
        self.state.phase = ConnectionPhase::Connecting;
        self.state.status_line = "Connecting...".to_string();
    }

    pub fn on_connected(&mut self) {
        self.state.phase = ConnectionPhase::Connected;
        self.state.status_line = "Connected".to_string();
    }

    pub fn on_disconnect(&mut self) {
        self.state.phase = ConnectionPhase::Disconnected;
        self.state.status_line = "Disconnected".to_string();
    }

    pub fn on_status(&mut self, text: impl Into<String>) {
        self.state.status_line = text.into();
    }

    pub fn on_confidence(&mut self, level: ConfidenceLevel, score: f64) {
        self.state.confidence = Some(ConfidenceIndicator::new(level, score));
    }

    pub fn on_sources(&mut self, sources: Vec<Source>) {
        self.state.sources = sources;
    }

    pub fn on_tool_detected(&mut self, log: &mut ConversationLog, tool: &str) -> MessageId {
        log.append_system(&format!("🔧 Detected {tool} output!"))
    }

    pub fn on_command_result(
        &mut self,
        log: &mut ConversationLog,
        result: &CommandResult,
    ) -> MessageId {
        let glyph = if result.success { "✅" } else { "❌" };
        log.append_system(&format!("{glyph} {}", result.message))
    }
}
