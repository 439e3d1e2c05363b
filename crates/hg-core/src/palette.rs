//! Terminal colors with NO_COLOR support.

use ratatui::style::{Color, Modifier, Style};

use crate::conversation::Role;
use crate::status::{ConnectionPhase, Tone};

/// Check if color output is enabled (respects `NO_COLOR` env var).
pub fn color_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    enabled: bool,
}

impl Default for Palette {
    fn default() -> Self {
        Self::new()
    }
}

impl Palette {
    pub fn new() -> Self {
        Self {
            enabled: color_enabled(),
        }
    }

    /// Colors unless disabled here or by `NO_COLOR`.
    pub fn with_colors(colors: bool) -> Self {
        Self {
            enabled: colors && color_enabled(),
        }
    }

    /// Create a palette with colors explicitly enabled (for tests).
    pub fn force_enabled() -> Self {
        Self { enabled: true }
    }

    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn fg(&self, color: Color) -> Style {
        if self.enabled {
            Style::new().fg(color)
        } else {
            Style::new()
        }
    }

    pub fn tone(&self, tone: Tone) -> Style {
        match tone {
            Tone::Success => self.fg(Color::Green),
            Tone::Warning => self.fg(Color::Yellow),
            Tone::Danger => self.fg(Color::Red),
        }
    }

    pub fn role(&self, role: Role) -> Style {
        let base = match role {
            Role::User => self.fg(Color::Cyan),
            Role::Assistant => self.fg(Color::Green),
            Role::System => self.fg(Color::Yellow),
        };
        base.add_modifier(Modifier::BOLD)
    }

    pub fn phase(&self, phase: ConnectionPhase) -> Style {
        match phase {
            ConnectionPhase::Connecting => self.tone(Tone::Warning),
            ConnectionPhase::Connected => self.tone(Tone::Success),
            ConnectionPhase::Disconnected => self.tone(Tone::Danger),
        }
    }

    pub fn dim(&self) -> Style {
        if self.enabled {
            Style::new().add_modifier(Modifier::DIM)
        } else {
            Style::new()
        }
    }
}
