//! Testing harness for the terminal UI.
//!
//! Provides TestTui for driving a session and asserting on rendered output.

use std::time::Instant;

use crossterm::event::KeyEvent;
use hg_gateway::{MockEmitter, MockScript, RawEvent};
use ratatui::backend::TestBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::Terminal;

use super::{draw, ViewState};
use crate::app::{handle_key, KeyOutcome};
use crate::palette::Palette;
use crate::render::MarkdownRenderer;
use crate::session::Session;

/// Test harness for the terminal UI.
pub struct TestTui {
    pub session: Session<MockEmitter, MarkdownRenderer>,
    pub view: ViewState,
    palette: Palette,
    terminal: Terminal<TestBackend>,
}

impl TestTui {
    /// Create a new test TUI with the given dimensions.
    pub fn new(width: u16, height: u16) -> Self {
        let backend = TestBackend::new(width, height);
        let terminal = Terminal::new(backend).expect("failed to create terminal");

        Self {
            session: Session::new(MockEmitter::new(), MarkdownRenderer::default()),
            view: ViewState::new(),
            palette: Palette::disabled(),
            terminal,
        }
    }

    /// Create a test TUI with default dimensions (80x24).
    pub fn default_size() -> Self {
        Self::new(80, 24)
    }

    /// Apply an inbound event to the session.
    pub fn apply(&mut self, event: &RawEvent) {
        self.session.handle_raw(event, Instant::now());
    }

    /// Apply multiple events.
    pub fn apply_all(&mut self, events: &[RawEvent]) {
        for event in events {
            self.apply(event);
        }
    }

    /// Apply every event of a script, ignoring its timing.
    pub fn play(&mut self, script: &MockScript) {
        self.apply_all(&script.events());
    }

    pub fn press(&mut self, key: KeyEvent) -> KeyOutcome {
        handle_key(&mut self.session, &mut self.view, key)
    }

    /// Type text key by key; `\n` becomes Shift+Enter.
    pub fn type_input(&mut self, text: &str) {
        for c in text.chars() {
            match c {
                '\n' => self.press(keys::shift_enter()),
                c => self.press(keys::char(c)),
            };
        }
    }

    pub fn submit(&mut self) {
        self.press(keys::enter());
    }

    /// Render and return as string for assertions.
    pub fn render(&mut self) -> String {
        self.draw();
        buffer_to_string(self.terminal.backend().buffer())
    }

    /// Assert rendered output contains text.
    pub fn assert_contains(&mut self, expected: &str) {
        let rendered = self.render();
        assert!(
            rendered.contains(expected),
            "Expected to find '{}' in:\n{}",
            expected,
            rendered
        );
    }

    /// Assert rendered output does not contain text.
    pub fn assert_not_contains(&mut self, unexpected: &str) {
        let rendered = self.render();
        assert!(
            !rendered.contains(unexpected),
            "Expected NOT to find '{}' in:\n{}",
            unexpected,
            rendered
        );
    }

    /// Get the raw buffer for detailed inspection.
    pub fn buffer(&mut self) -> &Buffer {
        self.draw();
        self.terminal.backend().buffer()
    }

    /// Get the terminal area.
    pub fn area(&self) -> Rect {
        let size = self.terminal.size().unwrap_or_default();
        Rect::new(0, 0, size.width, size.height)
    }

    fn draw(&mut self) {
        let session = &self.session;
        let view = &mut self.view;
        let palette = &self.palette;
        self.terminal
            .draw(|frame| draw(frame, session, view, palette))
            .expect("failed to draw");
    }
}

/// Convert a buffer to a string representation.
fn buffer_to_string(buffer: &Buffer) -> String {
    let area = buffer.area;
    let mut result = String::new();

    for y in 0..area.height {
        for x in 0..area.width {
            if let Some(cell) = buffer.cell((x, y)) {
                result.push_str(cell.symbol());
            }
        }
        // Trim trailing spaces and add newline
        result = result.trim_end().to_string();
        result.push('\n');
    }

    while result.ends_with("\n\n") {
        result.pop();
    }

    result
}

/// Key event helpers for testing.
pub mod keys {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    pub fn enter() -> KeyEvent {
        KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)
    }

    pub fn shift_enter() -> KeyEvent {
        KeyEvent::new(KeyCode::Enter, KeyModifiers::SHIFT)
    }

    pub fn alt_enter() -> KeyEvent {
        KeyEvent::new(KeyCode::Enter, KeyModifiers::ALT)
    }

    pub fn esc() -> KeyEvent {
        KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)
    }

    pub fn backspace() -> KeyEvent {
        KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE)
    }

    pub fn page_up() -> KeyEvent {
        KeyEvent::new(KeyCode::PageUp, KeyModifiers::NONE)
    }

    pub fn page_down() -> KeyEvent {
        KeyEvent::new(KeyCode::PageDown, KeyModifiers::NONE)
    }

    pub fn f(n: u8) -> KeyEvent {
        KeyEvent::new(KeyCode::F(n), KeyModifiers::NONE)
    }

    pub fn char(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    pub fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }
}
