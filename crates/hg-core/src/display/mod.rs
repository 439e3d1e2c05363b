//! Terminal rendering of a session.
//!
//! ```text
//! ┌ transcript ────────────────────────────┐
//! │ You:                                   │
//! │ scan 10.10.10.5                        │
//! │ HackGPT:                               │
//! │ ...                                    │
//! └────────────────────────────────────────┘
//!  ● connected │ Response generated in 2.41s │ 2 sources
//!  Confidence  [█████████  HIGH 87%          ]
//! ┌ Query ─────────────────────────────────┐
//! └────────────────────────────────────────┘
//! ```

pub mod testing;

use hg_gateway::Emitter;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Wrap};
use ratatui::Frame;

use crate::conversation::{ConversationLog, Message, MessageStatus, SinkContent};
use crate::palette::Palette;
use crate::render::ContentRenderer;
use crate::session::Session;
use crate::status::ConnectionState;

const CONFIDENCE_LABEL: &str = " Confidence ";
const MAX_INPUT_LINES: u16 = 6;

/// Transcript scroll position.
///
/// `scroll_back` counts lines above the bottom. Any new scroll request from
/// the log snaps back to the newest content.
#[derive(Debug, Default, Clone)]
pub struct ViewState {
    scroll_back: u16,
    seen_scroll_requests: u64,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scroll_back(&self) -> u16 {
        self.scroll_back
    }

    pub fn sync(&mut self, log: &ConversationLog) {
        if log.scroll_requests() != self.seen_scroll_requests {
            self.seen_scroll_requests = log.scroll_requests();
            self.scroll_back = 0;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll_back = self.scroll_back.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll_back = self.scroll_back.saturating_sub(lines);
    }
}

/// All transcript lines, oldest first.
pub fn transcript_lines(log: &ConversationLog, palette: &Palette) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for message in log.iter() {
        lines.push(header(message, palette));
        lines.extend(body(message, palette));
        lines.push(Line::default());
    }
    lines
}

fn header(message: &Message, palette: &Palette) -> Line<'static> {
    let mut spans = vec![Span::styled(
        format!("{}:", message.role().label()),
        palette.role(message.role()),
    )];
    if message.status() == MessageStatus::Abandoned {
        spans.push(Span::styled(" (interrupted)", palette.dim()));
    }
    Line::from(spans)
}

fn body(message: &Message, palette: &Palette) -> Vec<Line<'static>> {
    match message.sink().content() {
        SinkContent::Empty if message.status() == MessageStatus::Streaming => {
            vec![Line::styled("...", palette.dim())]
        }
        SinkContent::Empty => Vec::new(),
        SinkContent::Escaped(s) | SinkContent::Inline(s) | SinkContent::Raw(s) => {
            s.lines().map(|l| Line::raw(l.to_string())).collect()
        }
        SinkContent::Rendered(rendered) if palette.is_enabled() => rendered.text().lines.clone(),
        SinkContent::Rendered(rendered) => rendered
            .text()
            .lines
            .iter()
            .map(|line| {
                let spans: Vec<Span<'static>> = line
                    .spans
                    .iter()
                    .map(|s| Span::raw(s.content.clone()))
                    .collect();
                Line::from(spans)
            })
            .collect(),
    }
}

pub fn status_line(state: &ConnectionState, palette: &Palette) -> Line<'static> {
    let mut spans = vec![
        Span::styled(format!(" ● {}", state.phase.label()), palette.phase(state.phase)),
        Span::styled(" │ ", palette.dim()),
        Span::raw(state.status_line.clone()),
    ];
    match state.sources.len() {
        0 => {}
        1 => spans.push(Span::styled(" │ 1 source", palette.dim())),
        n => spans.push(Span::styled(format!(" │ {n} sources"), palette.dim())),
    }
    Line::from(spans)
}

/// Draw the whole session into the frame.
pub fn draw<E: Emitter, R: ContentRenderer>(
    frame: &mut Frame,
    session: &Session<E, R>,
    view: &mut ViewState,
    palette: &Palette,
) {
    view.sync(session.log());

    let input_lines = (session.input().value().split('\n').count() as u16).clamp(1, MAX_INPUT_LINES);
    let [transcript_area, status_area, gauge_area, input_area] = Layout::vertical([
        Constraint::Min(3),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(input_lines + 2),
    ])
    .areas(frame.area());

    draw_transcript(frame, transcript_area, session.log(), view, palette);
    frame.render_widget(
        Paragraph::new(status_line(session.status(), palette)),
        status_area,
    );
    draw_confidence(frame, gauge_area, session.status(), palette);
    draw_input(frame, input_area, session.input().value(), input_lines);
}

fn draw_transcript(
    frame: &mut Frame,
    area: Rect,
    log: &ConversationLog,
    view: &mut ViewState,
    palette: &Palette,
) {
    let block = Block::default().borders(Borders::ALL).title(" HackGPT ");
    let inner = block.inner(area);
    let (lines, total) = transcript_tail(transcript_lines(log, palette), inner.width);
    let paragraph = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });

    let max_back = total.saturating_sub(inner.height);
    view.scroll_back = view.scroll_back.min(max_back);
    let offset = max_back - view.scroll_back;

    frame.render_widget(paragraph.scroll((offset, 0)).block(block), area);
}

/// The newest lines whose wrapped height still fits a `u16` scroll offset,
/// with that height. The last line is always kept.
fn transcript_tail(mut lines: Vec<Line<'static>>, width: u16) -> (Vec<Line<'static>>, u16) {
    let budget = usize::from(u16::MAX);
    let mut total = 0usize;
    let mut start = lines.len();
    for (i, line) in lines.iter().enumerate().rev() {
        let height = Paragraph::new(line.clone())
            .wrap(Wrap { trim: false })
            .line_count(width);
        if start < lines.len() && total + height > budget {
            break;
        }
        total += height;
        start = i;
    }
    let tail = lines.split_off(start);
    (tail, u16::try_from(total).unwrap_or(u16::MAX))
}

fn draw_confidence(frame: &mut Frame, area: Rect, state: &ConnectionState, palette: &Palette) {
    let [label_area, gauge_area] = Layout::horizontal([
        Constraint::Length(CONFIDENCE_LABEL.len() as u16),
        Constraint::Min(1),
    ])
    .areas(area);
    frame.render_widget(Paragraph::new(CONFIDENCE_LABEL).style(palette.dim()), label_area);

    match &state.confidence {
        Some(confidence) => {
            let percent = confidence.width_percent();
            let gauge = Gauge::default()
                .gauge_style(palette.tone(confidence.tone()))
                .percent(percent)
                .label(format!("{} {percent}%", confidence.level.as_str()));
            frame.render_widget(gauge, gauge_area);
        }
        None => frame.render_widget(Paragraph::new("-").style(palette.dim()), gauge_area),
    }
}

fn draw_input(frame: &mut Frame, area: Rect, value: &str, visible_lines: u16) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Query (Enter send, Shift+Enter newline, Esc quit) ");
    let inner = block.inner(area);

    let lines: Vec<&str> = value.split('\n').collect();
    let first_visible = lines.len().saturating_sub(visible_lines as usize);
    let shown = lines[first_visible..].join("\n");
    frame.render_widget(Paragraph::new(shown).block(block), area);

    let last = lines.last().copied().unwrap_or("");
    let row = (lines.len() - first_visible).saturating_sub(1) as u16;
    let col = (last.chars().count() as u16).min(inner.width.saturating_sub(1));
    frame.set_cursor_position((inner.x + col, inner.y + row));
}
