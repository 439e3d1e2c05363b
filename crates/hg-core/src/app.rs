//! The interactive event loop.
//!
//! One task owns the session and `select!`s over gateway events, terminal
//! input and a housekeeping tick. Each branch runs to completion before the
//! next event is taken, so handlers never interleave.

use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::{Stream, StreamExt};
use hg_gateway::{Emitter, RawEvent};
use ratatui::DefaultTerminal;

use crate::display::{draw, ViewState};
use crate::palette::Palette;
use crate::render::ContentRenderer;
use crate::session::Session;

const TICK: Duration = Duration::from_millis(250);
const PAGE: u16 = 10;

/// Function-key shortcuts: the key, the text, and whether to send it
/// immediately or leave it in the input for completion.
const QUICK_COMMANDS: &[(u8, &str, bool)] = &[
    (2, "/target ", false),
    (3, "/ports ", false),
    (4, "/status", true),
    (5, "/creds ", false),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Continue,
    Quit,
}

pub fn handle_key<E: Emitter, R: ContentRenderer>(
    session: &mut Session<E, R>,
    view: &mut ViewState,
    key: KeyEvent,
) -> KeyOutcome {
    if key.kind != KeyEventKind::Press {
        return KeyOutcome::Continue;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Esc => return KeyOutcome::Quit,
        KeyCode::Char('c') if ctrl => return KeyOutcome::Quit,
        KeyCode::Enter if key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) => {
            session.input_mut().newline();
        }
        KeyCode::Enter => {
            session.submit();
        }
        KeyCode::Backspace => {
            session.input_mut().pop();
        }
        KeyCode::PageUp => view.scroll_up(PAGE),
        KeyCode::PageDown => view.scroll_down(PAGE),
        KeyCode::F(n) => {
            if let Some((_, text, send)) = QUICK_COMMANDS.iter().find(|(f, _, _)| *f == n) {
                if *send {
                    session.submit_quick(text);
                } else {
                    session.insert_command(text);
                }
            }
        }
        KeyCode::Char(c) if !ctrl => session.input_mut().push(c),
        _ => {}
    }
    KeyOutcome::Continue
}

/// Run the UI until the user quits. The terminal is restored on every exit
/// path, including errors.
pub async fn run<E, R, S>(session: &mut Session<E, R>, events: S, palette: Palette) -> io::Result<()>
where
    E: Emitter,
    R: ContentRenderer,
    S: Stream<Item = RawEvent>,
{
    let mut terminal = ratatui::try_init()?;
    let result = event_loop(&mut terminal, session, events, &palette).await;
    ratatui::restore();
    result
}

async fn event_loop<E, R, S>(
    terminal: &mut DefaultTerminal,
    session: &mut Session<E, R>,
    events: S,
    palette: &Palette,
) -> io::Result<()>
where
    E: Emitter,
    R: ContentRenderer,
    S: Stream<Item = RawEvent>,
{
    futures::pin_mut!(events);
    let mut input = EventStream::new();
    let mut ticker = tokio::time::interval(TICK);
    let mut view = ViewState::new();
    let mut gateway_open = true;

    loop {
        terminal.draw(|frame| draw(frame, session, &mut view, palette))?;

        tokio::select! {
            event = events.next(), if gateway_open => match event {
                Some(raw) => {
                    session.handle_raw(&raw, Instant::now());
                }
                None => {
                    tracing::info!("gateway stream ended");
                    gateway_open = false;
                }
            },
            terminal_event = input.next() => match terminal_event {
                Some(Ok(Event::Key(key))) => {
                    if handle_key(session, &mut view, key) == KeyOutcome::Quit {
                        return Ok(());
                    }
                }
                // Resize and the rest only need a redraw.
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
                None => return Ok(()),
            },
            _ = ticker.tick() => {
                session.tick(Instant::now());
            }
        }
    }
}
