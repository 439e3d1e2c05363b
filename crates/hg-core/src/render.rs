//! Content rendering: assistant markdown into styled terminal text.
//!
//! Rendering is a pure, synchronous function from raw text to structured
//! content. It may refuse input; callers then show the raw text instead.

use ratatui::text::{Line, Span, Text};
use thiserror::Error;

/// Inputs above this size are shown raw instead of rendered.
pub const DEFAULT_MAX_BYTES: usize = 256 * 1024;

/// Structured content ready to be written into a message sink.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedContent(Text<'static>);

impl RenderedContent {
    pub fn new(text: Text<'static>) -> Self {
        Self(text)
    }

    pub fn text(&self) -> &Text<'static> {
        &self.0
    }

    /// Content without styling, one line per rendered line.
    pub fn plain_text(&self) -> String {
        self.0
            .lines
            .iter()
            .map(|line| {
                line.spans
                    .iter()
                    .map(|span| span.content.as_ref())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("content too large to render ({len} bytes, limit {limit})")]
    TooLarge { len: usize, limit: usize },
    #[error("control character U+{code:04X} at byte {offset}")]
    ControlCharacter { code: u32, offset: usize },
}

pub trait ContentRenderer {
    fn render(&self, raw: &str) -> Result<RenderedContent, RenderError>;
}

impl<R: ContentRenderer + ?Sized> ContentRenderer for Box<R> {
    fn render(&self, raw: &str) -> Result<RenderedContent, RenderError> {
        (**self).render(raw)
    }
}

/// Markdown (headings, emphasis, lists, fenced code) via `tui-markdown`.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    max_bytes: usize,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BYTES)
    }
}

impl MarkdownRenderer {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

impl ContentRenderer for MarkdownRenderer {
    fn render(&self, raw: &str) -> Result<RenderedContent, RenderError> {
        check_renderable(raw, self.max_bytes)?;
        let text = tui_markdown::from_str(raw);
        Ok(RenderedContent::new(into_owned(text)))
    }
}

/// Shows text as-is, line by line. Used when markdown is turned off.
#[derive(Debug, Clone)]
pub struct PlainRenderer {
    max_bytes: usize,
}

impl Default for PlainRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BYTES)
    }
}

impl PlainRenderer {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

impl ContentRenderer for PlainRenderer {
    fn render(&self, raw: &str) -> Result<RenderedContent, RenderError> {
        check_renderable(raw, self.max_bytes)?;
        Ok(RenderedContent::new(Text::raw(raw.to_string())))
    }
}

/// Characters that must never reach the terminal as structured output.
pub fn is_unsafe_control(c: char) -> bool {
    (c < ' ' && !matches!(c, '\t' | '\n' | '\r')) || c == '\u{7f}'
}

fn check_renderable(raw: &str, max_bytes: usize) -> Result<(), RenderError> {
    if raw.len() > max_bytes {
        return Err(RenderError::TooLarge {
            len: raw.len(),
            limit: max_bytes,
        });
    }
    if let Some((offset, c)) = raw.char_indices().find(|(_, c)| is_unsafe_control(*c)) {
        return Err(RenderError::ControlCharacter {
            code: c as u32,
            offset,
        });
    }
    Ok(())
}

/// Plain-text form of untrusted input: nothing is interpreted as markup and
/// control characters become visible `\u{..}` escapes.
pub fn escape_plain(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if is_unsafe_control(c) {
            out.extend(c.escape_unicode());
        } else {
            out.push(c);
        }
    }
    out
}

fn into_owned(text: Text<'_>) -> Text<'static> {
    let lines: Vec<Line<'static>> = text
        .lines
        .into_iter()
        .map(|line| {
            let spans: Vec<Span<'static>> = line
                .spans
                .into_iter()
                .map(|span| Span::styled(span.content.into_owned(), span.style))
                .collect();
            let mut owned = Line::from(spans).style(line.style);
            owned.alignment = line.alignment;
            owned
        })
        .collect();
    let mut owned = Text::from(lines).style(text.style);
    owned.alignment = text.alignment;
    owned
}
