//! The conversation transcript.
//!
//! An append-only sequence of messages. Each message owns the sink its
//! visible representation is written into; sinks are created with their
//! message and cannot be cloned or moved between messages.

use crate::render::{escape_plain, RenderedContent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "HackGPT",
            Role::System => "System",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    /// User and system messages never change after creation.
    Fixed,
    /// Bound to the active response stream.
    Streaming,
    Complete,
    /// The stream ended without `response_end`; content is whatever was
    /// rendered last.
    Abandoned,
}

/// What a sink currently displays.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkContent {
    Empty,
    /// Untrusted text, escaped, never interpreted.
    Escaped(String),
    /// Locally built text; may carry inline glyphs.
    Inline(String),
    Rendered(RenderedContent),
    /// Renderer refused the text; shown verbatim.
    Raw(String),
}

#[derive(Debug)]
pub struct MessageSink {
    content: SinkContent,
    revision: u64,
}

impl MessageSink {
    fn new(content: SinkContent) -> Self {
        Self {
            content,
            revision: 0,
        }
    }

    pub fn content(&self) -> &SinkContent {
        &self.content
    }

    /// Number of writes since creation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn write(&mut self, content: SinkContent) {
        self.content = content;
        self.revision += 1;
    }

    /// Unstyled text of the current content.
    pub fn display_text(&self) -> String {
        match &self.content {
            SinkContent::Empty => String::new(),
            SinkContent::Escaped(s) | SinkContent::Inline(s) | SinkContent::Raw(s) => s.clone(),
            SinkContent::Rendered(r) => r.plain_text(),
        }
    }
}

#[derive(Debug)]
pub struct Message {
    id: MessageId,
    role: Role,
    content: String,
    status: MessageStatus,
    sink: MessageSink,
}

impl Message {
    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn status(&self) -> MessageStatus {
        self.status
    }

    pub fn sink(&self) -> &MessageSink {
        &self.sink
    }

    pub(crate) fn set_content(&mut self, content: String) {
        self.content = content;
    }

    pub(crate) fn set_status(&mut self, status: MessageStatus) {
        self.status = status;
    }

    pub(crate) fn sink_mut(&mut self) -> &mut MessageSink {
        &mut self.sink
    }
}

#[derive(Debug, Default)]
pub struct ConversationLog {
    messages: Vec<Message>,
    scroll_requests: u64,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the user's own text. It is displayed escaped, never rendered.
    pub fn append_user(&mut self, text: &str) -> MessageId {
        let sink = MessageSink::new(SinkContent::Escaped(escape_plain(text)));
        self.push(Role::User, text.to_string(), MessageStatus::Fixed, sink)
    }

    /// Append a locally constructed notice.
    pub fn append_system(&mut self, text: &str) -> MessageId {
        let sink = MessageSink::new(SinkContent::Inline(text.to_string()));
        self.push(Role::System, text.to_string(), MessageStatus::Fixed, sink)
    }

    /// Empty assistant entry for a new response stream.
    pub(crate) fn append_assistant_placeholder(&mut self) -> MessageId {
        let sink = MessageSink::new(SinkContent::Empty);
        self.push(
            Role::Assistant,
            String::new(),
            MessageStatus::Streaming,
            sink,
        )
    }

    fn push(
        &mut self,
        role: Role,
        content: String,
        status: MessageStatus,
        sink: MessageSink,
    ) -> MessageId {
        let id = MessageId(self.messages.len() as u64);
        self.messages.push(Message {
            id,
            role,
            content,
            status,
            sink,
        });
        self.request_scroll();
        id
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.get(id.0 as usize)
    }

    pub(crate) fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.get_mut(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Ask the view to bring the newest content into sight.
    pub(crate) fn request_scroll(&mut self) {
        self.scroll_requests += 1;
    }

    /// Monotonic counter of scroll requests; views compare it with the
    /// last value they acted on.
    pub fn scroll_requests(&self) -> u64 {
        self.scroll_requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_starts_empty() {
        let log = ConversationLog::new();
        assert!(log.is_empty());
        assert_eq!(log.scroll_requests(), 0);
    }

    #[test]
    fn user_message_is_escaped_not_rendered() {
        let mut log = ConversationLog::new();
        let id = log.append_user("**not bold** \x1b[2J");
        let msg = log.get(id).unwrap();

        assert_eq!(msg.role(), Role::User);
        assert_eq!(msg.content(), "**not bold** \x1b[2J");
        assert_eq!(msg.status(), MessageStatus::Fixed);
        assert_eq!(
            msg.sink().content(),
            &SinkContent::Escaped("**not bold** \\u{1b}[2J".to_string())
        );
    }

    #[test]
    fn system_message_inline() {
        let mut log = ConversationLog::new();
        let id = log.append_system("🔧 Detected nmap output!");
        let msg = log.get(id).unwrap();
        assert_eq!(msg.role(), Role::System);
        assert_eq!(msg.sink().display_text(), "🔧 Detected nmap output!");
    }

    #[test]
    fn assistant_placeholder_starts_empty() {
        let mut log = ConversationLog::new();
        let id = log.append_assistant_placeholder();
        let msg = log.get(id).unwrap();
        assert_eq!(msg.role(), Role::Assistant);
        assert_eq!(msg.content(), "");
        assert_eq!(msg.status(), MessageStatus::Streaming);
        assert_eq!(msg.sink().content(), &SinkContent::Empty);
        assert_eq!(msg.sink().revision(), 0);
    }

    #[test]
    fn ids_follow_append_order() {
        let mut log = ConversationLog::new();
        let a = log.append_user("a");
        let b = log.append_system("b");
        let c = log.append_assistant_placeholder();
        assert!(a < b && b < c);
        let roles: Vec<Role> = log.iter().map(|m| m.role()).collect();
        assert_eq!(roles, vec![Role::User, Role::System, Role::Assistant]);
        assert_eq!(log.last().unwrap().id(), c);
    }

    #[test]
    fn every_append_requests_scroll() {
        let mut log = ConversationLog::new();
        log.append_user("a");
        log.append_system("b");
        assert_eq!(log.scroll_requests(), 2);
    }

    #[test]
    fn sink_write_bumps_revision() {
        let mut log = ConversationLog::new();
        let id = log.append_assistant_placeholder();
        let msg = log.get_mut(id).unwrap();
        msg.sink_mut().write(SinkContent::Raw("x".to_string()));
        msg.sink_mut().write(SinkContent::Raw("xy".to_string()));
        assert_eq!(log.get(id).unwrap().sink().revision(), 2);
        assert_eq!(log.get(id).unwrap().sink().display_text(), "xy");
    }

    #[test]
    fn unknown_id_is_none() {
        let log = ConversationLog::new();
        assert!(log.get(MessageId(3)).is_none());
    }
}
