//! Outbound query submission.

use hg_gateway::Emitter;
use hg_protocol::OutboundEvent;

use crate::conversation::{ConversationLog, MessageId};

/// The pending text in the input box.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputField {
    value: String,
}

impl InputField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn push(&mut self, c: char) {
        self.value.push(c);
    }

    pub fn pop(&mut self) -> Option<char> {
        self.value.pop()
    }

    pub fn newline(&mut self) {
        self.value.push('\n');
    }

    pub fn set(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn clear(&mut self) {
        self.value.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Blank input; nothing appended, nothing sent.
    Empty,
    Sent(MessageId),
}

#[derive(Debug, Default)]
pub struct QueryDispatcher {
    input: InputField,
}

impl QueryDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&self) -> &InputField {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputField {
        &mut self.input
    }

    /// Submit the current input.
    ///
    /// Blank input is a silent no-op and keeps the field as typed. The
    /// emit is fire-and-forget: a failed emit is logged and the user
    /// message stays in the transcript.
    pub fn submit<E: Emitter>(&mut self, log: &mut ConversationLog, emitter: &mut E) -> Submission {
        let query = self.input.value().trim().to_string();
        if query.is_empty() {
            return Submission::Empty;
        }

        let id = log.append_user(&query);
        match emitter.emit(OutboundEvent::query(query.as_str())) {
            Ok(()) => tracing::debug!(query = %preview(&query), "query sent"),
            Err(e) => tracing::warn!(error = %e, "failed to send query"),
        }
        self.input.clear();
        Submission::Sent(id)
    }

    /// Quick query: replace the input and submit it at once.
    pub fn submit_quick<E: Emitter>(
        &mut self,
        log: &mut ConversationLog,
        emitter: &mut E,
        query: &str,
    ) -> Submission {
        self.input.set(query);
        self.submit(log, emitter)
    }

    /// Quick command: put a command in the input for the user to complete.
    pub fn insert_command(&mut self, command: &str) {
        self.input.set(command);
    }
}

fn preview(s: &str) -> String {
    const MAX: usize = 50;
    match s.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use hg_gateway::MockEmitter;

    fn typed(text: &str) -> QueryDispatcher {
        let mut d = QueryDispatcher::new();
        d.input_mut().set(text);
        d
    }

    #[test]
    fn blank_input_is_noop() {
        for text in ["", "   ", "\n\t "] {
            let mut d = typed(text);
            let mut log = ConversationLog::new();
            let mut emitter = MockEmitter::new();
            assert_eq!(d.submit(&mut log, &mut emitter), Submission::Empty);
            assert!(log.is_empty());
            assert!(emitter.sent.is_empty());
        }
    }

    #[test]
    fn submit_trims_appends_and_emits() {
        let mut d = typed("  hello \n");
        let mut log = ConversationLog::new();
        let mut emitter = MockEmitter::new();

        let id = match d.submit(&mut log, &mut emitter) {
            Submission::Sent(id) => id,
            other => panic!("unexpected {other:?}"),
        };
        let msg = log.get(id).unwrap();
        assert_eq!(msg.role(), Role::User);
        assert_eq!(msg.content(), "hello");
        assert_eq!(emitter.sent, vec![OutboundEvent::query("hello")]);
        assert!(d.input().is_empty());
    }

    #[test]
    fn emit_failure_still_shows_message() {
        let mut d = typed("scan it");
        let mut log = ConversationLog::new();
        let mut emitter = MockEmitter::closed();

        assert!(matches!(d.submit(&mut log, &mut emitter), Submission::Sent(_)));
        assert_eq!(log.len(), 1);
        assert!(d.input().is_empty());
    }

    #[test]
    fn quick_query_submits() {
        let mut d = QueryDispatcher::new();
        let mut log = ConversationLog::new();
        let mut emitter = MockEmitter::new();
        d.submit_quick(&mut log, &mut emitter, "What ports are open?");
        assert_eq!(emitter.sent, vec![OutboundEvent::query("What ports are open?")]);
        assert_eq!(d.submit_quick(&mut log, &mut emitter, "  "), Submission::Empty);
        assert_eq!(emitter.sent.len(), 1);
    }

    #[test]
    fn insert_command_replaces_input() {
        let mut d = typed("half typed");
        d.insert_command("/target ");
        assert_eq!(d.input().value(), "/target ");
    }

    #[test]
    fn input_editing() {
        let mut input = InputField::new();
        input.push('a');
        input.newline();
        input.push('b');
        assert_eq!(input.value(), "a\nb");
        assert_eq!(input.pop(), Some('b'));
        assert_eq!(input.value(), "a\n");
    }

    #[test]
    fn preview_truncates_long_queries() {
        assert_eq!(preview("short"), "short");
        let long = "é".repeat(60);
        assert_eq!(preview(&long), format!("{}...", "é".repeat(50)));
    }
}
