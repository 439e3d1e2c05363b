//! End-to-end behavior of a session driven by raw connection events.

use std::time::{Duration, Instant};

use futures::StreamExt;
use hg_core::conversation::{MessageStatus, Role, SinkContent};
use hg_core::render::{ContentRenderer, MarkdownRenderer, PlainRenderer, RenderError, RenderedContent};
use hg_core::session::Session;
use hg_core::status::{ConnectionPhase, Tone};
use hg_core::stream::{ProtocolAnomaly, StreamState, Transition};
use hg_gateway::mock::{fixtures, mock_stream};
use hg_gateway::{MockEmitter, RawEvent};
use hg_protocol::OutboundEvent;
use serde_json::{json, Value};

/// Refuses everything, forcing the raw-text fallback.
struct FailingRenderer;

impl ContentRenderer for FailingRenderer {
    fn render(&self, raw: &str) -> Result<RenderedContent, RenderError> {
        Err(RenderError::TooLarge {
            len: raw.len(),
            limit: 0,
        })
    }
}

fn session() -> Session<MockEmitter, MarkdownRenderer> {
    Session::new(MockEmitter::new(), MarkdownRenderer::default())
}

fn feed<R: ContentRenderer>(s: &mut Session<MockEmitter, R>, events: &[RawEvent]) {
    for event in events {
        s.handle_raw(event, Instant::now());
    }
}

fn chunk(text: &str) -> RawEvent {
    RawEvent::new("response_chunk", json!({ "chunk": text }))
}

#[test]
fn final_content_is_ordered_concatenation() {
    let mut s = session();
    feed(
        &mut s,
        &[
            RawEvent::bare("response_start"),
            chunk("nmap "),
            RawEvent::new("response_chunk", json!({"chunk": ""})),
            chunk("-sV "),
            RawEvent::new("response_chunk", json!({})),
            RawEvent::new("response_chunk", json!({"chunk": null})),
            chunk("10.10.10.5"),
            RawEvent::new("response_end", json!({"time": 0.8})),
        ],
    );

    let assistant: Vec<_> = s.log().iter().filter(|m| m.role() == Role::Assistant).collect();
    assert_eq!(assistant.len(), 1);
    assert_eq!(assistant[0].content(), "nmap -sV 10.10.10.5");
    assert_eq!(assistant[0].status(), MessageStatus::Complete);
}

#[test]
fn chunk_after_end_does_not_mutate() {
    let mut s = session();
    feed(&mut s, &fixtures::streamed_response(&["done"], 1.0).events());
    let msg = s.log().last().unwrap();
    let (id, revision) = (msg.id(), msg.sink().revision());

    let t = s.handle_raw(&chunk(" and more"), Instant::now());
    assert_eq!(t, Some(Transition::Ignored(ProtocolAnomaly::ChunkWhileIdle)));

    let msg = s.log().get(id).unwrap();
    assert_eq!(msg.content(), "done");
    assert_eq!(msg.sink().revision(), revision);
    assert_eq!(s.log().len(), 1);
}

#[test]
fn at_most_one_stream_target() {
    let mut s = session();
    feed(&mut s, &[RawEvent::bare("response_start"), chunk("a")]);
    let first = s.streaming_message().unwrap();
    feed(&mut s, &[RawEvent::bare("response_start")]);
    let second = s.streaming_message().unwrap();

    assert_ne!(first, second);
    assert_eq!(s.stream().state(), StreamState::Streaming(second));
    let streaming = s
        .log()
        .iter()
        .filter(|m| m.status() == MessageStatus::Streaming)
        .count();
    assert_eq!(streaming, 1);
}

#[test]
fn blank_submissions_do_nothing() {
    let mut s = session();
    for text in ["", "   "] {
        s.input_mut().set(text);
        s.submit();
    }
    assert!(s.log().is_empty());
    assert!(s.emitter().sent.is_empty());
}

#[test]
fn submit_hello() {
    let mut s = session();
    s.input_mut().set("hello");
    s.submit();

    let users: Vec<_> = s.log().iter().filter(|m| m.role() == Role::User).collect();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].content(), "hello");
    assert_eq!(s.emitter().sent, vec![OutboundEvent::query("hello")]);
    assert_eq!(
        s.emitter().sent[0].to_envelope().data,
        json!({"query": "hello"})
    );
}

#[test]
fn confidence_readings() {
    let mut s = session();
    let reading = |s: &mut Session<MockEmitter, MarkdownRenderer>, level: &str, score: f64| {
        s.handle_raw(
            &RawEvent::new("confidence", json!({"level": level, "score": score})),
            Instant::now(),
        );
        let c = s.status().confidence.clone().unwrap();
        (c.width_percent(), c.tone())
    };

    assert_eq!(reading(&mut s, "HIGH", 0.87), (87, Tone::Success));
    assert_eq!(reading(&mut s, "LOW", 0.2), (20, Tone::Danger));
    assert_eq!(reading(&mut s, "WEIRD", 0.5), (50, Tone::Danger));
    assert_eq!(reading(&mut s, "MEDIUM", 0.6), (60, Tone::Warning));
}

#[test]
fn restart_keeps_first_message_unfinalized() {
    let mut s = session();
    feed(
        &mut s,
        &fixtures::restarted_response(&["first part"], &["second ", "answer"], 1.2).events(),
    );

    let assistant: Vec<_> = s.log().iter().filter(|m| m.role() == Role::Assistant).collect();
    assert_eq!(assistant.len(), 2);
    assert_eq!(assistant[0].content(), "first part");
    assert_eq!(assistant[0].status(), MessageStatus::Abandoned);
    assert_eq!(assistant[1].content(), "second answer");
    assert_eq!(assistant[1].status(), MessageStatus::Complete);
}

#[test]
fn strict_restart_adds_notice() {
    let mut s = Session::new(MockEmitter::new(), PlainRenderer::default()).configure(
        &hg_core::config::StreamConfig {
            anomaly_policy: hg_core::stream::AnomalyPolicy::Strict,
            timeout_secs: 0,
        },
    );
    feed(
        &mut s,
        &fixtures::restarted_response(&["x"], &["y"], 1.0).events(),
    );
    let roles: Vec<Role> = s.log().iter().map(|m| m.role()).collect();
    assert_eq!(roles, vec![Role::Assistant, Role::System, Role::Assistant]);
}

#[test]
fn disconnect_mid_stream() {
    let mut s = session();
    feed(&mut s, &fixtures::handshake().events());
    feed(
        &mut s,
        &fixtures::disconnect_mid_stream(&["Port 80 ", "is"], " open").events(),
    );

    assert_eq!(s.status().phase, ConnectionPhase::Disconnected);
    assert_eq!(s.status().status_line, "Disconnected");
    assert_eq!(s.stream().state(), StreamState::Idle);

    let msg = s.log().last().unwrap();
    assert_eq!(msg.content(), "Port 80 is");
    assert_eq!(msg.sink().display_text(), "Port 80 is");
    assert_eq!(msg.status(), MessageStatus::Abandoned);
}

#[test]
fn render_failure_shows_full_raw_text() {
    let mut s = Session::new(MockEmitter::new(), FailingRenderer);
    let chunks = ["<script>", "alert(1)", "</script> **and** `more`"];
    let mut events = vec![RawEvent::bare("response_start")];
    events.extend(chunks.iter().map(|c| chunk(c)));
    feed(&mut s, &events);

    let msg = s.log().last().unwrap();
    assert_eq!(
        msg.sink().content(),
        &SinkContent::Raw(chunks.concat())
    );
}

#[test]
fn control_characters_fall_back_to_raw() {
    let mut s = session();
    feed(
        &mut s,
        &[RawEvent::bare("response_start"), chunk("ok\x1b[2Jgone")],
    );
    assert_eq!(
        s.log().last().unwrap().sink().content(),
        &SinkContent::Raw("ok\x1b[2Jgone".to_string())
    );
}

#[test]
fn remote_error_does_not_touch_stream() {
    let mut s = session();
    feed(&mut s, &[RawEvent::bare("response_start"), chunk("partial")]);
    let target = s.streaming_message();
    feed(&mut s, &[RawEvent::new("error", json!({"message": "backend down"}))]);

    assert_eq!(s.streaming_message(), target);
    assert_eq!(s.log().last().unwrap().content(), "❌ Error: backend down");
    feed(&mut s, &[chunk(" text")]);
    assert_eq!(s.log().get(target.unwrap()).unwrap().content(), "partial text");
}

#[test]
fn end_while_idle_ignored() {
    let mut s = session();
    let t = s.handle_raw(
        &RawEvent::new("response_end", json!({"time": 1.0})),
        Instant::now(),
    );
    assert_eq!(t, Some(Transition::Ignored(ProtocolAnomaly::EndWhileIdle)));
    assert_eq!(s.status().status_line, "Connecting...");
}

#[test]
fn end_without_time_reports_local_elapsed() {
    let mut s = session();
    let t0 = Instant::now();
    s.handle_raw(&RawEvent::bare("response_start"), t0);
    s.handle_raw(
        &RawEvent::new("response_end", Value::Null),
        t0 + Duration::from_millis(1500),
    );
    assert_eq!(s.status().status_line, "Response generated in 1.50s");
}

#[test]
fn end_with_non_numeric_time_still_closes_stream() {
    let mut s = session();
    let t0 = Instant::now();
    s.handle_raw(&RawEvent::bare("response_start"), t0);
    s.handle_raw(&chunk("done"), t0);
    let id = s.streaming_message().unwrap();

    let t = s.handle_raw(
        &RawEvent::new("response_end", json!({"time": "1.5"})),
        t0 + Duration::from_millis(250),
    );
    assert!(matches!(t, Some(Transition::Finished { .. })));
    assert_eq!(s.stream().state(), StreamState::Idle);
    assert_eq!(s.status().status_line, "Response generated in 0.25s");

    s.handle_raw(&chunk(" LATE"), t0);
    let msg = s.log().get(id).unwrap();
    assert_eq!(msg.content(), "done");
    assert_eq!(msg.status(), MessageStatus::Complete);
}

#[tokio::test]
async fn demo_script_plays_through_session() {
    let mut s = session();
    let mut events = Box::pin(mock_stream(fixtures::demo_conversation()));
    while let Some(event) = events.next().await {
        s.handle_raw(&event, Instant::now());
    }

    assert_eq!(s.status().phase, ConnectionPhase::Connected);
    assert_eq!(s.status().sources.len(), 2);
    let texts: Vec<&str> = s.log().iter().map(|m| m.content()).collect();
    assert!(texts.contains(&"🔧 Detected nmap output!"));
    assert!(texts.contains(&"✅ Target set: 10.10.10.5"));
    assert!(s.log().iter().any(|m| m.role() == Role::Assistant
        && m.status() == MessageStatus::Complete
        && m.content().contains("smbclient")));
}
