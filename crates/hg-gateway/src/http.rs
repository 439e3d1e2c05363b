//! HTTP transport: events arrive over Server-Sent Events, commands are
//! POSTed as JSON envelopes.
//!
//! ```text
//! GET  {base}/events   text/event-stream, one frame per named event
//! POST {base}/emit     {"event": "query", "data": {"query": "..."}}
//! ```
//!
//! Both requests carry an `x-client-id` header so the service can pair the
//! event stream with the commands of the same client.

use std::time::Duration;

use async_stream::stream;
use futures::{Stream, StreamExt};
use hg_protocol::{OutboundEvent, RawEvent};
use reqwest::Client;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::sse;
use crate::{Emitter, GatewayError};

const CLIENT_ID_HEADER: &str = "x-client-id";

/// Connection settings for [`HttpGateway`].
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Service base URL, e.g. `http://localhost:5000`.
    pub base_url: String,
    pub connect_timeout: Duration,
}

impl HttpOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }
}

/// Outbound half of the HTTP connection.
///
/// Emitting only queues the event; a background task performs the POST.
pub struct HttpGateway {
    client_id: String,
    outbound: mpsc::UnboundedSender<OutboundEvent>,
}

impl HttpGateway {
    /// Open the connection.
    ///
    /// Returns the gateway and the ordered inbound event stream. The stream
    /// starts with a synthetic `connect` and always ends with a synthetic
    /// `disconnect`. Must be called from within a tokio runtime.
    pub fn connect(
        options: HttpOptions,
    ) -> Result<(Self, impl Stream<Item = RawEvent> + Send + 'static), GatewayError> {
        if !(options.base_url.starts_with("http://") || options.base_url.starts_with("https://"))
        {
            return Err(GatewayError::InvalidUrl(options.base_url));
        }

        // No overall timeout: the event stream stays open for the session.
        let http = Client::builder()
            .connect_timeout(options.connect_timeout)
            .pool_max_idle_per_host(2)
            .build()?;
        let client_id = uuid::Uuid::new_v4().to_string();

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(post_outbound(
            http.clone(),
            options.endpoint("emit"),
            client_id.clone(),
            rx,
        ));

        let events = inbound_events(http, options.endpoint("events"), client_id.clone());
        let gateway = Self {
            client_id,
            outbound: tx,
        };
        Ok((gateway, events))
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl Emitter for HttpGateway {
    fn emit(&mut self, event: OutboundEvent) -> Result<(), GatewayError> {
        self.outbound.send(event).map_err(|_| GatewayError::Closed)
    }
}

fn inbound_events(
    http: Client,
    url: String,
    client_id: String,
) -> impl Stream<Item = RawEvent> + Send + 'static {
    stream! {
        yield RawEvent::bare("connect");

        match open_event_stream(&http, &url, &client_id).await {
            Ok(response) => {
                tracing::info!(%url, "event stream open");
                let frames = sse::frames(response.bytes_stream());
                futures::pin_mut!(frames);

                while let Some(frame) = frames.next().await {
                    match frame {
                        Ok(frame) => yield frame.into_raw_event(),
                        Err(e) => {
                            tracing::warn!(error = %e, "event stream failed");
                            yield RawEvent::new("error", Value::String(format!("Stream error: {e}")));
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, %url, "could not open event stream");
                yield RawEvent::new("error", Value::String(e.to_string()));
            }
        }

        yield RawEvent::bare("disconnect");
    }
}

async fn open_event_stream(
    http: &Client,
    url: &str,
    client_id: &str,
) -> Result<reqwest::Response, GatewayError> {
    let response = http
        .get(url)
        .header("accept", "text/event-stream")
        .header(CLIENT_ID_HEADER, client_id)
        .send()
        .await?
        .error_for_status()?;
    Ok(response)
}

async fn post_outbound(
    http: Client,
    url: String,
    client_id: String,
    mut rx: mpsc::UnboundedReceiver<OutboundEvent>,
) {
    while let Some(event) = rx.recv().await {
        let envelope = event.to_envelope();
        let result = http
            .post(&url)
            .header(CLIENT_ID_HEADER, &client_id)
            .json(&envelope)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match result {
            Ok(_) => tracing::debug!(event = %envelope.event, "emitted"),
            Err(e) => tracing::warn!(event = %envelope.event, error = %e, "emit failed"),
        }
    }
}
