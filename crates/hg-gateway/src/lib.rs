//! hg-gateway: Connection adapters for the HackGPT client.
//!
//! A gateway owns the single logical connection to the assistant service.
//! Inbound traffic is an ordered stream of [`RawEvent`]s; outbound traffic
//! goes through the [`Emitter`] capability.

pub mod http;
pub mod mock;
pub mod sse;

use hg_protocol::OutboundEvent;
use thiserror::Error;

pub use hg_protocol::RawEvent;
pub use http::{HttpGateway, HttpOptions};
pub use mock::{MockEmitter, MockScript, MockStep};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid server url: {0}")]
    InvalidUrl(String),
    #[error("connection closed")]
    Closed,
}

/// Sends a named event with a payload to the service.
///
/// Implementations must not block: delivery happens in the background and
/// the caller never waits for an acknowledgement.
pub trait Emitter {
    fn emit(&mut self, event: OutboundEvent) -> Result<(), GatewayError>;
}
