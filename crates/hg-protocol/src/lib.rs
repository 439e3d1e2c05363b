//! hg-protocol: Event schemas exchanged with the HackGPT assistant service.
//!
//! The connection delivers named events carrying JSON payloads. This crate
//! turns them into typed, validated values at the boundary so the client
//! core never inspects untyped JSON.

pub mod event;
pub mod outbound;

pub use event::{
    ChunkPayload, CommandResult, ConfidenceLevel, ConfidencePayload, ConnectedPayload,
    ErrorPayload, InboundEvent, PayloadError, RawEvent, ResponseEndPayload, ResponsePayload,
    Source, SourcesPayload, StatusPayload, ToolDetectedPayload,
};
pub use outbound::{Envelope, OutboundEvent, QueryPayload};
