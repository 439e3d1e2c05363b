//! hg-core: Client core for the HackGPT assistant.
//!
//! The streaming-response state machine, the conversation transcript and
//! the status presentation, plus the terminal frontend that drives them.
//! Exposed as a library for integration testing.

pub mod app;
pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod display;
pub mod logging;
pub mod palette;
pub mod render;
pub mod session;
pub mod status;
pub mod stream;
