//! OpenAI-compatible chat-completions client for Pinpoint.
//!
//! Non-streaming by design: the orchestration loop treats each backend
//! consultation as a single blocking unit of work.

mod client;

pub use client::OpenAiClient;
