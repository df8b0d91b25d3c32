//! # EMR Extraction
//!
//! Concrete [`emr_core::ExtractionClient`] backed by a chat-completions HTTP API.
//!
//! The client returns raw model content only. JSON parsing, shape validation and reference
//! filtering stay in `emr-core`.

pub mod client;
pub mod prompt;

pub use client::{completion_content, content_from_completion, ChatCompletionsClient};
