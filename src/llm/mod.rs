//! LLM integration module.
//!
//! Provides an OpenAI-compatible client for chat-completion calls and
//! the NER prompt both models receive.

mod client;
mod prompts;

pub use client::{LlmClient, LlmResponse, Message, Role};
pub use prompts::{NO_ENTITIES_SENTINEL, Prompts, STOP_SEQUENCES};
