//! LLM abstraction and OpenAI client.
//!
//! Chat completion against the OpenAI API (or any compatible endpoint).

mod openai;

pub use openai::{ChatMessage, OpenAiClient, OpenAiError};
