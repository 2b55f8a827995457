//! linegpt core library — config, LINE channel, OpenAI client, and the
//! webhook server used by the CLI binary.

pub mod channels;
pub mod config;
pub mod llm;
pub mod server;
