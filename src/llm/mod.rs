//! LLM provider abstraction layer
//!
//! Each pipeline stage talks to the model through the [`LlmProvider`] trait;
//! the only concrete backend is an OpenAI-compatible chat completions client.

pub mod provider;
pub mod providers;

pub use provider::*;
pub use providers::*;
