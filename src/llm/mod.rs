pub mod ollama;
pub mod openai_compat;
pub mod provider;
pub mod service;
#[cfg(test)]
pub mod testing;
pub mod types;

pub use provider::LlmProvider;
pub use service::LlmService;
pub use types::{ChatMessage, ChatRequest};
