//! Chat model backends.
//!
//! This crate provides:
//! - [`ChatModel`]: the async trait every backend implements
//! - [`OpenAiChatModel`]: OpenAI-compatible `/chat/completions`
//! - [`OllamaChatModel`]: local Ollama `/api/chat`
//! - [`build_chat_model`]: backend selection from `[llm]` config

mod factory;
mod ollama;
mod openai;
mod types;

pub use factory::build_chat_model;
pub use ollama::OllamaChatModel;
pub use openai::OpenAiChatModel;
pub use types::{ChatMessage, ChatModel, ChatRequest, ChatResponse, Role, TokenUsage, ToolCall, ToolSpec};

/// Longest slice of an error body kept in error messages.
const ERROR_BODY_LIMIT: usize = 500;

/// Shorten an API error body for logs and error messages.
pub(crate) fn error_snippet(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= ERROR_BODY_LIMIT {
        return body.to_string();
    }
    let mut snippet: String = body.chars().take(ERROR_BODY_LIMIT).collect();
    snippet.push_str("...");
    snippet
}
