mod error;
mod gemini;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use serde_json::Value;

pub use error::ChatError;
pub use gemini::GeminiModel;

/// Output cap applied to every chat session.
pub const MAX_OUTPUT_TOKENS: u32 = 1000;

/// Lazily produced text fragments of one streamed reply.
pub type TextStream = BoxStream<'static, Result<String, ChatError>>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: MAX_OUTPUT_TOKENS,
        }
    }
}

/// A conversation context: prior turns, forwarded as-is, plus generation options.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub history: Vec<Value>,
    pub generation_config: GenerationConfig,
}

impl ChatSession {
    pub fn new(history: Vec<Value>, generation_config: GenerationConfig) -> Self {
        Self {
            history,
            generation_config,
        }
    }
}

/// The generative chat backend the handler talks to.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Sends `message` within `session` and waits for the complete reply.
    async fn send_message(&self, session: &ChatSession, message: &str) -> Result<String, ChatError>;

    /// Sends `message` within `session`. Resolves once the backend has accepted
    /// the request; the reply text then arrives through the returned stream.
    async fn send_message_stream(
        &self,
        session: &ChatSession,
        message: &str,
    ) -> Result<TextStream, ChatError>;
}
