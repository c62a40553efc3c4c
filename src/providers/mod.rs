//! Completion capabilities and their OpenAI implementation

pub mod openai;
pub mod transport;

use async_trait::async_trait;
use futures::Stream;
use log::debug;
use std::pin::Pin;

use crate::error::Error;
use crate::request::{
    ChatRequestSettings, CompletionResult, Message, StreamFrame,
    TextRequestSettings, Usage,
};

// Re-export for convenience
pub use openai::OpenAiChatCompletion;
pub use transport::{ChatTransport, HttpTransport};

/// Lazy sequence of partial results; ends when the provider does
pub type FrameStream = Pin<Box<
    dyn Stream<Item = Result<StreamFrame, Error>> + Send
  >>;

/// Completes a conversation whose last turn is from the user
#[async_trait]
pub trait ChatCompletionClient
{   async fn complete_chat(
      &self
    , messages: &[Message]
    , settings: &ChatRequestSettings
    ) -> Result<CompletionResult, Error>;

    async fn complete_chat_stream(
      &self
    , messages: &[Message]
    , settings: &ChatRequestSettings
    ) -> Result<FrameStream, Error>;
}

/// Completes a bare prompt
#[async_trait]
pub trait TextCompletionClient
{   async fn complete_text(
      &self
    , prompt: &str
    , settings: &TextRequestSettings
    ) -> Result<CompletionResult, Error>;

    async fn complete_text_stream(
      &self
    , prompt: &str
    , settings: &TextRequestSettings
    ) -> Result<FrameStream, Error>;
}

/// Receives token usage reported by the provider
pub trait UsageHook: Send + Sync
{   fn capture(&self, usage: &Usage);
}

/// Usage hook that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct LogUsage;

impl UsageHook for LogUsage
{   fn capture(&self, usage: &Usage)
    {   debug!(
          "Token usage: prompt={} completion={} total={}",
          usage.prompt_tokens,
          usage.completion_tokens,
          usage.total_tokens
        );
    }
}
