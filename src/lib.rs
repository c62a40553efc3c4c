pub mod error;
pub mod config;
pub mod providers;
pub mod request;
pub mod client;

pub use client::CompletionBackend;
pub use config::{ApiType, ModelRoute, ProviderConfig};
pub use error::{Error, InvalidRequest, TransportError};
pub use providers::{
    ChatCompletionClient, FrameStream, OpenAiChatCompletion,
    TextCompletionClient, UsageHook,
};
pub use request::{
    ChatRequestSettings, CompletionResult, Message, Role, StreamFrame,
    TextRequestSettings, Usage,
};

/*

oaichat: chat and text completions against OpenAI or an Azure OpenAI
deployment behind one interface.

oaichat/
├── Cargo.toml
├── src/
│   ├── lib.rs          # Re-exports and the backend channel interface
│   ├── error.rs        # Error, InvalidRequest, TransportError
│   ├── config.rs       # Provider binding (OpenAI / Azure / Azure AD)
│   ├── request.rs      # Messages, settings, results, stream frames
│   ├── client.rs       # Actor front end owning a completion service
│   └── providers/
│       ├── mod.rs      # Capability traits and the usage hook
│       ├── openai.rs   # Request normalizer and stream decoder
│       └── transport.rs  # Wire types, ChatTransport, reqwest + SSE
└── tests/

*/

/// OAICHAT BACKEND INTERFACE:

// ===== CompleteChat =====

pub type CompleteReply = Result<CompletionResult, crate::error::Error>;
pub type CompleteReplySender
  = tokio::sync::mpsc::UnboundedSender<CompleteReply>;

pub struct CompleteChatArgs
{   pub messages: Vec<Message>
  , pub settings: ChatRequestSettings
  , pub reply: CompleteReplySender
}

// ===== CompleteText =====

pub struct CompleteTextArgs
{   pub prompt: String
  , pub settings: TextRequestSettings
  , pub reply: CompleteReplySender
}

// ===== Streams =====

/// Frames arrive one at a time; the producer waits for each to be taken
pub type StreamReply = Result<StreamFrame, crate::error::Error>;
pub type StreamReplySender
  = tokio::sync::mpsc::Sender<StreamReply>;

pub struct StreamChatArgs
{   pub messages: Vec<Message>
  , pub settings: ChatRequestSettings
  , pub reply: StreamReplySender
}

pub struct StreamTextArgs
{   pub prompt: String
  , pub settings: TextRequestSettings
  , pub reply: StreamReplySender
}

// ===== KillProcess =====

pub type KillProcessReply = Result<(), crate::error::Error>;
pub type KillProcessReplySender
  = tokio::sync::mpsc::UnboundedSender<KillProcessReply>;

pub struct KillProcessArgs
{   pub reply: KillProcessReplySender
}

// ===== BackendHand (sender side) =====

pub struct BackendHand
{   pub complete_chat_tx
      : tokio::sync::mpsc::UnboundedSender<CompleteChatArgs>
  , pub complete_text_tx
      : tokio::sync::mpsc::UnboundedSender<CompleteTextArgs>
  , pub stream_chat_tx
      : tokio::sync::mpsc::UnboundedSender<StreamChatArgs>
  , pub stream_text_tx
      : tokio::sync::mpsc::UnboundedSender<StreamTextArgs>
  , pub kill_process_tx
      : tokio::sync::mpsc::UnboundedSender<KillProcessArgs>
}

// ===== BackendFoot (receiver side) =====

pub struct BackendFoot
{   pub complete_chat_rx
      : tokio::sync::mpsc::UnboundedReceiver<CompleteChatArgs>
  , pub complete_text_rx
      : tokio::sync::mpsc::UnboundedReceiver<CompleteTextArgs>
  , pub stream_chat_rx
      : tokio::sync::mpsc::UnboundedReceiver<StreamChatArgs>
  , pub stream_text_rx
      : tokio::sync::mpsc::UnboundedReceiver<StreamTextArgs>
  , pub kill_process_rx
      : tokio::sync::mpsc::UnboundedReceiver<KillProcessArgs>
}
