//! Wire types and the HTTP transport for chat completions

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use log::{debug, error, trace};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::pin::Pin;

use crate::config::{ApiType, ModelRoute, OPENAI_API_BASE};
use crate::error::TransportError;
use crate::request::{Message, Usage};

// ===== Request Types =====

/// Connection fields copied from the provider binding
#[derive(Debug, Clone, PartialEq)]
pub struct Connection
{   pub api_key: String
  , pub api_type: ApiType
  , pub api_base: Option<String>
  , pub api_version: Option<String>
  , pub organization: Option<String>
}

/// Body of a chat completion call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequestBody
{   pub messages: Vec<Message>
  , pub temperature: f32
  , pub top_p: f32
  , pub n: usize
  , pub stream: bool
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>
  , pub max_tokens: i32
  , pub presence_penalty: f32
  , pub frequency_penalty: f32
  , pub logit_bias: HashMap<u32, f32>
}

/// Fully resolved chat completion call
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest
{   pub route: ModelRoute
  , pub connection: Connection
  , pub body: ChatRequestBody
}

#[derive(Serialize)]
struct WireBody<'a>
{   #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>
  , #[serde(flatten)]
    body: &'a ChatRequestBody
}

// ===== Response Types =====

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse
{   pub choices: Vec<ResponseChoice>
  , #[serde(default)]
    pub usage: Option<Usage>
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseChoice
{   #[serde(default)]
    pub index: usize
  , pub message: ResponseMessage
  , #[serde(default)]
    pub finish_reason: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage
{   #[serde(default)]
    pub role: Option<String>
  , #[serde(default)]
    pub content: Option<String>
}

/// One server-sent chunk of a streamed completion
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChunk
{   #[serde(default)]
    pub choices: Vec<ChunkChoice>
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice
{   #[serde(default)]
    pub index: usize
  , #[serde(default)]
    pub delta: ChunkDelta
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta
{   #[serde(default)]
    pub role: Option<String>
  , #[serde(default)]
    pub content: Option<String>
}

pub type ChunkStream = Pin<Box<
    dyn Stream<Item = Result<ChatChunk, TransportError>> + Send
  >>;

// ===== Transport =====

/// Carries a resolved chat request to the provider
#[async_trait]
pub trait ChatTransport: Send + Sync
{   async fn send(&self, request: ChatRequest)
      -> Result<ChatResponse, TransportError>;

    async fn send_stream(&self, request: ChatRequest)
      -> Result<ChunkStream, TransportError>;
}

/// reqwest transport speaking the OpenAI and Azure dialects
#[derive(Debug, Clone, Default)]
pub struct HttpTransport
{   http_client: reqwest::Client
}

impl HttpTransport
{   pub fn new() -> Self
    {   debug!("Creating HttpTransport");
        HttpTransport
        {   http_client: reqwest::Client::new()
        }
    }

    pub fn with_client(http_client: reqwest::Client) -> Self
    {   HttpTransport { http_client }
    }

    fn build(&self, request: &ChatRequest)
      -> Result<reqwest::RequestBuilder, TransportError>
    {   let conn = &request.connection;
        let (url, model) = match &request.route
        {   ModelRoute::Model(model) => {
              let base = conn.api_base.as_deref()
                .unwrap_or(OPENAI_API_BASE);
              ( format!(
                  "{}/chat/completions",
                  base.trim_end_matches('/')
                )
              , Some(model.as_str())
              )
            }
          , ModelRoute::Deployment(deployment) => {
              let base = conn.api_base.as_deref()
                .ok_or_else(|| TransportError::MissingEndpoint(
                  deployment.clone()
                ))?;
              let version = conn.api_version.as_deref()
                .unwrap_or(crate::config::DEFAULT_AZURE_API_VERSION);
              ( format!(
                  "{}/openai/deployments/{}/chat/completions?api-version={}",
                  base.trim_end_matches('/'),
                  deployment,
                  version
                )
              , None
              )
            }
        };

        trace!("Chat request url: {}", url);

        let mut builder = self.http_client
          .post(url)
          .header("Content-Type", "application/json");

        builder = match conn.api_type
        {   ApiType::Azure => builder.header("api-key", &conn.api_key)
          , ApiType::OpenAi | ApiType::AzureAd => {
              builder.bearer_auth(&conn.api_key)
            }
        };
        if let Some(org) = &conn.organization
        {   builder = builder.header("OpenAI-Organization", org);
        }

        Ok(builder.json(&WireBody
        {   model
          , body: &request.body
        }))
    }

    async fn dispatch(&self, request: &ChatRequest)
      -> Result<reqwest::Response, TransportError>
    {   let response = self.build(request)?
          .send()
          .await
          .map_err(|e| {
            error!("HTTP error: {}", e);
            TransportError::Http(e)
          })?;

        let status = response.status();
        trace!("Chat response status: {}", status);

        if !status.is_success()
        {   let body = response.text().await
              .unwrap_or_else(|_|
                "Unknown error".to_string()
              );
            error!("Chat API error {}: {}", status, body);
            return Err(TransportError::Api
            {   status: status.as_u16()
              , body
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatTransport for HttpTransport
{   async fn send(&self, request: ChatRequest)
      -> Result<ChatResponse, TransportError>
    {   debug!("Sending chat request: {:?}", request.route);
        let response = self.dispatch(&request).await?;
        response.json().await.map_err(|e| {
          error!("Parse error: {}", e);
          TransportError::Parse(e.to_string())
        })
    }

    async fn send_stream(&self, request: ChatRequest)
      -> Result<ChunkStream, TransportError>
    {   debug!("Opening chat stream: {:?}", request.route);
        let response = self.dispatch(&request).await?;
        Ok(Box::pin(sse_chunks(response.bytes_stream())))
    }
}

/// Decode a server-sent event byte stream into chat chunks
///
/// Stops at the `[DONE]` sentinel or when the bytes run out.
pub fn sse_chunks<S, B, E>(bytes: S)
  -> impl Stream<Item = Result<ChatChunk, TransportError>> + Send
where
  S: Stream<Item = Result<B, E>> + Send + 'static
, B: AsRef<[u8]> + Send + 'static
, E: std::fmt::Display + Send + 'static
{   async_stream::try_stream! {
      let events = bytes.eventsource();
      futures::pin_mut!(events);
      while let Some(event) = events.next().await
      {   let event = event.map_err(|e|
            TransportError::Stream(e.to_string())
          )?;
          let data = event.data.trim();
          if data.is_empty()
          {   continue;
          }
          if data == "[DONE]"
          {   trace!("Chat stream finished");
              break;
          }
          let chunk: ChatChunk = serde_json::from_str(data)
            .map_err(|e| TransportError::Parse(e.to_string()))?;
          yield chunk;
      }
    }
}
