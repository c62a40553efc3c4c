use async_trait::async_trait;
use futures::{Stream, StreamExt};
use log::{debug, error, trace};
use std::sync::Arc;

use super::transport::{
    ChatChunk, ChatRequest, ChatRequestBody, ChatResponse, ChatTransport,
    ChunkStream, Connection, HttpTransport,
};
use super::{
    ChatCompletionClient, FrameStream, LogUsage, TextCompletionClient,
    UsageHook,
};
use crate::config::ProviderConfig;
use crate::error::{Error, InvalidRequest, TransportError};
use crate::request::{
    ChatRequestSettings, CompletionResult, Message, Role, StreamFrame,
    TextRequestSettings,
};

/// Chat and text completion over the OpenAI chat API, direct or on Azure
pub struct OpenAiChatCompletion<T: ChatTransport = HttpTransport>
{   config: ProviderConfig
  , transport: T
  , usage_hook: Arc<dyn UsageHook>
}

impl OpenAiChatCompletion<HttpTransport>
{   /// Create a client over the default HTTP transport
    pub fn new(config: ProviderConfig) -> Self
    {   OpenAiChatCompletion::with_transport(config, HttpTransport::new())
    }

    /// Client for api.openai.com
    pub fn open_ai(
      model_id: &str
    , api_key: &str
    , org_id: Option<String>
    ) -> Result<Self, Error>
    {   Ok(OpenAiChatCompletion::new(
          ProviderConfig::open_ai(model_id, api_key, org_id)?
        ))
    }

    /// Client for an Azure OpenAI deployment
    pub fn azure(
      deployment_name: &str
    , endpoint: &str
    , api_key: &str
    , api_version: Option<String>
    , ad_auth: bool
    ) -> Result<Self, Error>
    {   Ok(OpenAiChatCompletion::new(
          ProviderConfig::azure(
            deployment_name, endpoint, api_key, api_version, ad_auth
          )?
        ))
    }
}

impl<T: ChatTransport> OpenAiChatCompletion<T>
{   pub fn with_transport(config: ProviderConfig, transport: T) -> Self
    {   debug!(
          "Creating OpenAiChatCompletion for {} ({:?})",
          config.model_id, config.api_type
        );
        OpenAiChatCompletion
        {   config
          , transport
          , usage_hook: Arc::new(LogUsage)
        }
    }

    /// Replace the hook that receives reported token usage
    pub fn with_usage_hook(mut self, hook: Arc<dyn UsageHook>) -> Self
    {   self.usage_hook = hook;
        self
    }

    pub fn config(&self) -> &ProviderConfig
    {   &self.config
    }

    fn build_request(
      &self
    , messages: &[Message]
    , settings: &ChatRequestSettings
    , stream: bool
    ) -> Result<ChatRequest, Error>
    {   validate(messages, settings)?;

        let stop = if settings.stop_sequences.is_empty()
        {   None
        } else
        {   Some(settings.stop_sequences.clone())
        };

        Ok(ChatRequest
        {   route: self.config.route()
          , connection: Connection
            {   api_key: self.config.api_key.clone()
              , api_type: self.config.api_type
              , api_base: self.config.endpoint.clone()
              , api_version: self.config.api_version.clone()
              , organization: self.config.org_id.clone()
            }
          , body: ChatRequestBody
            {   messages: messages.to_vec()
              , temperature: settings.temperature
              , top_p: settings.top_p
              , n: settings.number_of_responses
              , stream
              , stop
              , max_tokens: settings.max_tokens
              , presence_penalty: settings.presence_penalty
              , frequency_penalty: settings.frequency_penalty
              , logit_bias: settings.token_selection_biases.clone()
            }
        })
    }

    async fn send_chat_request(
      &self
    , messages: &[Message]
    , settings: &ChatRequestSettings
    ) -> Result<ChatResponse, Error>
    {   let request = self.build_request(messages, settings, false)?;
        trace!("Chat request: {:?}", request.body);

        let response = self.transport.send(request).await
          .map_err(|e| {
            error!("Chat completion failed: {}", e);
            Error::service(
              "OpenAI service failed to complete the chat", e
            )
          })?;

        if let Some(usage) = &response.usage
        {   self.usage_hook.capture(usage);
        }
        Ok(response)
    }

    async fn send_chat_stream(
      &self
    , messages: &[Message]
    , settings: &ChatRequestSettings
    ) -> Result<FrameStream, Error>
    {   let request = self.build_request(messages, settings, true)?;
        trace!("Chat stream request: {:?}", request.body);

        let chunks = self.transport.send_stream(request).await
          .map_err(|e| {
            error!("Chat stream failed to open: {}", e);
            Error::service(
              "OpenAI service failed to complete the chat", e
            )
          })?;

        Ok(Box::pin(decode_frames(
          chunks, settings.number_of_responses
        )))
    }
}

#[async_trait]
impl<T: ChatTransport> ChatCompletionClient for OpenAiChatCompletion<T>
{   async fn complete_chat(
      &self
    , messages: &[Message]
    , settings: &ChatRequestSettings
    ) -> Result<CompletionResult, Error>
    {   debug!("complete_chat with {} messages", messages.len());
        let response = self.send_chat_request(messages, settings).await?;
        Ok(collect_choices(response))
    }

    async fn complete_chat_stream(
      &self
    , messages: &[Message]
    , settings: &ChatRequestSettings
    ) -> Result<FrameStream, Error>
    {   debug!("complete_chat_stream with {} messages", messages.len());
        self.send_chat_stream(messages, settings).await
    }
}

#[async_trait]
impl<T: ChatTransport> TextCompletionClient for OpenAiChatCompletion<T>
{   async fn complete_text(
      &self
    , prompt: &str
    , settings: &TextRequestSettings
    ) -> Result<CompletionResult, Error>
    {   debug!("complete_text");
        let messages = [Message::user(prompt)];
        let chat_settings = ChatRequestSettings::from(settings);
        self.complete_chat(&messages, &chat_settings).await
    }

    async fn complete_text_stream(
      &self
    , prompt: &str
    , settings: &TextRequestSettings
    ) -> Result<FrameStream, Error>
    {   debug!("complete_text_stream");
        let messages = [Message::user(prompt)];
        let chat_settings = ChatRequestSettings::from(settings);
        self.complete_chat_stream(&messages, &chat_settings).await
    }
}

/// Check a request before anything goes over the wire
pub fn validate(
  messages: &[Message]
, settings: &ChatRequestSettings
) -> Result<(), InvalidRequest>
{   if settings.max_tokens < 1
    {   return Err(InvalidRequest::MaxTokens(settings.max_tokens));
    }
    if settings.number_of_responses < 1
    {   return Err(InvalidRequest::NumberOfResponses(
          settings.number_of_responses
        ));
    }
    match messages.last()
    {   None => Err(InvalidRequest::NoMessages)
      , Some(last) if last.role != Role::User => {
          Err(InvalidRequest::LastMessageNotFromUser(last.role))
        }
      , Some(_) => Ok(())
    }
}

/// Text and choice index carried by a streamed chunk
///
/// A role announcement becomes a `"<role>: "` prefix. Chunks without
/// choices yield nothing.
pub fn parse_choice(chunk: &ChatChunk) -> Option<(String, usize)>
{   let choice = chunk.choices.first()?;
    let mut text = String::new();
    if let Some(role) = &choice.delta.role
    {   text.push_str(role);
        text.push_str(": ");
    }
    if let Some(content) = &choice.delta.content
    {   text.push_str(content);
    }
    Some((text, choice.index))
}

fn collect_choices(response: ChatResponse) -> CompletionResult
{   let mut choices = response.choices;
    choices.sort_by_key(|c| c.index);

    let mut texts: Vec<String> = choices
      .into_iter()
      .map(|c| c.message.content.unwrap_or_default())
      .collect();

    if texts.len() == 1
    {   CompletionResult::Single(texts.remove(0))
    } else
    {   CompletionResult::Multiple(texts)
    }
}

fn decode_frames(
  chunks: ChunkStream
, number_of_responses: usize
) -> impl Stream<Item = Result<StreamFrame, Error>> + Send
{   async_stream::try_stream! {
      let mut chunks = chunks;
      while let Some(chunk) = chunks.next().await
      {   let chunk = chunk.map_err(|e| {
            error!("Chat stream broke off: {}", e);
            Error::service("OpenAI chat stream failed", e)
          })?;

          let (text, index) = match parse_choice(&chunk)
          {   Some(parsed) => parsed
            , None => {
                trace!("Skipping chunk without choices");
                continue;
              }
          };

          if number_of_responses > 1
          {   if index >= number_of_responses
              {   error!(
                    "Choice index {} out of range for {} responses",
                    index, number_of_responses
                  );
                  Err::<(), Error>(Error::service(
                    "OpenAI chat stream failed",
                    TransportError::Parse(format!(
                      "choice index {} out of range for {} responses",
                      index, number_of_responses
                    ))
                  ))?;
              }
              let mut slots = vec![String::new(); number_of_responses];
              slots[index] = text;
              yield StreamFrame::Slots(slots);
          } else
          {   yield StreamFrame::Text(text);
          }
      }
    }
}
