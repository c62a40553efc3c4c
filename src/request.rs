//! Request and result types shared by every completion call

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role
{   System
  , User
  , Assistant
}

impl fmt::Display for Role
{   fn fmt(&self, f: &mut fmt::Formatter<'_>)
      -> fmt::Result
    {   match self
        {   Role::System => write!(f, "system")
          , Role::User => write!(f, "user")
          , Role::Assistant => write!(f, "assistant")
        }
    }
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message
{   pub role: Role
  , pub content: String
}

impl Message
{   pub fn new(role: Role, content: impl Into<String>) -> Self
    {   Message
        {   role
          , content: content.into()
        }
    }

    pub fn system(content: impl Into<String>) -> Self
    {   Message::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self
    {   Message::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self
    {   Message::new(Role::Assistant, content)
    }
}

/// Generation parameters for a chat completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatRequestSettings
{   /// Sampling temperature
    pub temperature: f32
  , /// Nucleus sampling mass
    pub top_p: f32
  , pub presence_penalty: f32
  , pub frequency_penalty: f32
  , /// Max tokens to generate, must be at least 1
    pub max_tokens: i32
  , /// Number of candidate completions to request
    pub number_of_responses: usize
  , /// Bias applied to token ids during sampling
    pub token_selection_biases: HashMap<u32, f32>
  , /// Sequences where generation stops
    pub stop_sequences: Vec<String>
}

impl Default for ChatRequestSettings
{   fn default() -> Self
    {   ChatRequestSettings
        {   temperature: 0.0
          , top_p: 1.0
          , presence_penalty: 0.0
          , frequency_penalty: 0.0
          , max_tokens: 256
          , number_of_responses: 1
          , token_selection_biases: HashMap::new()
          , stop_sequences: vec![]
        }
    }
}

/// Generation parameters for a text completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextRequestSettings
{   pub temperature: f32
  , pub top_p: f32
  , pub presence_penalty: f32
  , pub frequency_penalty: f32
  , pub max_tokens: i32
  , pub number_of_responses: usize
  , pub token_selection_biases: HashMap<u32, f32>
  , pub stop_sequences: Vec<String>
}

impl Default for TextRequestSettings
{   fn default() -> Self
    {   TextRequestSettings
        {   temperature: 0.0
          , top_p: 1.0
          , presence_penalty: 0.0
          , frequency_penalty: 0.0
          , max_tokens: 256
          , number_of_responses: 1
          , token_selection_biases: HashMap::new()
          , stop_sequences: vec![]
        }
    }
}

impl From<&TextRequestSettings> for ChatRequestSettings
{   fn from(settings: &TextRequestSettings) -> Self
    {   ChatRequestSettings
        {   temperature: settings.temperature
          , top_p: settings.top_p
          , presence_penalty: settings.presence_penalty
          , frequency_penalty: settings.frequency_penalty
          , max_tokens: settings.max_tokens
          , number_of_responses: settings.number_of_responses
          , token_selection_biases
              : settings.token_selection_biases.clone()
          , stop_sequences: settings.stop_sequences.clone()
        }
    }
}

/// Result of a non-streaming completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompletionResult
{   /// Exactly one candidate came back
    Single(String)
  , /// One entry per candidate, in choice index order
    Multiple(Vec<String>)
}

/// One element of a completion stream
///
/// With several candidates each frame is a fresh array holding only the
/// fragment of the reported slot; earlier fragments are not carried over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamFrame
{   Text(String)
  , Slots(Vec<String>)
}

/// Token accounting reported by the provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage
{   #[serde(default)]
    pub prompt_tokens: u64
  , #[serde(default)]
    pub completion_tokens: u64
  , #[serde(default)]
    pub total_tokens: u64
}
