use thiserror::Error;

/// Error type for completion operations
#[derive(Debug, Error)]
pub enum Error
{   /// A local precondition failed; no network call was made
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] InvalidRequest)
  , /// The provider call failed or returned an error
    #[error("{message}")]
    ServiceError
    {   message: String
      , #[source]
        source: TransportError
    }
  , /// Invalid provider configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String)
  , /// Generic error
    #[error("Error: {0}")]
    Other(String)
}

impl Error
{   pub(crate) fn service(
      message: &str
    , source: TransportError
    ) -> Self
    {   Error::ServiceError
        {   message: message.to_string()
          , source
        }
    }
}

/// Reasons a request is rejected before it is sent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRequest
{   #[error("the max tokens must be greater than 0, but was {0}")]
    MaxTokens(i32)
  , #[error("the number of responses must be greater than 0, but was {0}")]
    NumberOfResponses(usize)
  , #[error("to complete a chat you need at least one message")]
    NoMessages
  , #[error("the last message must be from the user, but was from {0}")]
    LastMessageNotFromUser(crate::request::Role)
}

/// Failures raised by a chat transport
#[derive(Debug, Error)]
pub enum TransportError
{   /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error)
  , /// API returned an error response
    #[error("API error ({status}): {body}")]
    Api
    {   status: u16
      , body: String
    }
  , /// Failed to parse API response
    #[error("Parse error: {0}")]
    Parse(String)
  , /// The event stream broke off
    #[error("Stream error: {0}")]
    Stream(String)
  , /// A deployment route was handed to the transport without a base URL
    #[error("No endpoint for deployment {0}")]
    MissingEndpoint(String)
}
