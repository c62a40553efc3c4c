//! Provider identity for OpenAI and Azure OpenAI

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use log::{debug, error};

pub const OPENAI_API_BASE: &str
  = "https://api.openai.com/v1";

pub const DEFAULT_AZURE_API_VERSION: &str = "2022-12-01";

/// Request dialect of the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiType
{   /// api.openai.com, model selected by name
    OpenAi
  , /// Azure OpenAI with an api-key header
    Azure
  , /// Azure OpenAI with an Azure AD bearer token
    AzureAd
}

impl ApiType
{   pub fn is_azure(&self) -> bool
    {   matches!(self, ApiType::Azure | ApiType::AzureAd)
    }
}

/// How the outgoing request names its model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelRoute
{   /// `model` field in the request body
    Model(String)
  , /// Azure deployment (engine) in the request path
    Deployment(String)
}

/// Immutable provider binding
///
/// Deserialized bindings are trimmed and validated like constructed ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawProviderConfig")]
pub struct ProviderConfig
{   /// Model name, or deployment name for Azure
    pub model_id: String
  , pub api_key: String
  , pub api_type: ApiType
  , /// OpenAI organization
    pub org_id: Option<String>
  , pub api_version: Option<String>
  , /// API base URL (if custom)
    pub endpoint: Option<String>
}

impl ProviderConfig
{   /// Binding for api.openai.com
    pub fn open_ai(
      model_id: &str
    , api_key: &str
    , org_id: Option<String>
    ) -> Result<Self, crate::error::Error>
    {   debug!("Creating OpenAI binding for model: {}", model_id.trim());
        ProviderConfig
        {   model_id: model_id.trim().to_string()
          , api_key: api_key.trim().to_string()
          , api_type: ApiType::OpenAi
          , org_id
          , api_version: None
          , endpoint: None
        }.validate()
    }

    /// Binding for an Azure OpenAI deployment
    pub fn azure(
      deployment_name: &str
    , endpoint: &str
    , api_key: &str
    , api_version: Option<String>
    , ad_auth: bool
    ) -> Result<Self, crate::error::Error>
    {   debug!(
          "Creating Azure binding for deployment: {}",
          deployment_name.trim()
        );
        ProviderConfig
        {   model_id: deployment_name.trim().to_string()
          , api_key: api_key.trim().to_string()
          , api_type: if ad_auth { ApiType::AzureAd } else { ApiType::Azure }
          , org_id: None
          , api_version: Some(api_version.unwrap_or_else(||
              DEFAULT_AZURE_API_VERSION.to_string()
            ))
          , endpoint: Some(endpoint.trim().to_string())
        }.validate()
    }

    /// Azure binding from a settings map
    ///
    /// Keys: `deployment_name`, `endpoint`, `api_key` and optionally
    /// `api_version` and `ad_auth`. A legacy `api_type` key sets
    /// `ad_auth` when it equals `azure_ad`.
    pub fn azure_from_settings(
      mut settings: HashMap<String, String>
    ) -> Result<Self, crate::error::Error>
    {   if let Some(api_type) = settings.remove("api_type")
        {   let ad_auth = api_type == "azure_ad";
            settings.insert("ad_auth".to_string(), ad_auth.to_string());
        }

        let required = |key: &str| {
          settings.get(key).cloned().ok_or_else(|| {
            error!("Missing Azure setting: {}", key);
            crate::error::Error::InvalidConfiguration(
              format!("missing setting: {}", key)
            )
          })
        };
        let deployment_name = required("deployment_name")?;
        let endpoint = required("endpoint")?;
        let api_key = required("api_key")?;

        let ad_auth = settings.get("ad_auth")
          .map(|v| v.eq_ignore_ascii_case("true"))
          .unwrap_or(false);

        ProviderConfig::azure(
          &deployment_name
        , &endpoint
        , &api_key
        , settings.get("api_version").cloned()
        , ad_auth
        )
    }

    /// OpenAI binding from `OPENAI_API_KEY`, `OPENAI_ORG_ID` and
    /// `OPENAI_CHAT_MODEL_ID`
    pub fn open_ai_from_env()
      -> Result<Self, crate::error::Error>
    {   let api_key = env_var("OPENAI_API_KEY")?;
        let model_id = env_var("OPENAI_CHAT_MODEL_ID")?;
        ProviderConfig::open_ai(
          &model_id
        , &api_key
        , std::env::var("OPENAI_ORG_ID").ok()
        )
    }

    /// Azure binding from the `AZURE_OPENAI_*` variables
    pub fn azure_from_env()
      -> Result<Self, crate::error::Error>
    {   let deployment_name = env_var("AZURE_OPENAI_DEPLOYMENT_NAME")?;
        let endpoint = env_var("AZURE_OPENAI_ENDPOINT")?;
        let api_key = env_var("AZURE_OPENAI_API_KEY")?;
        ProviderConfig::azure(
          &deployment_name
        , &endpoint
        , &api_key
        , std::env::var("AZURE_OPENAI_API_VERSION").ok()
        , false
        )
    }

    /// Model selector for the outgoing request
    pub fn route(&self) -> ModelRoute
    {   if self.api_type.is_azure()
        {   ModelRoute::Deployment(self.model_id.clone())
        } else
        {   ModelRoute::Model(self.model_id.clone())
        }
    }

    /// Check the binding and hand it back
    pub fn validate(self)
      -> Result<Self, crate::error::Error>
    {   if self.model_id.trim().is_empty()
        {   return Err(invalid("model id must not be empty"));
        }
        if self.api_key.trim().is_empty()
        {   return Err(invalid("api key must not be empty"));
        }
        match &self.endpoint
        {   Some(endpoint) if !endpoint.starts_with("https://") => {
              return Err(invalid(
                &format!("endpoint must be an https URL: {}", endpoint)
              ));
            }
          , None if self.api_type.is_azure() => {
              return Err(invalid("Azure requires an endpoint"));
            }
          , _ => {}
        }
        Ok(self)
    }
}

/// Provider binding as read from a file, before any checks
#[derive(Deserialize)]
struct RawProviderConfig
{   model_id: String
  , api_key: String
  , api_type: ApiType
  , #[serde(default)]
    org_id: Option<String>
  , #[serde(default)]
    api_version: Option<String>
  , #[serde(default)]
    endpoint: Option<String>
}

impl TryFrom<RawProviderConfig> for ProviderConfig
{   type Error = crate::error::Error;

    fn try_from(raw: RawProviderConfig) -> Result<Self, Self::Error>
    {   let trimmed = |value: Option<String>| {
          value.map(|v| v.trim().to_string())
        };
        ProviderConfig
        {   model_id: raw.model_id.trim().to_string()
          , api_key: raw.api_key.trim().to_string()
          , api_type: raw.api_type
          , org_id: trimmed(raw.org_id)
          , api_version: trimmed(raw.api_version)
          , endpoint: trimmed(raw.endpoint)
        }.validate()
    }
}

fn invalid(msg: &str) -> crate::error::Error
{   error!("Invalid provider configuration: {}", msg);
    crate::error::Error::InvalidConfiguration(msg.to_string())
}

fn env_var(name: &str)
  -> Result<String, crate::error::Error>
{   std::env::var(name).map_err(|_| {
      crate::error::Error::InvalidConfiguration(
        format!("Environment variable {} not set", name)
      )
    })
}
