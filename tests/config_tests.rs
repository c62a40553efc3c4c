use std::collections::HashMap;
use std::fs;

use oaichat::config::DEFAULT_AZURE_API_VERSION;
use oaichat::{ApiType, Error, ModelRoute, ProviderConfig};

fn azure_settings(extra: &[(&str, &str)]) -> HashMap<String, String>
{   let mut settings: HashMap<String, String> = [
      ("deployment_name", "gpt-35")
    , ("endpoint", "https://example.openai.azure.com/")
    , ("api_key", "azure-key")
    ]
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    for (k, v) in extra
    {   settings.insert(k.to_string(), v.to_string());
    }
    settings
}

#[test]
fn test_route_follows_api_type()
{   let open_ai = ProviderConfig::open_ai("gpt-4", "key", None).unwrap();
    assert_eq!(open_ai.route(), ModelRoute::Model("gpt-4".to_string()));

    let azure = ProviderConfig::azure(
      "gpt-35", "https://example.openai.azure.com", "key", None, false
    ).unwrap();
    assert_eq!(azure.api_type, ApiType::Azure);
    assert_eq!(
      azure.route(),
      ModelRoute::Deployment("gpt-35".to_string())
    );

    let azure_ad = ProviderConfig::azure(
      "gpt-35", "https://example.openai.azure.com", "token", None, true
    ).unwrap();
    assert_eq!(azure_ad.api_type, ApiType::AzureAd);
    assert_eq!(
      azure_ad.route(),
      ModelRoute::Deployment("gpt-35".to_string())
    );
}

#[test]
fn test_azure_defaults_api_version()
{   let azure = ProviderConfig::azure(
      "gpt-35", "https://example.openai.azure.com", "key", None, false
    ).unwrap();
    assert_eq!(
      azure.api_version.as_deref(),
      Some(DEFAULT_AZURE_API_VERSION)
    );
}

#[test]
fn test_fields_are_trimmed()
{   let config = ProviderConfig::open_ai(
      "  gpt-4  ", " key\n", Some("org-1".to_string())
    ).unwrap();
    assert_eq!(config.model_id, "gpt-4");
    assert_eq!(config.api_key, "key");
    assert_eq!(config.org_id.as_deref(), Some("org-1"));
}

#[test]
fn test_blank_identity_is_rejected()
{   assert!(matches!(
      ProviderConfig::open_ai("   ", "key", None),
      Err(Error::InvalidConfiguration(_))
    ));
    assert!(matches!(
      ProviderConfig::open_ai("gpt-4", "", None),
      Err(Error::InvalidConfiguration(_))
    ));
}

#[test]
fn test_endpoint_must_be_https()
{   let result = ProviderConfig::azure(
      "gpt-35", "http://example.openai.azure.com", "key", None, false
    );
    assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
}

#[test]
fn test_settings_map_builds_azure_binding()
{   let config = ProviderConfig::azure_from_settings(
      azure_settings(&[("api_version", "2023-05-15")])
    ).unwrap();
    assert_eq!(config.model_id, "gpt-35");
    assert_eq!(config.api_type, ApiType::Azure);
    assert_eq!(config.api_version.as_deref(), Some("2023-05-15"));
    assert_eq!(
      config.endpoint.as_deref(),
      Some("https://example.openai.azure.com/")
    );
}

#[test]
fn test_legacy_api_type_maps_to_ad_auth()
{   let config = ProviderConfig::azure_from_settings(
      azure_settings(&[("api_type", "azure_ad")])
    ).unwrap();
    assert_eq!(config.api_type, ApiType::AzureAd);

    let config = ProviderConfig::azure_from_settings(
      azure_settings(&[("api_type", "azure"), ("ad_auth", "true")])
    ).unwrap();
    assert_eq!(config.api_type, ApiType::Azure);

    let config = ProviderConfig::azure_from_settings(
      azure_settings(&[("ad_auth", "true")])
    ).unwrap();
    assert_eq!(config.api_type, ApiType::AzureAd);
}

#[test]
fn test_settings_map_requires_keys()
{   let mut settings = azure_settings(&[]);
    settings.remove("endpoint");
    assert!(matches!(
      ProviderConfig::azure_from_settings(settings),
      Err(Error::InvalidConfiguration(_))
    ));
}

#[test]
fn test_config_loads_from_json()
{   let config: ProviderConfig = serde_json::from_str(r#"{
      "model_id": "gpt-35",
      "api_key": "key",
      "api_type": "azure_ad",
      "org_id": null,
      "api_version": "2023-05-15",
      "endpoint": "https://example.openai.azure.com"
    }"#).unwrap();
    assert_eq!(config.api_type, ApiType::AzureAd);
    assert_eq!(config.route(), ModelRoute::Deployment("gpt-35".to_string()));
}

#[test]
fn test_json_binding_is_trimmed()
{   let config: ProviderConfig = serde_json::from_str(r#"{
      "model_id": "  gpt-4 ",
      "api_key": " key\n",
      "api_type": "open_ai"
    }"#).unwrap();
    assert_eq!(config.model_id, "gpt-4");
    assert_eq!(config.api_key, "key");
    assert_eq!(config.endpoint, None);
}

#[test]
fn test_json_binding_is_validated()
{   let http_endpoint = serde_json::from_str::<ProviderConfig>(r#"{
      "model_id": "gpt-35",
      "api_key": "key",
      "api_type": "azure",
      "endpoint": "http://example.openai.azure.com"
    }"#);
    let err = http_endpoint.unwrap_err();
    assert!(err.to_string().contains("https"));

    let blank_key = serde_json::from_str::<ProviderConfig>(r#"{
      "model_id": "gpt-4",
      "api_key": "   ",
      "api_type": "open_ai"
    }"#);
    assert!(blank_key.is_err());

    let azure_without_endpoint = serde_json::from_str::<ProviderConfig>(r#"{
      "model_id": "gpt-35",
      "api_key": "key",
      "api_type": "azure"
    }"#);
    assert!(azure_without_endpoint.is_err());
}

#[test]
fn test_json_binding_survives_a_round_trip()
{   let config = ProviderConfig::azure(
      "gpt-35", "https://example.openai.azure.com", "key", None, true
    ).unwrap();
    let json = serde_json::to_string(&config).unwrap();
    let loaded: ProviderConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(loaded, config);
}

#[test]
#[ignore]
fn test_config_from_providers_file()
{   let config_str = match fs::read_to_string("tests/providers.json")
    {   Ok(s) => s,
        Err(e) => {
          println!("Warning: Failed to load config: {}", e);
          return;
        }
    };
    let configs: Vec<ProviderConfig>
      = serde_json::from_str(&config_str).unwrap();
    assert!(!configs.is_empty());
}
