//! Wiring from configuration to a ready-to-use engine.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use graphbridge_core::categories::preset_requires_org_mode;
use graphbridge_core::oauth::MicrosoftIdentityProvider;
use graphbridge_core::{
    AuthManager, Catalog, CatalogError, ConfigError, CredentialStore, GraphClient, GraphbridgeError,
    RegistryOptions, ReqwestTransport, ToolEntry, ToolExecutor, ToolRegistry, combined_preset_pattern,
    create_secure_store, resolve_scopes,
};
use serde_json::{Map, Value, json};

use crate::config::CliConfig;

/// Catalog shipped with the binary, used when no catalog path is configured.
pub const BUILTIN_CATALOG: &str = include_str!("../catalog/endpoints.json");

/// Load the configured catalog, or the bundled one.
pub fn load_catalog(config: &CliConfig) -> Result<Catalog, CatalogError> {
    match &config.catalog_path {
        Some(path) => Catalog::load(path),
        None => Catalog::from_json(BUILTIN_CATALOG),
    }
}

/// Effective tool allow-list: presets win over an explicit pattern.
pub fn tool_filter(config: &CliConfig) -> Result<Option<String>, ConfigError> {
    if config.presets.is_empty() {
        return Ok(config.enabled_tools.clone());
    }

    for preset in &config.presets {
        if preset_requires_org_mode(preset) && !config.org_mode {
            tracing::warn!("Preset '{}' requires --org-mode to be useful", preset);
        }
    }
    let pattern = combined_preset_pattern(&config.presets)?;
    tracing::info!("Using presets {} (pattern: {})", config.presets.join(", "), pattern);
    Ok(Some(pattern))
}

/// A configured engine.
pub struct App {
    pub config: CliConfig,
    pub registry: Arc<ToolRegistry>,
    pub auth: Arc<AuthManager>,
    pub client: Arc<GraphClient>,
}

impl App {
    pub async fn build(config: CliConfig) -> Result<Self, GraphbridgeError> {
        let secrets = config.app_secrets()?;
        let catalog = load_catalog(&config)?;
        let enabled_tools = tool_filter(&config)?;

        let scopes = resolve_scopes(catalog.endpoints(), config.org_mode, enabled_tools.as_deref());

        let store = CredentialStore::new(create_secure_store(config.use_keyring), config.credential_paths());
        let provider = Arc::new(MicrosoftIdentityProvider::new(secrets.clone()));
        let auth = Arc::new(AuthManager::new(store, provider, scopes.into_iter().collect()));
        auth.load_cache().await;
        if let Some(token) = &config.oauth_token {
            tracing::info!("Using externally supplied bearer token");
            auth.set_external_token(token.clone()).await;
        }

        let client = Arc::new(GraphClient::new(
            auth.clone(),
            Arc::new(ReqwestTransport::new()),
            secrets.cloud,
        ));

        let registry = Arc::new(ToolRegistry::build(
            &catalog,
            &RegistryOptions {
                read_only: config.read_only,
                org_mode: config.org_mode,
                enabled_tools,
            },
        ));

        Ok(Self {
            config,
            registry,
            auth,
            client,
        })
    }

    pub fn executor(&self) -> ToolExecutor {
        ToolExecutor::new(self.registry.clone(), self.client.clone())
    }
}

/// Parse a `key=value` tool parameter. The value is JSON when it parses as
/// JSON and a plain string otherwise.
pub fn parse_param(arg: &str) -> Result<(String, Value)> {
    let (key, raw) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("invalid parameter '{}', expected key=value", arg))?;
    if key.is_empty() {
        return Err(anyhow!("invalid parameter '{}', empty key", arg));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

/// Read a request body given inline or as `@path`.
pub fn read_body(arg: &str) -> Result<Value> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("Failed to read body from {}", path))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&text).context("Request body is not valid JSON")
}

/// Assemble the parameter map for `run`.
pub fn build_params(params: &[String], body: Option<&str>, flags: &[(&str, bool)]) -> Result<Map<String, Value>> {
    let mut map = Map::new();
    for arg in params {
        let (key, value) = parse_param(arg)?;
        map.insert(key, value);
    }
    if let Some(body) = body {
        map.insert("body".to_string(), read_body(body)?);
    }
    for (name, enabled) in flags {
        if *enabled {
            map.insert(name.to_string(), Value::Bool(true));
        }
    }
    Ok(map)
}

/// One line of `tools list`.
pub fn tool_summary(entry: &ToolEntry) -> Value {
    json!({
        "name": entry.name(),
        "method": entry.endpoint.method,
        "path": entry.path(),
        "description": entry.description,
    })
}

/// Full `tools describe` output.
pub fn tool_details(entry: &ToolEntry) -> Value {
    let endpoint = &entry.endpoint;
    json!({
        "name": entry.name(),
        "method": endpoint.method,
        "path": entry.path(),
        "description": entry.description,
        "parameters": endpoint.parameters,
        "scopes": endpoint.scopes,
        "orgScopes": endpoint.org_scopes,
        "supportsTimezone": endpoint.supports_timezone,
        "supportsExpandExtendedProperties": endpoint.supports_expand_extended_properties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = load_catalog(&CliConfig::default()).unwrap();
        assert!(!catalog.is_empty());
    }

    #[test]
    fn test_parse_param_values() {
        assert_eq!(parse_param("top=5").unwrap(), ("top".to_string(), json!(5)));
        assert_eq!(
            parse_param("filter=isRead eq false").unwrap(),
            ("filter".to_string(), json!("isRead eq false"))
        );
        assert_eq!(parse_param("a=b=c").unwrap().1, json!("b=c"));
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=x").is_err());
    }

    #[test]
    fn test_build_params_with_flags() {
        let params = build_params(
            &["message-id=m1".to_string()],
            Some(r#"{"subject":"hi"}"#),
            &[("fetchAllPages", true), ("excludeResponse", false)],
        )
        .unwrap();

        assert_eq!(params["message-id"], json!("m1"));
        assert_eq!(params["body"], json!({ "subject": "hi" }));
        assert_eq!(params["fetchAllPages"], json!(true));
        assert!(!params.contains_key("excludeResponse"));
    }

    #[test]
    fn test_presets_override_enabled_tools() {
        let config = CliConfig {
            enabled_tools: Some("mail".to_string()),
            presets: vec!["calendar".to_string()],
            ..CliConfig::default()
        };
        assert_eq!(tool_filter(&config).unwrap().as_deref(), Some("(?:calendar|event)"));

        let unknown = CliConfig {
            presets: vec!["bogus".to_string()],
            ..CliConfig::default()
        };
        assert!(matches!(tool_filter(&unknown), Err(ConfigError::UnknownPreset { .. })));
    }

    #[test]
    fn test_read_only_registry_from_builtin_catalog() {
        let catalog = load_catalog(&CliConfig::default()).unwrap();
        let registry = ToolRegistry::build(
            &catalog,
            &RegistryOptions {
                read_only: true,
                ..Default::default()
            },
        );
        assert!(registry.list().iter().all(|e| e.endpoint.method.is_read()));
        assert!(registry.get("list-mail-messages").is_some());
        assert!(registry.get("send-mail").is_none());
    }
}
