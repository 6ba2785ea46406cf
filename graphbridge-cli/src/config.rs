//! CLI configuration handling.
//!
//! Settings come from `config.toml` in the platform config directory, then
//! environment variables, then command-line flags (applied by the caller).

use anyhow::{Context, Result};
use directories::ProjectDirs;
use graphbridge_core::cloud::{AppSecrets, parse_cloud_type};
use graphbridge_core::error::ConfigError;
use graphbridge_core::store::CredentialPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::output::OutputFormat;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Microsoft cloud: `global` or `china`.
    pub cloud: Option<String>,

    pub client_id: Option<String>,
    pub tenant_id: Option<String>,

    /// Client secret for confidential client registrations.
    pub client_secret: Option<String>,

    /// Endpoint catalog; the bundled catalog is used when unset.
    pub catalog_path: Option<PathBuf>,

    pub token_cache_path: Option<PathBuf>,
    pub selected_account_path: Option<PathBuf>,

    /// Prefer the OS keyring over owner-only files.
    pub use_keyring: bool,

    pub read_only: bool,
    pub org_mode: bool,

    /// Regex allow-list over tool names.
    pub enabled_tools: Option<String>,

    /// Tool category presets, combined into one allow-list.
    pub presets: Vec<String>,

    pub output_format: OutputFormat,

    /// Externally supplied bearer token. Never read from the file.
    #[serde(skip)]
    pub oauth_token: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            cloud: None,
            client_id: None,
            tenant_id: None,
            client_secret: None,
            catalog_path: None,
            token_cache_path: None,
            selected_account_path: None,
            use_keyring: true,
            read_only: false,
            org_mode: false,
            enabled_tools: None,
            presets: Vec::new(),
            output_format: OutputFormat::default(),
            oauth_token: None,
        }
    }
}

impl CliConfig {
    /// Parse a configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read config from {:?}", path))?;
        let mut config: Self =
            toml::from_str(&contents).with_context(|| format!("Failed to parse config from {:?}", path))?;
        config.config_path = path.to_path_buf();
        Ok(config)
    }

    /// Apply environment overrides from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("GRAPHBRIDGE_CLOUD_TYPE") {
            self.cloud = Some(v);
        }
        if let Some(v) = var("GRAPHBRIDGE_CLIENT_ID") {
            self.client_id = Some(v);
        }
        if let Some(v) = var("GRAPHBRIDGE_TENANT_ID") {
            self.tenant_id = Some(v);
        }
        if let Some(v) = var("GRAPHBRIDGE_CLIENT_SECRET") {
            self.client_secret = Some(v);
        }
        if let Some(v) = var("GRAPHBRIDGE_CATALOG_PATH") {
            self.catalog_path = Some(PathBuf::from(v));
        }
        if let Some(v) = var("GRAPHBRIDGE_TOKEN_CACHE_PATH") {
            self.token_cache_path = Some(PathBuf::from(v));
        }
        if let Some(v) = var("GRAPHBRIDGE_SELECTED_ACCOUNT_PATH") {
            self.selected_account_path = Some(PathBuf::from(v));
        }
        if let Some(v) = var("GRAPHBRIDGE_OAUTH_TOKEN") {
            self.oauth_token = Some(v);
        }
        if let Some(v) = var("READ_ONLY") {
            self.read_only = is_enabled(&v);
        }
        if let Some(v) = var("ENABLED_TOOLS") {
            self.enabled_tools = Some(v);
        }
        if let Some(v) = var("GRAPHBRIDGE_ORG_MODE") {
            self.org_mode = is_enabled(&v);
        }
        if let Some(v) = var("GRAPHBRIDGE_OUTPUT_FORMAT") {
            match v.parse() {
                Ok(format) => self.output_format = format,
                Err(e) => tracing::warn!("Ignoring GRAPHBRIDGE_OUTPUT_FORMAT: {}", e),
            }
        }
    }

    /// Client registration for the configured cloud.
    pub fn app_secrets(&self) -> Result<AppSecrets, ConfigError> {
        let cloud = parse_cloud_type(self.cloud.as_deref())?;
        let mut secrets = AppSecrets::for_cloud(cloud);
        if let Some(client_id) = &self.client_id {
            secrets.client_id = client_id.clone();
        }
        if let Some(tenant_id) = &self.tenant_id {
            secrets.tenant_id = tenant_id.clone();
        }
        secrets.client_secret = self.client_secret.clone();
        Ok(secrets)
    }

    /// Fallback file locations, defaulting to the platform data directory.
    pub fn credential_paths(&self) -> CredentialPaths {
        let mut paths = CredentialPaths::default();
        if let Some(path) = &self.token_cache_path {
            paths.token_cache = path.clone();
        }
        if let Some(path) = &self.selected_account_path {
            paths.selected_account = path.clone();
        }
        paths
    }
}

/// `true`, `1`, `yes` and `on` enable a flag, case-insensitively.
fn is_enabled(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

/// Load configuration from the default location, then apply the environment.
pub fn load_config() -> Result<CliConfig> {
    let config_path = project_dirs()
        .map(|d| d.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("graphbridge.toml"));

    let mut config = if config_path.exists() {
        CliConfig::from_file(&config_path)?
    } else {
        CliConfig {
            config_path,
            ..CliConfig::default()
        }
    };

    config.apply_env(|name| std::env::var(name).ok());
    Ok(config)
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "graphbridge", "graphbridge")
}
