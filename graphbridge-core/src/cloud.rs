//! Microsoft cloud environments and application identity.
//!
//! - [`CloudType`] - Public (`global`) or 21Vianet-operated (`china`) cloud
//! - [`CloudEndpoints`] - Login authority, Graph API and portal base URLs
//! - [`AppSecrets`] - Client registration used for sign-in and refresh

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Graph API version segment prefixed to every request path.
pub const GRAPH_API_VERSION: &str = "v1.0";

/// Tenant used when none is configured.
pub const DEFAULT_TENANT_ID: &str = "common";

/// Microsoft cloud environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudType {
    #[default]
    Global,
    China,
}

/// Base URLs for one cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloudEndpoints {
    pub authority: &'static str,
    pub graph_api: &'static str,
    pub portal: &'static str,
}

impl CloudType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::China => "china",
        }
    }

    pub fn endpoints(&self) -> CloudEndpoints {
        match self {
            Self::Global => CloudEndpoints {
                authority: "https://login.microsoftonline.com",
                graph_api: "https://graph.microsoft.com",
                portal: "https://portal.azure.com",
            },
            Self::China => CloudEndpoints {
                authority: "https://login.chinacloudapi.cn",
                graph_api: "https://microsoftgraph.chinacloudapi.cn",
                portal: "https://portal.azure.cn",
            },
        }
    }

    /// Pre-registered public client application for this cloud.
    pub fn default_client_id(&self) -> &'static str {
        match self {
            Self::Global => "084a3e9f-a9f4-43f7-89f9-d229cf97853e",
            Self::China => "f3e61a6e-bc26-4281-8588-2c7359a02141",
        }
    }

    /// Graph base URL including the API version, e.g. `https://graph.microsoft.com/v1.0`.
    pub fn graph_base_url(&self) -> String {
        format!("{}/{}", self.endpoints().graph_api, GRAPH_API_VERSION)
    }
}

impl fmt::Display for CloudType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloudType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "global" => Ok(Self::Global),
            "china" => Ok(Self::China),
            _ => Err(ConfigError::InvalidCloudType {
                value: s.to_string(),
            }),
        }
    }
}

/// Parse an optional cloud selector. Absent or empty means [`CloudType::Global`].
pub fn parse_cloud_type(value: Option<&str>) -> Result<CloudType, ConfigError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(CloudType::Global),
        Some(v) => v.parse(),
    }
}

/// Client registration used against the identity platform.
#[derive(Clone, PartialEq, Eq)]
pub struct AppSecrets {
    pub client_id: String,
    pub tenant_id: String,
    pub client_secret: Option<String>,
    pub cloud: CloudType,
}

impl AppSecrets {
    /// Public client for `cloud` with the default client id and tenant.
    pub fn for_cloud(cloud: CloudType) -> Self {
        Self {
            client_id: cloud.default_client_id().to_string(),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            client_secret: None,
            cloud,
        }
    }

    /// Read `GRAPHBRIDGE_CLOUD_TYPE`, `GRAPHBRIDGE_CLIENT_ID`,
    /// `GRAPHBRIDGE_TENANT_ID` and `GRAPHBRIDGE_CLIENT_SECRET`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let cloud = parse_cloud_type(non_empty("GRAPHBRIDGE_CLOUD_TYPE").as_deref())?;
        let mut secrets = Self::for_cloud(cloud);
        if let Some(client_id) = non_empty("GRAPHBRIDGE_CLIENT_ID") {
            secrets.client_id = client_id;
        }
        if let Some(tenant_id) = non_empty("GRAPHBRIDGE_TENANT_ID") {
            secrets.tenant_id = tenant_id;
        }
        secrets.client_secret = non_empty("GRAPHBRIDGE_CLIENT_SECRET");
        Ok(secrets)
    }

    /// `{authority}/{tenant}/oauth2/v2.0`.
    pub fn oauth_base_url(&self) -> String {
        format!("{}/{}/oauth2/v2.0", self.cloud.endpoints().authority, self.tenant_id)
    }
}

impl fmt::Debug for AppSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppSecrets")
            .field("client_id", &self.client_id)
            .field("tenant_id", &self.tenant_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("cloud", &self.cloud)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_cloud_type() {
        assert_eq!(parse_cloud_type(None).unwrap(), CloudType::Global);
        assert_eq!(parse_cloud_type(Some("  China ")).unwrap(), CloudType::China);
        assert!(matches!(
            parse_cloud_type(Some("mars")),
            Err(ConfigError::InvalidCloudType { .. })
        ));
    }

    #[test]
    fn test_china_endpoints() {
        let cloud = CloudType::China;
        assert_eq!(cloud.graph_base_url(), "https://microsoftgraph.chinacloudapi.cn/v1.0");
        assert_eq!(cloud.default_client_id(), "f3e61a6e-bc26-4281-8588-2c7359a02141");
    }

    #[test]
    fn test_secrets_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("GRAPHBRIDGE_CLOUD_TYPE", "china"),
            ("GRAPHBRIDGE_TENANT_ID", "contoso.onmicrosoft.com"),
            ("GRAPHBRIDGE_CLIENT_SECRET", ""),
        ]);
        let secrets = AppSecrets::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(secrets.cloud, CloudType::China);
        assert_eq!(secrets.client_id, CloudType::China.default_client_id());
        assert_eq!(secrets.tenant_id, "contoso.onmicrosoft.com");
        assert!(secrets.client_secret.is_none());
        assert_eq!(
            secrets.oauth_base_url(),
            "https://login.chinacloudapi.cn/contoso.onmicrosoft.com/oauth2/v2.0"
        );
    }

    #[test]
    fn test_debug_redacts_client_secret() {
        let mut secrets = AppSecrets::for_cloud(CloudType::Global);
        secrets.client_secret = Some("hunter2".to_string());
        let debug = format!("{:?}", secrets);
        assert!(!debug.contains("hunter2"));
    }
}
