//! Microsoft identity platform client.
//!
//! - [`MicrosoftIdentityProvider`] - [`IdentityProvider`] backed by the
//!   `oauth2/v2.0` endpoints of the configured cloud and tenant
//! - [`device_code`] - Device Authorization Grant flow
//!
//! # Features
//!
//! This module is only available when the `oauth` feature is enabled.

pub mod device_code;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use oauth2::{AuthType, AuthUrl, ClientId, ClientSecret, DeviceAuthorizationUrl, TokenUrl, basic::BasicClient};
use serde::Deserialize;

use crate::cloud::AppSecrets;
use crate::token::{AccountIdentity, AcquiredToken, DeviceCodeCallback, IdentityProvider, TokenError};

use self::device_code::DeviceCodeFlow;

/// Scopes added to every sign-in so the response carries a refresh token
/// and an id_token.
pub const RESERVED_SCOPES: &[&str] = &["offline_access", "openid", "profile"];

/// Endpoint URLs under one `oauth2/v2.0` base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthEndpoints {
    pub authorize_url: String,
    pub device_code_url: String,
    pub token_url: String,
}

impl OAuthEndpoints {
    pub fn from_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            authorize_url: format!("{}/authorize", base),
            device_code_url: format!("{}/devicecode", base),
            token_url: format!("{}/token", base),
        }
    }
}

/// Successful token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub id_token: Option<String>,
}

/// Claims read from an id_token payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdTokenClaims {
    #[serde(default)]
    pub oid: Option<String>,
    #[serde(default)]
    pub tid: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl IdTokenClaims {
    /// Account identity; the home account id is `{oid}.{tid}`.
    pub fn identity(&self) -> AccountIdentity {
        let home_account_id = match (&self.oid, &self.tid) {
            (Some(oid), Some(tid)) => format!("{}.{}", oid, tid),
            _ => uuid::Uuid::new_v4().to_string(),
        };
        AccountIdentity {
            home_account_id,
            username: self
                .preferred_username
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            name: self.name.clone(),
        }
    }
}

/// Decode the payload of a JWT without verifying its signature.
///
/// The token comes straight from the token endpoint over TLS; it is only
/// read to label the cached account.
pub fn decode_id_token(jwt: &str) -> Option<IdTokenClaims> {
    let payload = jwt.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

impl TokenResponse {
    fn into_acquired(self) -> AcquiredToken {
        let account = self
            .id_token
            .as_deref()
            .and_then(decode_id_token)
            .map(|claims| claims.identity());

        let mut acquired = AcquiredToken::new(self.access_token);
        if let Some(refresh_token) = self.refresh_token {
            acquired = acquired.with_refresh_token(refresh_token);
        }
        if let Some(expires_in) = self.expires_in {
            acquired = acquired.with_expiry(Utc::now() + Duration::seconds(expires_in));
        }
        if let Some(account) = account {
            acquired = acquired.with_account(account);
        }
        acquired
    }
}

/// Create an OAuth2 client for the device authorization request.
pub fn create_oauth_client(secrets: &AppSecrets, endpoints: &OAuthEndpoints) -> Result<BasicClient, TokenError> {
    let auth_url = AuthUrl::new(endpoints.authorize_url.clone()).map_err(|e| TokenError::OAuthError {
        message: format!("invalid auth URL: {}", e),
    })?;

    let token_url = TokenUrl::new(endpoints.token_url.clone()).map_err(|e| TokenError::OAuthError {
        message: format!("invalid token URL: {}", e),
    })?;

    let device_url =
        DeviceAuthorizationUrl::new(endpoints.device_code_url.clone()).map_err(|e| TokenError::OAuthError {
            message: format!("invalid device authorization URL: {}", e),
        })?;

    Ok(BasicClient::new(
        ClientId::new(secrets.client_id.clone()),
        secrets.client_secret.clone().map(ClientSecret::new),
        auth_url,
        Some(token_url),
    )
    .set_auth_type(AuthType::RequestBody)
    .set_device_authorization_url(device_url))
}

/// Requested scopes plus [`RESERVED_SCOPES`], without duplicates.
fn with_reserved_scopes(scopes: &[String]) -> Vec<String> {
    let mut all: Vec<String> = scopes.to_vec();
    for reserved in RESERVED_SCOPES {
        if !all.iter().any(|s| s == reserved) {
            all.push(reserved.to_string());
        }
    }
    all
}

/// Identity provider for the Microsoft identity platform.
pub struct MicrosoftIdentityProvider {
    secrets: AppSecrets,
    endpoints: OAuthEndpoints,
    http: reqwest::Client,
}

impl MicrosoftIdentityProvider {
    pub fn new(secrets: AppSecrets) -> Self {
        let base = secrets.oauth_base_url();
        Self::with_oauth_base_url(secrets, &base)
    }

    /// Provider talking to a custom `oauth2/v2.0` base URL.
    pub fn with_oauth_base_url(secrets: AppSecrets, base: &str) -> Self {
        Self {
            secrets,
            endpoints: OAuthEndpoints::from_base(base),
            http: reqwest::Client::new(),
        }
    }

    pub fn endpoints(&self) -> &OAuthEndpoints {
        &self.endpoints
    }
}

impl std::fmt::Debug for MicrosoftIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MicrosoftIdentityProvider")
            .field("secrets", &self.secrets)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

#[async_trait]
impl IdentityProvider for MicrosoftIdentityProvider {
    async fn acquire_by_device_code(
        &self,
        scopes: &[String],
        callback: DeviceCodeCallback<'_>,
    ) -> Result<AcquiredToken, TokenError> {
        let flow = DeviceCodeFlow::new(&self.secrets, &self.endpoints, &self.http);

        let device_auth = flow.request_device_code(&with_reserved_scopes(scopes)).await?;
        callback(&device_auth.info());

        let response = flow.poll_for_token(&device_auth).await?;
        let mut acquired = response.into_acquired();
        if acquired.account.is_none() {
            tracing::warn!("Token response carried no id_token; generating an account id");
            acquired = acquired.with_account(IdTokenClaims::default().identity());
        }
        Ok(acquired)
    }

    async fn refresh(&self, refresh_token: &str, scopes: &[String]) -> Result<AcquiredToken, TokenError> {
        let scope = with_reserved_scopes(scopes).join(" ");
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("client_id", self.secrets.client_id.as_str()),
            ("refresh_token", refresh_token),
            ("scope", scope.as_str()),
        ];
        if let Some(secret) = &self.secrets.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| TokenError::NetworkError {
                message: format!("token refresh request failed: {}", e),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| TokenError::NetworkError {
            message: format!("failed to read token response: {}", e),
        })?;

        if !status.is_success() {
            let reason = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v["error_description"].as_str().or(v["error"].as_str()).map(String::from))
                .unwrap_or(body);
            return Err(TokenError::RefreshFailed {
                message: format!("{}: {}", status, reason),
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| TokenError::RefreshFailed {
            message: format!("failed to parse token response: {}", e),
        })?;
        Ok(parsed.into_acquired())
    }
}
