//! Device Authorization Grant flow (RFC 8628).
//!
//! This module implements the OAuth 2.0 Device Authorization Grant flow
//! against the Microsoft identity platform.
//!
//! # Flow Overview
//!
//! 1. Request device and user codes from the authorization server
//! 2. Display the user code and verification URL to the user
//! 3. User visits the URL on another device and enters the code
//! 4. Poll the token endpoint until the user authorizes or denies
//! 5. Receive tokens once authorization is complete

use oauth2::{Scope, StandardDeviceAuthorizationResponse, reqwest::async_http_client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use super::{OAuthEndpoints, TokenResponse, create_oauth_client};
use crate::cloud::AppSecrets;
use crate::token::{DeviceCodeInfo, TokenError};

/// Grant type used while polling the token endpoint.
const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Extra wait added when the server answers `slow_down`.
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// Device authorization response.
///
/// Contains the codes and URIs needed for the user to authorize the device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceAuthorization {
    /// The device verification code (keep this secret).
    pub device_code: String,

    /// The user verification code to display to the user.
    pub user_code: String,

    /// The URI where the user should go to authorize.
    pub verification_uri: String,

    /// Minimum interval in seconds between polling requests.
    pub interval: u64,

    /// Time in seconds until the device code expires.
    pub expires_in: u64,
}

impl DeviceAuthorization {
    /// Instructions to show the user.
    pub fn info(&self) -> DeviceCodeInfo {
        DeviceCodeInfo {
            user_code: self.user_code.clone(),
            verification_uri: self.verification_uri.clone(),
            message: format!(
                "To sign in, use a web browser to open the page {} and enter the code {} to authenticate.",
                self.verification_uri, self.user_code
            ),
            expires_in: self.expires_in,
        }
    }
}

/// Device code flow for one client registration.
pub struct DeviceCodeFlow<'a> {
    secrets: &'a AppSecrets,
    endpoints: &'a OAuthEndpoints,
    http: &'a reqwest::Client,
}

impl<'a> DeviceCodeFlow<'a> {
    pub fn new(secrets: &'a AppSecrets, endpoints: &'a OAuthEndpoints, http: &'a reqwest::Client) -> Self {
        Self {
            secrets,
            endpoints,
            http,
        }
    }

    /// Request device and user codes from the authorization server.
    pub async fn request_device_code(&self, scopes: &[String]) -> Result<DeviceAuthorization, TokenError> {
        let client = create_oauth_client(self.secrets, self.endpoints)?;

        let mut request = client
            .exchange_device_code()
            .map_err(|e| TokenError::DeviceCodeFailed {
                message: format!("failed to create device code request: {}", e),
            })?;
        for scope in scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }

        let response: StandardDeviceAuthorizationResponse = request
            .request_async(async_http_client)
            .await
            .map_err(|e| TokenError::DeviceCodeFailed {
                message: format!("device code request failed: {}", e),
            })?;

        Ok(DeviceAuthorization {
            device_code: response.device_code().secret().to_string(),
            user_code: response.user_code().secret().to_string(),
            verification_uri: response.verification_uri().to_string(),
            interval: response.interval().as_secs(),
            expires_in: response.expires_in().as_secs(),
        })
    }

    /// Poll the token endpoint until the user authorizes or the code expires.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The user denies the request
    /// - The device code expires
    /// - The authorization server returns an error
    pub async fn poll_for_token(&self, device_auth: &DeviceAuthorization) -> Result<TokenResponse, TokenError> {
        let mut poll_interval = Duration::from_secs(device_auth.interval);
        let timeout = Duration::from_secs(device_auth.expires_in);
        let start_time = std::time::Instant::now();

        let mut form = vec![
            ("grant_type", DEVICE_CODE_GRANT),
            ("client_id", self.secrets.client_id.as_str()),
            ("device_code", device_auth.device_code.as_str()),
        ];
        if let Some(secret) = &self.secrets.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        loop {
            if start_time.elapsed() > timeout {
                return Err(TokenError::DeviceCodeFailed {
                    message: "device code expired".to_string(),
                });
            }

            sleep(poll_interval).await;

            let response = self
                .http
                .post(&self.endpoints.token_url)
                .form(&form)
                .send()
                .await
                .map_err(|e| TokenError::NetworkError {
                    message: format!("network error during polling: {}", e),
                })?;

            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.is_success() {
                return serde_json::from_str(&body).map_err(|e| TokenError::OAuthError {
                    message: format!("failed to parse token response: {}", e),
                });
            }

            let error_code = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v["error"].as_str().map(String::from))
                .ok_or_else(|| TokenError::DeviceCodeFailed {
                    message: format!("unexpected error response: {}", body),
                })?;

            match error_code.as_str() {
                "authorization_pending" => {
                    tracing::debug!("Authorization pending, continuing to poll...");
                }
                "slow_down" => {
                    tracing::warn!("Polling too fast, slowing down...");
                    poll_interval += SLOW_DOWN_STEP;
                }
                "access_denied" | "authorization_declined" => {
                    return Err(TokenError::DeviceCodeFailed {
                        message: "user denied authorization".to_string(),
                    });
                }
                "expired_token" => {
                    return Err(TokenError::DeviceCodeFailed {
                        message: "device code expired".to_string(),
                    });
                }
                other => {
                    return Err(TokenError::DeviceCodeFailed {
                        message: format!("OAuth error: {}", other),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_authorization_message() {
        let auth = DeviceAuthorization {
            device_code: "device".to_string(),
            user_code: "F7K2-QX".to_string(),
            verification_uri: "https://microsoft.com/devicelogin".to_string(),
            interval: 5,
            expires_in: 900,
        };

        let info = auth.info();
        assert_eq!(
            info.message,
            "To sign in, use a web browser to open the page https://microsoft.com/devicelogin and enter the code F7K2-QX to authenticate."
        );
        assert_eq!(info.expires_in, 900);
    }
}
