//! Token types and the identity provider seam.
//!
//! This module provides:
//! - [`Token`] - An access token with its expiry
//! - [`AccountIdentity`] - Who a token was issued to
//! - [`AcquiredToken`] - Everything an identity provider hands back
//! - [`DeviceCodeInfo`] - Sign-in instructions for the device-code flow
//! - [`IdentityProvider`] - Trait for interactive acquisition and silent refresh

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{Secret, StoreError};

/// Error type for credential operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// No cached account is available to renew silently.
    #[error("no valid token found: {message}")]
    NotFound { message: String },

    /// Silent renewal failed; the user has to sign in again.
    #[error("silent token acquisition failed: {message}")]
    SilentAcquisitionFailed { message: String },

    /// The device-code flow did not complete.
    #[error("device code flow failed: {message}")]
    DeviceCodeFailed { message: String },

    /// The refresh grant was rejected.
    #[error("token refresh failed: {message}")]
    RefreshFailed { message: String },

    /// The identity platform returned something unusable.
    #[error("OAuth flow failed: {message}")]
    OAuthError { message: String },

    /// Network error talking to the identity platform.
    #[error("network error: {message}")]
    NetworkError { message: String },

    /// Storage error while persisting credentials.
    #[error("storage error: {0}")]
    StorageError(#[from] StoreError),
}

/// An access token with its expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    /// The bearer token value.
    pub access_token: Secret,

    /// When this token expires (None if unknown).
    pub expires_at: Option<DateTime<Utc>>,
}

impl Token {
    /// Create a token without expiry.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Secret::new(access_token),
            expires_at: None,
        }
    }

    /// Set the expiration time.
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Check if this token has expired.
    ///
    /// Returns `false` if no expiration is set.
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|exp| exp < Utc::now()).unwrap_or(false)
    }

    /// Check if this token will expire within the given duration.
    pub fn expires_within(&self, duration: chrono::Duration) -> bool {
        self.expires_at
            .map(|exp| exp < Utc::now() + duration)
            .unwrap_or(false)
    }
}

/// The account a token belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountIdentity {
    /// Stable account key (`oid.tid` on the Microsoft identity platform).
    pub home_account_id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Result of a device-code sign-in or a refresh grant.
#[derive(Debug, Clone)]
pub struct AcquiredToken {
    pub access_token: Secret,
    pub refresh_token: Option<Secret>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Present after interactive sign-in; refresh grants may omit it.
    pub account: Option<AccountIdentity>,
}

impl AcquiredToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Secret::new(access_token),
            refresh_token: None,
            expires_at: None,
            account: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(Secret::new(refresh_token));
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_account(mut self, account: AccountIdentity) -> Self {
        self.account = Some(account);
        self
    }

    /// The access token as a [`Token`].
    pub fn token(&self) -> Token {
        Token {
            access_token: self.access_token.clone(),
            expires_at: self.expires_at,
        }
    }
}

/// Instructions shown to the user during the device-code flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCodeInfo {
    pub user_code: String,
    pub verification_uri: String,
    /// Human-readable sign-in instruction.
    pub message: String,
    pub expires_in: u64,
}

/// Receives device-code instructions while sign-in is pending.
pub type DeviceCodeCallback<'a> = &'a (dyn Fn(&DeviceCodeInfo) + Send + Sync);

/// Interactive acquisition and silent refresh against an identity platform.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Run the device-code flow for `scopes`, reporting instructions through `callback`.
    async fn acquire_by_device_code(
        &self,
        scopes: &[String],
        callback: DeviceCodeCallback<'_>,
    ) -> Result<AcquiredToken, TokenError>;

    /// Exchange `refresh_token` for a new access token.
    async fn refresh(&self, refresh_token: &str, scopes: &[String]) -> Result<AcquiredToken, TokenError>;
}
