//! Credential lifecycle management.
//!
//! [`AuthManager`] owns the credential cache for one process: it signs accounts
//! in through an [`IdentityProvider`], renews tokens silently, tracks which
//! account is selected and persists everything through a [`CredentialStore`].
//!
//! All state sits behind one async mutex, so renewal, selection and logout
//! are each a single critical section.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use graphbridge_core::{AuthManager, CredentialStore, CredentialPaths};
//!
//! let store = CredentialStore::new(create_secure_store(true), CredentialPaths::default());
//! let manager = AuthManager::new(store, Arc::new(provider), scopes);
//! manager.load_cache().await;
//! let token = manager.get_token(false).await?;
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::client::GraphClient;
use crate::store::{CacheArtifact, CredentialStore, Secret, StoreError};
use crate::token::{AccountIdentity, DeviceCodeCallback, IdentityProvider, Token, TokenError};
use crate::token_cache::{AccountInfo, CachedAccount, SelectedAccount, TokenCache};

/// Default expiry buffer in minutes.
///
/// Tokens expiring within this window are renewed instead of reused.
const DEFAULT_EXPIRY_BUFFER_MINUTES: i64 = 5;

/// Lifecycle phase reported by [`AuthManager::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    /// The persisted cache has not been loaded yet.
    Uninitialized,
    /// An account is cached but holds no access token yet.
    Loaded,
    /// A usable access token is available.
    Valid,
    /// The active token has expired and needs renewal.
    Expired,
    /// No account and no external token.
    Unauthenticated,
}

/// Snapshot of the manager's state, without secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub phase: AuthPhase,
    pub external_token: bool,
    pub selected_account_id: Option<String>,
    pub account_count: usize,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Result of [`AuthManager::verify_login`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginCheck {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<UserData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub display_name: Option<String>,
    pub user_principal_name: Option<String>,
}

#[derive(Default)]
struct AuthState {
    loaded: bool,
    cache: TokenCache,
    selected_account_id: Option<String>,
    current: Option<Token>,
    external_token: Option<Secret>,
}

/// Owns the credential cache and hands out valid access tokens.
pub struct AuthManager {
    store: CredentialStore,
    provider: Arc<dyn IdentityProvider>,
    scopes: Vec<String>,
    expiry_buffer: Duration,
    state: Mutex<AuthState>,
}

impl AuthManager {
    /// Create a manager requesting `scopes`.
    ///
    /// Uses the default expiry buffer of 5 minutes.
    pub fn new(store: CredentialStore, provider: Arc<dyn IdentityProvider>, scopes: Vec<String>) -> Self {
        Self::with_expiry_buffer(store, provider, scopes, DEFAULT_EXPIRY_BUFFER_MINUTES)
    }

    /// Create a manager with a custom expiry buffer.
    pub fn with_expiry_buffer(
        store: CredentialStore,
        provider: Arc<dyn IdentityProvider>,
        scopes: Vec<String>,
        expiry_buffer_minutes: i64,
    ) -> Self {
        tracing::info!("Requesting scopes: {}", scopes.join(", "));
        Self {
            store,
            provider,
            scopes,
            expiry_buffer: Duration::minutes(expiry_buffer_minutes),
            state: Mutex::new(AuthState::default()),
        }
    }

    /// Scopes requested on sign-in and renewal.
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Identity provider used for sign-in and refresh.
    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    fn is_usable(&self, token: &Token) -> bool {
        token.expires_at.is_some() && !token.expires_within(self.expiry_buffer)
    }

    /// Load the persisted cache and selection marker.
    ///
    /// Failures are logged and leave the manager empty; they are never fatal.
    pub async fn load_cache(&self) {
        let mut state = self.state.lock().await;

        match self.store.load(CacheArtifact::TokenCache).await {
            Ok(Some(json)) => match TokenCache::from_json(&json) {
                Ok(cache) => state.cache = cache,
                Err(e) => tracing::error!("Error loading token cache: {}", e),
            },
            Ok(None) => {}
            Err(e) => tracing::error!("Error loading token cache: {}", e),
        }

        match self.store.load(CacheArtifact::SelectedAccount).await {
            Ok(Some(json)) => match serde_json::from_str::<SelectedAccount>(&json) {
                Ok(marker) => {
                    if let Some(id) = &marker.account_id {
                        tracing::info!("Loaded selected account: {}", id);
                    }
                    state.selected_account_id = marker.account_id;
                }
                Err(e) => tracing::error!("Error loading selected account: {}", e),
            },
            Ok(None) => {}
            Err(e) => tracing::error!("Error loading selected account: {}", e),
        }

        state.loaded = true;
    }

    /// Use `token` for every call, bypassing the cache.
    pub async fn set_external_token(&self, token: impl Into<String>) {
        self.state.lock().await.external_token = Some(Secret::new(token));
    }

    /// Whether a rejected token can be renewed: no external token is in use
    /// and the active account holds a refresh token.
    pub async fn has_refresh_material(&self) -> bool {
        let state = self.state.lock().await;
        if state.external_token.is_some() {
            return false;
        }
        resolve_account(&state)
            .and_then(|id| state.cache.find(&id).map(|a| a.refresh_token.is_some()))
            .unwrap_or(false)
    }

    /// Return a valid access token, renewing silently when needed.
    pub async fn get_token(&self, force_refresh: bool) -> Result<Secret, TokenError> {
        let mut state = self.state.lock().await;

        if let Some(external) = &state.external_token {
            return Ok(external.clone());
        }

        if !force_refresh {
            if let Some(current) = state.current.as_ref().filter(|t| self.is_usable(t)) {
                tracing::debug!("Using in-memory access token");
                return Ok(current.access_token.clone());
            }
        }

        let account_id = resolve_account(&state).ok_or_else(|| TokenError::NotFound {
            message: "no cached account; sign in first".to_string(),
        })?;

        let token = self.renew_silently(&mut state, &account_id, force_refresh).await?;
        let secret = token.access_token.clone();
        state.current = Some(token);
        Ok(secret)
    }

    async fn renew_silently(
        &self,
        state: &mut AuthState,
        account_id: &str,
        force_refresh: bool,
    ) -> Result<Token, TokenError> {
        let account = state
            .cache
            .find(account_id)
            .ok_or_else(|| TokenError::NotFound {
                message: format!("account {} is not cached", account_id),
            })?;

        if !force_refresh {
            if let Some(token) = account.token().filter(|t| self.is_usable(t)) {
                tracing::debug!("Using cached access token for {}", account.username);
                return Ok(token);
            }
        }

        let refresh_token = account.refresh_token.clone().ok_or_else(|| {
            tracing::error!("Silent token acquisition failed: no refresh token for {}", account.username);
            TokenError::SilentAcquisitionFailed {
                message: format!("no refresh token cached for {}", account.username),
            }
        })?;

        tracing::info!("Renewing access token for {}", account.username);
        let acquired = self
            .provider
            .refresh(refresh_token.expose(), &self.scopes)
            .await
            .map_err(|e| {
                tracing::error!("Silent token acquisition failed: {}", e);
                TokenError::SilentAcquisitionFailed {
                    message: e.to_string(),
                }
            })?;

        if let Some(account) = state.cache.find_mut(account_id) {
            account.apply(&acquired);
        }
        if let Err(e) = self.persist_cache(&state.cache).await {
            tracing::error!("Error saving token cache: {}", e);
        }

        Ok(acquired.token())
    }

    /// Sign in interactively with the device-code flow.
    ///
    /// The new account becomes selected only when none is selected yet.
    pub async fn acquire_by_device_code(
        &self,
        callback: DeviceCodeCallback<'_>,
    ) -> Result<AccountIdentity, TokenError> {
        tracing::info!("Requesting device code...");
        let acquired = self
            .provider
            .acquire_by_device_code(&self.scopes, callback)
            .await?;
        let identity = acquired.account.clone().ok_or_else(|| TokenError::DeviceCodeFailed {
            message: "identity provider returned no account".to_string(),
        })?;
        tracing::info!("Device code login successful");

        let mut state = self.state.lock().await;
        let mut cache = state.cache.clone();
        cache.upsert(CachedAccount::from_acquired(identity.clone(), &acquired));
        self.persist_cache(&cache).await?;
        state.cache = cache;

        if state.selected_account_id.is_none() {
            self.persist_selection(Some(&identity.home_account_id)).await?;
            state.selected_account_id = Some(identity.home_account_id.clone());
            tracing::info!("Auto-selected new account: {}", identity.username);
        }
        if resolve_account(&state).as_deref() == Some(identity.home_account_id.as_str()) {
            state.current = Some(acquired.token());
        }

        Ok(identity)
    }

    /// All cached accounts.
    pub async fn list_accounts(&self) -> Vec<AccountInfo> {
        let state = self.state.lock().await;
        let selected = resolve_account(&state);
        state
            .cache
            .accounts()
            .iter()
            .map(|a| AccountInfo {
                home_account_id: a.home_account_id.clone(),
                username: a.username.clone(),
                name: a.name.clone(),
                is_selected: selected.as_deref() == Some(a.home_account_id.as_str()),
            })
            .collect()
    }

    /// Explicitly selected account id.
    pub async fn selected_account_id(&self) -> Option<String> {
        self.state.lock().await.selected_account_id.clone()
    }

    /// Select a cached account. Returns `false` if it is unknown.
    pub async fn select_account(&self, account_id: &str) -> Result<bool, TokenError> {
        let mut state = self.state.lock().await;
        let Some(account) = state.cache.find(account_id) else {
            tracing::error!("Account with ID {} not found", account_id);
            return Ok(false);
        };
        let username = account.username.clone();

        self.persist_selection(Some(account_id)).await?;
        state.selected_account_id = Some(account_id.to_string());
        state.current = None;

        tracing::info!("Selected account: {} ({})", username, account_id);
        Ok(true)
    }

    /// Remove a cached account. Returns `false` if it is unknown.
    pub async fn remove_account(&self, account_id: &str) -> Result<bool, TokenError> {
        let mut state = self.state.lock().await;
        let mut cache = state.cache.clone();
        if !cache.remove(account_id) {
            tracing::error!("Account with ID {} not found", account_id);
            return Ok(false);
        }

        self.persist_cache(&cache).await?;
        state.cache = cache;
        state.current = None;
        if state.selected_account_id.as_deref() == Some(account_id) {
            self.persist_selection(None).await?;
            state.selected_account_id = None;
        }

        tracing::info!("Removed account: {}", account_id);
        Ok(true)
    }

    /// Forget every account and delete both persisted artifacts.
    pub async fn logout(&self) -> Result<(), TokenError> {
        let mut state = self.state.lock().await;
        state.cache.clear();
        state.selected_account_id = None;
        state.current = None;

        let cache = self.store.delete(CacheArtifact::TokenCache).await;
        let selection = self.store.delete(CacheArtifact::SelectedAccount).await;
        cache?;
        selection?;
        tracing::info!("Logged out");
        Ok(())
    }

    /// Report the current lifecycle phase.
    pub async fn status(&self) -> AuthStatus {
        let state = self.state.lock().await;
        let active = resolve_account(&state);
        let token = state
            .current
            .clone()
            .or_else(|| active.as_deref().and_then(|id| state.cache.find(id)).and_then(CachedAccount::token));

        let phase = if state.external_token.is_some() {
            AuthPhase::Valid
        } else if !state.loaded {
            AuthPhase::Uninitialized
        } else if active.is_none() {
            AuthPhase::Unauthenticated
        } else {
            match &token {
                None => AuthPhase::Loaded,
                Some(t) if t.is_expired() => AuthPhase::Expired,
                Some(_) => AuthPhase::Valid,
            }
        };

        AuthStatus {
            phase,
            external_token: state.external_token.is_some(),
            selected_account_id: state.selected_account_id.clone(),
            account_count: state.cache.accounts().len(),
            expires_at: token.and_then(|t| t.expires_at),
        }
    }

    /// Check that a token can be obtained and that Graph accepts it.
    pub async fn verify_login(&self, client: &GraphClient) -> LoginCheck {
        tracing::info!("Testing login...");
        if let Err(e) = self.get_token(false).await {
            tracing::error!("Login test failed: {}", e);
            return LoginCheck {
                success: false,
                message: format!("Login failed: {}", e),
                user_data: None,
            };
        }

        match client.get_me().await {
            Ok(me) => LoginCheck {
                success: true,
                message: "Login successful".to_string(),
                user_data: Some(UserData {
                    display_name: me.get("displayName").and_then(Value::as_str).map(String::from),
                    user_principal_name: me
                        .get("userPrincipalName")
                        .and_then(Value::as_str)
                        .map(String::from),
                }),
            },
            Err(e) => {
                tracing::error!("Graph API user data fetch failed: {}", e);
                LoginCheck {
                    success: false,
                    message: format!("Login successful but Graph API access failed: {}", e),
                    user_data: None,
                }
            }
        }
    }

    async fn persist_cache(&self, cache: &TokenCache) -> Result<(), StoreError> {
        let json = cache.to_json()?;
        self.store.save(CacheArtifact::TokenCache, &json).await
    }

    async fn persist_selection(&self, account_id: Option<&str>) -> Result<(), StoreError> {
        let marker = SelectedAccount {
            account_id: account_id.map(String::from),
        };
        let json = serde_json::to_string(&marker)?;
        self.store.save(CacheArtifact::SelectedAccount, &json).await
    }
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("store", &self.store)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

/// Selected account if still cached, else the first cached account.
fn resolve_account(state: &AuthState) -> Option<String> {
    if let Some(selected) = &state.selected_account_id {
        if state.cache.find(selected).is_some() {
            return Some(selected.clone());
        }
        if !state.cache.is_empty() {
            tracing::warn!("Selected account {} not found, falling back to first account", selected);
        }
    }
    state.cache.accounts().first().map(|a| a.home_account_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CredentialPaths;
    use crate::token::{AcquiredToken, DeviceCodeInfo};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct StaticProvider {
        refreshes: AtomicUsize,
    }

    #[async_trait]
    impl IdentityProvider for StaticProvider {
        async fn acquire_by_device_code(
            &self,
            _scopes: &[String],
            callback: DeviceCodeCallback<'_>,
        ) -> Result<AcquiredToken, TokenError> {
            callback(&DeviceCodeInfo {
                user_code: "ABCD".to_string(),
                verification_uri: "https://microsoft.com/devicelogin".to_string(),
                message: "enter ABCD".to_string(),
                expires_in: 900,
            });
            Ok(AcquiredToken::new("device-token")
                .with_refresh_token("device-refresh")
                .with_expiry(Utc::now() + Duration::hours(1))
                .with_account(AccountIdentity {
                    home_account_id: "oid.tid".to_string(),
                    username: "ada@example.com".to_string(),
                    name: Some("Ada".to_string()),
                }))
        }

        async fn refresh(&self, _refresh_token: &str, _scopes: &[String]) -> Result<AcquiredToken, TokenError> {
            let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AcquiredToken::new(format!("refreshed-{}", n)).with_expiry(Utc::now() + Duration::hours(1)))
        }
    }

    fn setup_manager(temp: &TempDir) -> (AuthManager, Arc<StaticProvider>) {
        let provider = Arc::new(StaticProvider {
            refreshes: AtomicUsize::new(0),
        });
        let store = CredentialStore::file_only(CredentialPaths::in_dir(temp.path()));
        let manager = AuthManager::new(store, provider.clone(), vec!["User.Read".to_string()]);
        (manager, provider)
    }

    #[tokio::test]
    async fn test_get_token_without_account_is_not_found() {
        let temp = TempDir::new().unwrap();
        let (manager, _) = setup_manager(&temp);
        manager.load_cache().await;

        let result = manager.get_token(false).await;
        assert!(matches!(result, Err(TokenError::NotFound { .. })));
        assert_eq!(manager.status().await.phase, AuthPhase::Unauthenticated);
    }

    #[tokio::test]
    async fn test_status_before_load_is_uninitialized() {
        let temp = TempDir::new().unwrap();
        let (manager, _) = setup_manager(&temp);
        assert_eq!(manager.status().await.phase, AuthPhase::Uninitialized);
    }

    #[tokio::test]
    async fn test_external_token_wins() {
        let temp = TempDir::new().unwrap();
        let (manager, _) = setup_manager(&temp);
        manager.set_external_token("external").await;

        assert_eq!(manager.get_token(true).await.unwrap().expose(), "external");
        assert!(manager.status().await.external_token);
    }

    #[tokio::test]
    async fn test_device_code_then_forced_refresh() {
        let temp = TempDir::new().unwrap();
        let (manager, provider) = setup_manager(&temp);
        manager.load_cache().await;

        let identity = manager.acquire_by_device_code(&|_info: &DeviceCodeInfo| {}).await.unwrap();
        assert_eq!(identity.home_account_id, "oid.tid");
        assert_eq!(manager.selected_account_id().await.as_deref(), Some("oid.tid"));
        assert_eq!(manager.get_token(false).await.unwrap().expose(), "device-token");

        assert_eq!(manager.get_token(true).await.unwrap().expose(), "refreshed-1");
        assert_eq!(provider.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(manager.status().await.phase, AuthPhase::Valid);
    }

    #[tokio::test]
    async fn test_refresh_material_follows_active_account() {
        let temp = TempDir::new().unwrap();
        let (manager, _) = setup_manager(&temp);
        manager.load_cache().await;
        assert!(!manager.has_refresh_material().await);

        manager.acquire_by_device_code(&|_info: &DeviceCodeInfo| {}).await.unwrap();
        assert!(manager.has_refresh_material().await);

        manager.set_external_token("external").await;
        assert!(!manager.has_refresh_material().await);
    }

    #[tokio::test]
    async fn test_failed_cache_write_leaves_state_untouched() {
        let temp = TempDir::new().unwrap();
        let paths = CredentialPaths::in_dir(temp.path());
        std::fs::create_dir_all(&paths.token_cache).unwrap();
        let provider = Arc::new(StaticProvider {
            refreshes: AtomicUsize::new(0),
        });
        let manager = AuthManager::new(CredentialStore::file_only(paths), provider, vec![]);
        manager.load_cache().await;

        let result = manager.acquire_by_device_code(&|_info: &DeviceCodeInfo| {}).await;
        assert!(matches!(result, Err(TokenError::StorageError(_))));
        assert!(manager.list_accounts().await.is_empty());
        assert!(manager.selected_account_id().await.is_none());
        assert_eq!(manager.status().await.phase, AuthPhase::Unauthenticated);
    }

    #[tokio::test]
    async fn test_failed_selection_write_keeps_previous_selection() {
        let temp = TempDir::new().unwrap();
        let paths = CredentialPaths::in_dir(temp.path());
        std::fs::create_dir_all(&paths.selected_account).unwrap();
        let provider = Arc::new(StaticProvider {
            refreshes: AtomicUsize::new(0),
        });
        let manager = AuthManager::new(CredentialStore::file_only(paths), provider, vec![]);
        manager.load_cache().await;

        // The cache write lands; only the auto-selection fails.
        assert!(manager.acquire_by_device_code(&|_info: &DeviceCodeInfo| {}).await.is_err());
        assert_eq!(manager.list_accounts().await.len(), 1);
        assert!(manager.selected_account_id().await.is_none());

        assert!(manager.select_account("oid.tid").await.is_err());
        assert!(manager.selected_account_id().await.is_none());
    }
}
