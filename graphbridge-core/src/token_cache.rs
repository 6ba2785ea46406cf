//! Serialized credential cache.
//!
//! The cache holds every signed-in account with its tokens. It is persisted
//! as one JSON document through the [`CredentialStore`](crate::store::CredentialStore),
//! next to a separate `{ "accountId": ... }` selection marker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Secret;
use crate::token::{AccountIdentity, AcquiredToken, Token};

const CACHE_VERSION: u32 = 1;

/// One signed-in account and its tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedAccount {
    pub home_account_id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<Secret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<Secret>,
}

impl CachedAccount {
    /// Build a cache entry from a freshly acquired token.
    pub fn from_acquired(identity: AccountIdentity, acquired: &AcquiredToken) -> Self {
        Self {
            home_account_id: identity.home_account_id,
            username: identity.username,
            name: identity.name,
            access_token: Some(acquired.access_token.clone()),
            expires_at: acquired.expires_at,
            refresh_token: acquired.refresh_token.clone(),
        }
    }

    /// Store a renewed token, keeping the old refresh token if none was issued.
    pub fn apply(&mut self, acquired: &AcquiredToken) {
        self.access_token = Some(acquired.access_token.clone());
        self.expires_at = acquired.expires_at;
        if let Some(refresh_token) = &acquired.refresh_token {
            self.refresh_token = Some(refresh_token.clone());
        }
    }

    /// The cached access token, if any.
    pub fn token(&self) -> Option<Token> {
        self.access_token.as_ref().map(|access_token| Token {
            access_token: access_token.clone(),
            expires_at: self.expires_at,
        })
    }

    pub fn identity(&self) -> AccountIdentity {
        AccountIdentity {
            home_account_id: self.home_account_id.clone(),
            username: self.username.clone(),
            name: self.name.clone(),
        }
    }
}

/// Public view of a cached account, without tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub home_account_id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub is_selected: bool,
}

/// All cached accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenCache {
    version: u32,
    accounts: Vec<CachedAccount>,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION,
            accounts: Vec::new(),
        }
    }
}

impl TokenCache {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn accounts(&self) -> &[CachedAccount] {
        &self.accounts
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn find(&self, home_account_id: &str) -> Option<&CachedAccount> {
        self.accounts.iter().find(|a| a.home_account_id == home_account_id)
    }

    pub fn find_mut(&mut self, home_account_id: &str) -> Option<&mut CachedAccount> {
        self.accounts
            .iter_mut()
            .find(|a| a.home_account_id == home_account_id)
    }

    /// Insert or replace the entry with the same home account id.
    pub fn upsert(&mut self, account: CachedAccount) {
        match self.find_mut(&account.home_account_id) {
            Some(existing) => *existing = account,
            None => self.accounts.push(account),
        }
    }

    /// Remove an account. Returns whether it was present.
    pub fn remove(&mut self, home_account_id: &str) -> bool {
        let before = self.accounts.len();
        self.accounts.retain(|a| a.home_account_id != home_account_id);
        self.accounts.len() != before
    }

    pub fn clear(&mut self) {
        self.accounts.clear();
    }
}

/// Persisted selection marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedAccount {
    pub account_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: &str) -> CachedAccount {
        CachedAccount {
            home_account_id: id.to_string(),
            username: format!("{}@example.com", id),
            name: None,
            access_token: Some(Secret::new(format!("token-{}", id))),
            expires_at: None,
            refresh_token: Some(Secret::new(format!("refresh-{}", id))),
        }
    }

    #[test]
    fn test_upsert_replaces_existing() {
        let mut cache = TokenCache::default();
        cache.upsert(account("a"));
        cache.upsert(account("b"));

        let mut updated = account("a");
        updated.username = "renamed@example.com".to_string();
        cache.upsert(updated);

        assert_eq!(cache.accounts().len(), 2);
        assert_eq!(cache.find("a").unwrap().username, "renamed@example.com");
        assert_eq!(cache.accounts()[0].home_account_id, "a");
    }

    #[test]
    fn test_remove_reports_presence() {
        let mut cache = TokenCache::default();
        cache.upsert(account("a"));
        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_apply_keeps_refresh_token_when_absent() {
        let mut cached = account("a");
        cached.apply(&AcquiredToken::new("new-token"));
        assert_eq!(cached.access_token.as_ref().unwrap().expose(), "new-token");
        assert_eq!(cached.refresh_token.as_ref().unwrap().expose(), "refresh-a");
    }

    #[test]
    fn test_json_shape() {
        let mut cache = TokenCache::default();
        cache.upsert(account("oid.tid"));
        let json = cache.to_json().unwrap();
        assert!(json.contains("\"homeAccountId\":\"oid.tid\""));

        let restored = TokenCache::from_json(&json).unwrap();
        assert_eq!(restored.find("oid.tid").unwrap().username, "oid.tid@example.com");

        let marker = serde_json::to_string(&SelectedAccount {
            account_id: Some("oid.tid".to_string()),
        })
        .unwrap();
        assert_eq!(marker, r#"{"accountId":"oid.tid"}"#);
    }
}
