//! Integration tests for per-call credential isolation.
//!
//! Many concurrent calls, each bound to its own credential, must only ever
//! send their own token, even when their awaits interleave arbitrarily.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use graphbridge_core::{
    AuthManager, CallContext, CredentialPaths, CredentialStore, GraphClient, HttpRequest, HttpResponse,
    HttpTransport, IdentityProvider, TransportError,
};
use graphbridge_core::token::{AcquiredToken, DeviceCodeCallback, TokenError};
use parking_lot::Mutex;
use serde_json::json;
use tempfile::TempDir;

/// Transport that records the bearer token of every request and echoes it back.
#[derive(Default)]
struct RecordingTransport {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let token = request
            .header("Authorization")
            .and_then(|h| h.strip_prefix("Bearer "))
            .unwrap_or_default()
            .to_string();

        // Hold the request open for a pseudo-random time so calls interleave.
        let n: u64 = token.trim_start_matches("token-").parse().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis((n * 7919) % 23)).await;

        self.seen.lock().push(token.clone());
        Ok(HttpResponse::new(200, json!({ "token": token }).to_string()))
    }
}

struct NoProvider;

#[async_trait]
impl IdentityProvider for NoProvider {
    async fn acquire_by_device_code(
        &self,
        _scopes: &[String],
        _callback: DeviceCodeCallback<'_>,
    ) -> Result<AcquiredToken, TokenError> {
        Err(TokenError::DeviceCodeFailed {
            message: "not available".to_string(),
        })
    }

    async fn refresh(&self, _refresh_token: &str, _scopes: &[String]) -> Result<AcquiredToken, TokenError> {
        Err(TokenError::RefreshFailed {
            message: "not available".to_string(),
        })
    }
}

fn client(temp: &TempDir, transport: Arc<RecordingTransport>) -> Arc<GraphClient> {
    let auth = AuthManager::new(
        CredentialStore::file_only(CredentialPaths::in_dir(temp.path())),
        Arc::new(NoProvider),
        Vec::new(),
    );
    Arc::new(GraphClient::with_base_url(
        Arc::new(auth),
        transport,
        "https://graph.example.test/v1.0",
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_never_see_each_others_token() {
    let temp = TempDir::new().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let client = client(&temp, transport.clone());

    let handles: Vec<_> = (0..50)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(CallContext::new(format!("token-{}", i)).scope(async move {
                let me = client.get_me().await.unwrap();
                (i, me["token"].as_str().unwrap().to_string(), CallContext::current())
            }))
        })
        .collect();

    for handle in handles {
        let (i, echoed, ctx) = handle.await.unwrap();
        assert_eq!(echoed, format!("token-{}", i));
        assert_eq!(ctx.unwrap().access_token().expose(), format!("token-{}", i));
    }

    let mut seen = transport.seen.lock().clone();
    seen.sort();
    let mut expected: Vec<String> = (0..50).map(|i| format!("token-{}", i)).collect();
    expected.sort();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_interleaved_calls_in_one_task() {
    let temp = TempDir::new().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let client = client(&temp, transport);

    let a = CallContext::new("token-1").scope(client.get_me());
    let b = CallContext::new("token-2").scope(client.get_me());
    let (a, b) = tokio::join!(a, b);

    assert_eq!(a.unwrap()["token"], "token-1");
    assert_eq!(b.unwrap()["token"], "token-2");
}

#[tokio::test]
async fn test_no_context_uses_manager_token() {
    let temp = TempDir::new().unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let client = client(&temp, transport.clone());
    client.auth().set_external_token("token-99").await;

    let me = client.get_me().await.unwrap();
    assert_eq!(me["token"], "token-99");
    assert_eq!(*transport.seen.lock(), vec!["token-99".to_string()]);
}
