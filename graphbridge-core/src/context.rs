//! Per-call credential binding.
//!
//! A [`CallContext`] is bound to the async extent of one logical call with
//! [`CallContext::scope`]. Everything awaited inside that extent sees the
//! binding through [`CallContext::current`]; concurrent extents never see each
//! other's binding, and code outside any extent sees `None`.

use std::future::Future;

use crate::store::Secret;

tokio::task_local! {
    static CURRENT: CallContext;
}

/// Credentials for one logical call. Immutable once created.
#[derive(Debug, Clone)]
pub struct CallContext {
    access_token: Secret,
    refresh_token: Option<Secret>,
}

impl CallContext {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Secret::new(access_token),
            refresh_token: None,
        }
    }

    /// Attach refresh material used for the single 401 retry.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(Secret::new(refresh_token));
        self
    }

    pub fn access_token(&self) -> &Secret {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&Secret> {
        self.refresh_token.as_ref()
    }

    /// Run `future` with `self` bound as the current context.
    pub async fn scope<F>(self, future: F) -> F::Output
    where
        F: Future,
    {
        CURRENT.scope(self, future).await
    }

    /// The context bound to the running call, if any.
    pub fn current() -> Option<CallContext> {
        CURRENT.try_with(Clone::clone).ok()
    }

    /// Spawn `future` on the runtime, carrying the current binding into it.
    ///
    /// Spawned tasks do not inherit task-locals, so work that outlives the
    /// caller's poll must be launched through here to keep its credentials.
    pub fn spawn<F>(future: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        match Self::current() {
            Some(ctx) => tokio::spawn(CURRENT.scope(ctx, future)),
            None => tokio::spawn(future),
        }
    }
}
