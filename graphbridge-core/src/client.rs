//! Graph request execution and pagination.
//!
//! [`GraphClient`] sends a compiled [`RequestDescriptor`], retries once with a
//! renewed token on `401`, classifies failures, follows `@odata.nextLink`
//! continuation links when asked to and normalizes the final body.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::cloud::CloudType;
use crate::compiler::RequestDescriptor;
use crate::context::CallContext;
use crate::model::HttpMethod;
use crate::response::{COUNT, NEXT_LINK, NormalizeOptions, NormalizedResponse, normalize, parse_body};
use crate::store::Secret;
use crate::token::TokenError;
use crate::token_manager::AuthManager;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

/// Hard cap on pages fetched by one paginated call, the first page included.
pub const MAX_PAGES: usize = 100;

/// Error type for Graph request execution.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A 403 caused by missing permission scopes.
    #[error(
        "Microsoft Graph API scope error: {status} {status_text} - {body}. This tool requires organization mode. Please restart with --org-mode flag."
    )]
    InsufficientScope {
        status: u16,
        status_text: String,
        body: String,
    },

    /// Any other non-2xx response.
    #[error("Microsoft Graph API error: {status} {status_text} - {body}")]
    Api {
        status: u16,
        status_text: String,
        body: String,
    },

    /// The request never produced a response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No usable credential.
    #[error(transparent)]
    Token(#[from] TokenError),
}

/// A successful, parsed response before normalization.
struct ParsedResponse {
    body: Value,
    etag: Option<String>,
}

/// Executes requests against one Graph deployment.
pub struct GraphClient {
    auth: Arc<AuthManager>,
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    version_prefix: String,
}

impl GraphClient {
    /// Client for the Graph API of `cloud`.
    pub fn new(auth: Arc<AuthManager>, transport: Arc<dyn HttpTransport>, cloud: CloudType) -> Self {
        Self::with_base_url(auth, transport, cloud.graph_base_url())
    }

    /// Client for a custom base URL that already includes the API version.
    pub fn with_base_url(
        auth: Arc<AuthManager>,
        transport: Arc<dyn HttpTransport>,
        base_url: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let version_prefix = Url::parse(&base_url)
            .map(|u| u.path().trim_end_matches('/').to_string())
            .unwrap_or_default();
        Self {
            auth,
            transport,
            base_url,
            version_prefix,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&self) -> &Arc<AuthManager> {
        &self.auth
    }

    /// Execute `descriptor`, following continuation links when it asks to.
    pub async fn request(&self, descriptor: &RequestDescriptor) -> Result<NormalizedResponse, ExecutionError> {
        tracing::debug!("Calling {} {}", descriptor.method, descriptor.path);
        let first = self.send(descriptor).await?;

        let body = if descriptor.fetch_all_pages {
            self.collect_pages(first.body, descriptor).await
        } else {
            first.body
        };

        Ok(normalize(
            body,
            first.etag.as_deref(),
            NormalizeOptions {
                raw_response: descriptor.raw_response,
                include_headers: descriptor.include_headers,
                exclude_response: descriptor.exclude_response,
            },
        ))
    }

    /// Fetch the signed-in user's profile.
    pub async fn get_me(&self) -> Result<Value, ExecutionError> {
        let descriptor = RequestDescriptor {
            method: HttpMethod::Get,
            path: "/me".to_string(),
            query: Vec::new(),
            headers: Default::default(),
            body: None,
            raw_response: false,
            include_headers: false,
            exclude_response: false,
            fetch_all_pages: false,
        };
        Ok(self.request(&descriptor).await?.data)
    }

    async fn send(&self, descriptor: &RequestDescriptor) -> Result<ParsedResponse, ExecutionError> {
        let context = CallContext::current();
        let token = match &context {
            Some(ctx) => ctx.access_token().clone(),
            None => self.auth.get_token(false).await?,
        };

        let mut response = self.transport.send(self.build_request(descriptor, &token)).await?;

        if response.status == 401 {
            if let Some(renewed) = self.renew_after_unauthorized(context.as_ref()).await? {
                tracing::info!("Access token rejected, retrying once with a renewed token");
                response = self.transport.send(self.build_request(descriptor, &renewed)).await?;
            }
        }

        classify(response)
    }

    /// Renewed token for the single 401 retry, if refresh material exists.
    async fn renew_after_unauthorized(
        &self,
        context: Option<&CallContext>,
    ) -> Result<Option<Secret>, ExecutionError> {
        match context {
            Some(ctx) => match ctx.refresh_token() {
                Some(refresh_token) => {
                    let acquired = self
                        .auth
                        .provider()
                        .refresh(refresh_token.expose(), self.auth.scopes())
                        .await?;
                    Ok(Some(acquired.access_token))
                }
                None => Ok(None),
            },
            None if self.auth.has_refresh_material().await => Ok(Some(self.auth.get_token(true).await?)),
            None => {
                tracing::debug!("No refresh material, returning the 401 as is");
                Ok(None)
            }
        }
    }

    fn build_request(&self, descriptor: &RequestDescriptor, token: &Secret) -> HttpRequest {
        let mut headers = vec![("Authorization".to_string(), format!("Bearer {}", token.expose()))];
        if !descriptor
            .headers
            .keys()
            .any(|k| k.eq_ignore_ascii_case("content-type"))
        {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        headers.extend(descriptor.headers.iter().map(|(k, v)| (k.clone(), v.clone())));

        HttpRequest {
            method: descriptor.method,
            url: format!("{}{}", self.base_url, descriptor.path),
            headers,
            body: descriptor.body.clone(),
        }
    }

    async fn collect_pages(&self, first: Value, descriptor: &RequestDescriptor) -> Value {
        let mut combined = match first {
            Value::Object(map) => map,
            other => return other,
        };
        let Some(Value::Array(mut items)) = combined.get("value").cloned() else {
            return Value::Object(combined);
        };
        let mut next = next_link(&combined);
        if next.is_none() {
            return Value::Object(combined);
        }

        let mut pages = 1;
        while let Some(link) = next.take() {
            if pages >= MAX_PAGES {
                tracing::warn!("Reached maximum page limit ({}) for pagination", MAX_PAGES);
                break;
            }

            let path = match self.link_to_path(&link) {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!("Ignoring unparseable continuation link {}: {}", link, e);
                    break;
                }
            };

            tracing::debug!("Fetching page {} from: {}", pages + 1, link);
            match self.send(&descriptor.with_path(path)).await {
                Ok(page) => {
                    if let Some(Value::Array(more)) = page.body.get("value") {
                        items.extend(more.iter().cloned());
                    }
                    if let Value::Object(page) = &page.body {
                        next = next_link(page);
                    }
                    pages += 1;
                }
                Err(e) => {
                    tracing::warn!("Pagination stopped after {} pages: {}", pages, e);
                    break;
                }
            }
        }

        let total = items.len();
        if combined.contains_key(COUNT) {
            combined.insert(COUNT.to_string(), Value::from(total));
        }
        combined.insert("value".to_string(), Value::Array(items));
        combined.remove(NEXT_LINK);

        tracing::info!("Pagination complete: collected {} items across {} pages", total, pages);
        Value::Object(combined)
    }

    /// Continuation link as a path relative to the API version root.
    fn link_to_path(&self, link: &str) -> Result<String, url::ParseError> {
        let url = Url::parse(link)?;
        let path = url.path();
        let path = path
            .strip_prefix(self.version_prefix.as_str())
            .filter(|_| !self.version_prefix.is_empty())
            .unwrap_or(path);
        Ok(match url.query() {
            Some(query) => format!("{}?{}", path, query),
            None => path.to_string(),
        })
    }
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

fn next_link(body: &serde_json::Map<String, Value>) -> Option<String> {
    body.get(NEXT_LINK).and_then(Value::as_str).map(String::from)
}

fn classify(response: HttpResponse) -> Result<ParsedResponse, ExecutionError> {
    if response.status == 403 {
        let body = response.text();
        if body.contains("scope") || body.contains("permission") {
            return Err(ExecutionError::InsufficientScope {
                status: response.status,
                status_text: response.status_text,
                body,
            });
        }
        return Err(ExecutionError::Api {
            status: response.status,
            status_text: response.status_text,
            body,
        });
    }

    if !response.is_success() {
        return Err(ExecutionError::Api {
            status: response.status,
            body: response.text(),
            status_text: response.status_text,
        });
    }

    Ok(ParsedResponse {
        etag: response.header("etag").map(String::from),
        body: parse_body(&response.body),
    })
}
