//! # Graphbridge Core
//!
//! Declarative Microsoft Graph endpoint execution engine.
//!
//! This crate provides:
//! - A catalog of endpoint definitions and the tool registry built from it
//! - Scope resolution for sign-in from the enabled endpoints
//! - Request compilation from loosely typed tool parameters
//! - HTTP execution with one-shot 401 renewal, pagination and response normalization
//! - Credential storage with keyring and owner-only file fallback
//! - Account and token lifecycle management, plus per-call credential contexts
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use graphbridge_core::{ToolExecutor, ToolRegistry, RegistryOptions, load_catalog};
//!
//! async fn list_mail(executor: &ToolExecutor) {
//!     let mut params = serde_json::Map::new();
//!     params.insert("top".into(), 10.into());
//!     let result = executor.execute_endpoint_call("list-mail-messages", &params).await;
//!     println!("{}", result.data);
//! }
//! ```

pub mod catalog;
pub mod categories;
pub mod client;
pub mod cloud;
pub mod compiler;
pub mod context;
pub mod error;
pub mod executor;
pub mod model;
pub mod registry;
pub mod response;
pub mod scopes;
pub mod store;
pub mod token;
pub mod token_cache;
pub mod token_manager;
pub mod transport;

#[cfg(feature = "oauth")]
pub mod oauth;

// Re-export commonly used types at crate root
pub use model::{EndpointDefinition, HttpMethod, ParamLocation, ParameterDeclaration};

pub use catalog::{Catalog, CatalogError, load_catalog};

pub use categories::{CATEGORIES, Category, combined_preset_pattern, find_category};

pub use registry::{RegistryOptions, ToolEntry, ToolRegistry};

pub use scopes::{compile_name_filter, resolve_scopes};

pub use compiler::{BodyValidator, JsonSchemaValidator, RequestCompiler, RequestDescriptor};

pub use context::CallContext;

pub use transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

#[cfg(feature = "oauth")]
pub use transport::ReqwestTransport;

pub use response::{NormalizedResponse, ResponseMeta};

pub use client::{ExecutionError, GraphClient, MAX_PAGES};

pub use executor::{ToolExecutor, ToolResult};

pub use store::{
    CacheArtifact,
    CredentialPaths,
    CredentialStore,
    FileStore,
    MemoryStore,
    Secret,
    SecretStore,
    StoreError,
    create_secure_store,
};

#[cfg(feature = "keyring-store")]
pub use store::KeyringStore;

pub use token::{
    AccountIdentity,
    AcquiredToken,
    DeviceCodeInfo,
    IdentityProvider,
    Token,
    TokenError,
};

pub use token_cache::AccountInfo;

pub use token_manager::{AuthManager, AuthPhase, AuthStatus, LoginCheck};

pub use cloud::{AppSecrets, CloudType};

pub use error::{ConfigError, GraphbridgeError};

#[cfg(feature = "oauth")]
pub use oauth::MicrosoftIdentityProvider;
