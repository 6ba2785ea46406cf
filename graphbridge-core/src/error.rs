//! Top-level error types for graphbridge.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::client::ExecutionError;
use crate::store::StoreError;
use crate::token::TokenError;

/// Invalid configuration, reported before any call is attempted.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The cloud selector names no known cloud.
    #[error("invalid cloud type: {value}. Valid values: global, china")]
    InvalidCloudType { value: String },

    /// A preset name is not a known tool category.
    #[error("unknown preset: {name}")]
    UnknownPreset { name: String },

    /// The endpoint catalog could not be loaded.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Any other invalid setting.
    #[error("{message}")]
    Invalid { message: String },
}

/// Top-level error type encompassing all graphbridge errors.
#[derive(Debug, Error)]
pub enum GraphbridgeError {
    /// Error from credential persistence.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error from credential acquisition or renewal.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// Error loading the endpoint catalog.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Error executing a Graph request.
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
