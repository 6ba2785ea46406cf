//! Domain model types for graphbridge.
//!
//! This module defines the declarative endpoint catalog types:
//! - [`EndpointDefinition`] - One named remote API operation ("tool")
//! - [`ParameterDeclaration`] - A declared parameter and where it goes in the request
//! - [`ParamLocation`] - Path, query, header or body placement
//! - [`HttpMethod`] - The HTTP verb of an endpoint

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// HTTP method of an endpoint.
///
/// Accepts both lower-case and upper-case spellings when deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[serde(alias = "GET")]
    Get,
    #[serde(alias = "POST")]
    Post,
    #[serde(alias = "PUT")]
    Put,
    #[serde(alias = "PATCH")]
    Patch,
    #[serde(alias = "DELETE")]
    Delete,
}

impl HttpMethod {
    /// Upper-case wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Whether this is the safe read method.
    pub fn is_read(&self) -> bool {
        matches!(self, Self::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a declared parameter is placed in the outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Body,
}

impl fmt::Display for ParamLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Path => "Path",
            Self::Query => "Query",
            Self::Header => "Header",
            Self::Body => "Body",
        };
        f.write_str(name)
    }
}

/// A parameter declared by an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDeclaration {
    /// Parameter name as callers supply it.
    pub name: String,

    /// Placement in the request.
    #[serde(rename = "type", alias = "location")]
    pub location: ParamLocation,

    /// Optional JSON Schema describing accepted values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,

    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterDeclaration {
    /// Create a declaration without schema or description.
    pub fn new(name: impl Into<String>, location: ParamLocation) -> Self {
        Self {
            name: name.into(),
            location,
            schema: None,
            description: None,
        }
    }

    /// Attach a JSON Schema.
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// A declaratively described remote API operation.
///
/// Loaded once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDefinition {
    /// Unique tool name.
    #[serde(alias = "alias", alias = "toolName")]
    pub name: String,

    /// HTTP method.
    pub method: HttpMethod,

    /// Path template with `{name}` or `:name` placeholders.
    #[serde(alias = "pathPattern")]
    pub path: String,

    /// Catalog-provided description.
    #[serde(default)]
    pub description: Option<String>,

    /// Declared parameters.
    #[serde(default)]
    pub parameters: Vec<ParameterDeclaration>,

    /// Scopes needed on personal and organizational accounts.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Scopes only available to organizational accounts.
    #[serde(default, alias = "workScopes")]
    pub org_scopes: Vec<String>,

    /// The endpoint returns binary/media content.
    #[serde(default)]
    pub binary_response: bool,

    /// Honors the `timezone` control parameter.
    #[serde(default)]
    pub supports_timezone: bool,

    /// Honors the `expandExtendedProperties` control parameter.
    #[serde(default)]
    pub supports_expand_extended_properties: bool,

    /// Fixed `Content-Type` for the request.
    #[serde(default)]
    pub content_type: Option<String>,

    /// Path parameters substituted without percent-encoding.
    #[serde(default)]
    pub skip_encoding: Vec<String>,

    /// Usage hint appended to the description.
    #[serde(default)]
    pub llm_tip: Option<String>,

    /// Fetch item metadata (with its download URL) instead of `/content`.
    #[serde(default)]
    pub return_download_url: bool,
}

impl EndpointDefinition {
    /// Create a definition with only a name, method and path.
    pub fn new(name: impl Into<String>, method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            description: None,
            parameters: Vec::new(),
            scopes: Vec::new(),
            org_scopes: Vec::new(),
            binary_response: false,
            supports_timezone: false,
            supports_expand_extended_properties: false,
            content_type: None,
            skip_encoding: Vec::new(),
            llm_tip: None,
            return_download_url: false,
        }
    }

    /// Add a declared parameter.
    pub fn with_parameter(mut self, parameter: ParameterDeclaration) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Set regular scopes.
    pub fn with_scopes(mut self, scopes: &[&str]) -> Self {
        self.scopes = scopes.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Set organization-only scopes.
    pub fn with_org_scopes(mut self, scopes: &[&str]) -> Self {
        self.org_scopes = scopes.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Whether the endpoint is only usable by organizational accounts.
    pub fn is_org_only(&self) -> bool {
        self.scopes.is_empty() && !self.org_scopes.is_empty()
    }

    /// Find a declared parameter by exact name.
    pub fn parameter(&self, name: &str) -> Option<&ParameterDeclaration> {
        self.parameters.iter().find(|p| p.name == name)
    }
}
