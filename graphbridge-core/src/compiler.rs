//! Request compilation.
//!
//! Maps a caller's parameter map onto an [`EndpointDefinition`] and produces
//! a [`RequestDescriptor`] ready for the [`GraphClient`](crate::client::GraphClient).
//!
//! Compilation never fails: unknown parameters are ignored, and a body that
//! does not validate is passed through unchanged for the remote API to judge.

use std::collections::BTreeMap;
use std::sync::Arc;

use jsonschema::JSONSchema;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::model::{EndpointDefinition, HttpMethod, ParamLocation};

/// Parameters consumed by the engine itself instead of being mapped.
pub const CONTROL_PARAMETERS: &[&str] = &[
    "fetchAllPages",
    "includeHeaders",
    "excludeResponse",
    "timezone",
    "expandExtendedProperties",
];

/// OData system query options accepted with or without a leading `$`.
pub const ODATA_KEYWORDS: &[&str] = &[
    "filter", "select", "expand", "orderby", "skip", "top", "count", "search", "format",
];

/// `$expand` value added by `expandExtendedProperties`.
pub const EXTENDED_PROPERTIES_EXPANSION: &str = "singleValueExtendedProperties";

const MEDIA_SUFFIX: &str = "/content";

/// Characters `encodeURIComponent` leaves alone.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode a path segment or query component.
pub fn encode_uri_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

/// Stringify a parameter value the way it appears in a URL or header.
///
/// Arrays become comma-joined lists and `null` becomes the empty string.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items.iter().map(value_to_string).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

/// Whether a value counts as set: not `null`, `false`, `0` or `""`.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Checks a body value against a parameter schema.
pub trait BodyValidator: Send + Sync {
    /// Returns `true` when `value` satisfies `schema`.
    fn is_valid(&self, schema: &Value, value: &Value) -> bool;
}

/// [`BodyValidator`] backed by JSON Schema.
///
/// A schema that fails to compile accepts everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSchemaValidator;

impl BodyValidator for JsonSchemaValidator {
    fn is_valid(&self, schema: &Value, value: &Value) -> bool {
        match JSONSchema::compile(schema) {
            Ok(compiled) => compiled.is_valid(value),
            Err(e) => {
                tracing::warn!("Ignoring uncompilable body schema: {}", e);
                true
            }
        }
    }
}

/// A fully-formed request for one endpoint call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    /// Path relative to the API version root, with the encoded query appended.
    pub path: String,
    /// Unencoded query pairs in insertion order.
    pub query: Vec<(String, String)>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    /// Skip JSON normalization and OData stripping.
    pub raw_response: bool,
    pub include_headers: bool,
    pub exclude_response: bool,
    pub fetch_all_pages: bool,
}

impl RequestDescriptor {
    /// Value of a query pair by key.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Copy of this request aimed at a different path, keeping method and headers.
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
            ..self.clone()
        }
    }
}

/// Compiles parameter maps into [`RequestDescriptor`]s.
#[derive(Clone)]
pub struct RequestCompiler {
    validator: Arc<dyn BodyValidator>,
}

impl Default for RequestCompiler {
    fn default() -> Self {
        Self::new(Arc::new(JsonSchemaValidator))
    }
}

impl std::fmt::Debug for RequestCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCompiler").finish_non_exhaustive()
    }
}

impl RequestCompiler {
    /// Create a compiler with a custom body validator.
    pub fn new(validator: Arc<dyn BodyValidator>) -> Self {
        Self { validator }
    }

    /// Compile `params` against `endpoint`.
    pub fn compile(&self, endpoint: &EndpointDefinition, params: &Map<String, Value>) -> RequestDescriptor {
        let mut path = endpoint.path.clone();
        let mut query: Vec<(String, String)> = Vec::new();
        let mut headers = BTreeMap::new();
        let mut body: Option<Value> = None;

        for (name, value) in params {
            if CONTROL_PARAMETERS.contains(&name.as_str()) {
                continue;
            }

            let bare = name.strip_prefix('$').unwrap_or(name);
            let is_odata = ODATA_KEYWORDS.contains(&bare.to_lowercase().as_str());
            let key = if is_odata {
                format!("${}", bare.to_lowercase())
            } else {
                name.clone()
            };

            let declared = endpoint
                .parameters
                .iter()
                .find(|p| p.name == *name || (is_odata && p.name == bare));

            let Some(declared) = declared else {
                if name == "body" {
                    tracing::debug!("Using raw body parameter for {}", endpoint.name);
                    body = Some(value.clone());
                }
                continue;
            };

            match declared.location {
                ParamLocation::Path => {
                    let raw = value_to_string(value);
                    let substituted = if endpoint.skip_encoding.iter().any(|s| s == name) {
                        raw
                    } else {
                        encode_uri_component(&raw)
                    };
                    path = path
                        .replacen(&format!("{{{}}}", name), &substituted, 1)
                        .replacen(&format!(":{}", name), &substituted, 1);
                }
                ParamLocation::Query => {
                    if !value.is_null() && value.as_str() != Some("") {
                        set_query(&mut query, key, value_to_string(value));
                    }
                }
                ParamLocation::Body => {
                    body = Some(self.resolve_body(name, declared.schema.as_ref(), value));
                }
                ParamLocation::Header => {
                    headers.insert(key, value_to_string(value));
                }
            }
        }

        if endpoint.supports_timezone {
            if let Some(tz) = params.get("timezone").filter(|v| is_truthy(v)) {
                let tz = value_to_string(tz);
                tracing::debug!("Setting timezone header: Prefer: outlook.timezone=\"{}\"", tz);
                headers.insert("Prefer".to_string(), format!("outlook.timezone=\"{}\"", tz));
            }
        }

        if endpoint.supports_expand_extended_properties && flag(params, "expandExtendedProperties") {
            match query.iter_mut().find(|(k, _)| k == "$expand") {
                Some((_, existing)) => {
                    existing.push(',');
                    existing.push_str(EXTENDED_PROPERTIES_EXPANSION);
                }
                None => query.push(("$expand".to_string(), EXTENDED_PROPERTIES_EXPANSION.to_string())),
            }
        }

        if let Some(content_type) = &endpoint.content_type {
            headers.insert("Content-Type".to_string(), content_type.clone());
        }

        let mut raw_response = false;
        let is_media_path = path.ends_with(MEDIA_SUFFIX);
        if endpoint.return_download_url && is_media_path {
            path.truncate(path.len() - MEDIA_SUFFIX.len());
            tracing::debug!("Returning download URL for {} instead of content", endpoint.name);
        } else if endpoint.binary_response || is_media_path {
            raw_response = true;
        }

        if !query.is_empty() {
            let encoded = query
                .iter()
                .map(|(k, v)| format!("{}={}", encode_uri_component(k), encode_uri_component(v)))
                .collect::<Vec<_>>()
                .join("&");
            let separator = if path.contains('?') { '&' } else { '?' };
            path = format!("{}{}{}", path, separator, encoded);
        }

        let body = body
            .filter(|_| !endpoint.method.is_read())
            .filter(is_truthy)
            .map(|b| serialize_body(b, endpoint.content_type.as_deref()));

        RequestDescriptor {
            method: endpoint.method,
            path,
            query,
            headers,
            body,
            raw_response,
            include_headers: flag(params, "includeHeaders"),
            exclude_response: flag(params, "excludeResponse"),
            fetch_all_pages: flag(params, "fetchAllPages"),
        }
    }

    fn resolve_body(&self, name: &str, schema: Option<&Value>, value: &Value) -> Value {
        let Some(schema) = schema else {
            return value.clone();
        };
        if self.validator.is_valid(schema, value) {
            return value.clone();
        }

        let mut envelope = Map::new();
        envelope.insert(name.to_string(), value.clone());
        let wrapped = Value::Object(envelope);
        if self.validator.is_valid(schema, &wrapped) {
            tracing::info!("Auto-corrected parameter '{}': wrapped as {{{}: ...}}", name, name);
            wrapped
        } else {
            value.clone()
        }
    }
}

fn flag(params: &Map<String, Value>, name: &str) -> bool {
    matches!(params.get(name), Some(Value::Bool(true)))
}

fn set_query(query: &mut Vec<(String, String)>, key: String, value: String) {
    match query.iter_mut().find(|(k, _)| *k == key) {
        Some((_, existing)) => *existing = value,
        None => query.push((key, value)),
    }
}

fn serialize_body(body: Value, content_type: Option<&str>) -> String {
    match (content_type, body) {
        (Some("text/html"), Value::Object(mut fields)) => match fields.remove("content") {
            Some(content) => value_to_string(&content),
            None => Value::Object(fields).to_string(),
        },
        (_, Value::String(s)) => s,
        (_, other) => other.to_string(),
    }
}
